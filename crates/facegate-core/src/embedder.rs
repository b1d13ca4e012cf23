//! Embedding extraction capability boundary.

use crate::types::{Embedding, FaceRegion};
use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmbedError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("face region has zero area")]
    DegenerateRegion,
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Produces a fixed-length feature vector for one located face.
///
/// The output length is identical across calls — the distance computation
/// in the pipeline depends on it.
pub trait FaceEmbedder: Send {
    fn embed(&mut self, image: &RgbImage, region: &FaceRegion) -> Result<Embedding, EmbedError>;
}
