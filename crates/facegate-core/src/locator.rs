//! Face location capability boundary.

use crate::types::FaceRegion;
use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Finds face regions within a decoded image.
///
/// An empty result means no face was found, which is not an error — the
/// pipeline decides how to react. Implementations take `&mut self` because
/// inference sessions require exclusive access, and must be `Send` so an
/// engine thread can own them.
pub trait FaceLocator: Send {
    fn locate(&mut self, image: &RgbImage) -> Result<Vec<FaceRegion>, DetectError>;
}
