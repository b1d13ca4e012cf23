//! ArcFace embedding extraction backend via ONNX Runtime.

use crate::align;
use crate::embedder::{EmbedError, FaceEmbedder};
use crate::types::{Embedding, FaceRegion};
use image::{imageops, RgbImage};
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;

const INPUT_SIZE: u32 = 112;
const PIXEL_MEAN: f32 = 127.5;
// Symmetric normalization — the embedding model differs from the detector here.
const PIXEL_STD: f32 = 127.5;
const EMBEDDING_DIM: usize = 512;
/// Extra context kept around the detector box when no landmarks are
/// available and the face is cropped instead of aligned.
const CROP_MARGIN: f32 = 0.2;

pub struct ArcFaceEmbedder {
    session: Session,
}

impl ArcFaceEmbedder {
    /// Load the ArcFace ONNX model from the given path.
    pub fn load(model_path: &str) -> Result<Self, EmbedError> {
        if !Path::new(model_path).exists() {
            return Err(EmbedError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(path = model_path, "face embedding model loaded");
        Ok(Self { session })
    }

    /// Produce the canonical 112×112 face crop: landmark alignment when the
    /// detector supplied landmarks, square crop with margin otherwise.
    fn face_crop(image: &RgbImage, region: &FaceRegion) -> RgbImage {
        if let Some(landmarks) = &region.landmarks {
            if let Some(aligned) = align::align_face(image, landmarks) {
                return aligned;
            }
            tracing::debug!("landmark alignment degenerate, falling back to crop");
        }

        let side = region.width.max(region.height) * (1.0 + CROP_MARGIN);
        let center_x = region.x + region.width / 2.0;
        let center_y = region.y + region.height / 2.0;

        let left = ((center_x - side / 2.0).floor().max(0.0) as u32)
            .min(image.width().saturating_sub(1));
        let top = ((center_y - side / 2.0).floor().max(0.0) as u32)
            .min(image.height().saturating_sub(1));
        let crop_w = (side.ceil() as u32).clamp(1, image.width() - left);
        let crop_h = (side.ceil() as u32).clamp(1, image.height() - top);

        let crop = imageops::crop_imm(image, left, top, crop_w, crop_h).to_image();
        imageops::resize(&crop, INPUT_SIZE, INPUT_SIZE, imageops::FilterType::Triangle)
    }

    fn preprocess(crop: &RgbImage) -> Array4<f32> {
        let size = INPUT_SIZE as usize;
        let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
        for (x, y, pixel) in crop.enumerate_pixels() {
            for channel in 0..3 {
                tensor[[0, channel, y as usize, x as usize]] =
                    (pixel.0[channel] as f32 - PIXEL_MEAN) / PIXEL_STD;
            }
        }
        tensor
    }
}

impl FaceEmbedder for ArcFaceEmbedder {
    fn embed(&mut self, image: &RgbImage, region: &FaceRegion) -> Result<Embedding, EmbedError> {
        if region.area() <= 0.0 {
            return Err(EmbedError::DegenerateRegion);
        }

        let crop = Self::face_crop(image, region);
        let input = Self::preprocess(&crop);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| EmbedError::Inference(format!("embedding output: {e}")))?;

        if raw.len() != EMBEDDING_DIM {
            return Err(EmbedError::Inference(format!(
                "expected {EMBEDDING_DIM}-dim embedding, got {}",
                raw.len()
            )));
        }

        // L2-normalize so pair distances stay in a bounded range.
        let norm = raw.iter().map(|v| v * v).sum::<f32>().sqrt();
        let values = if norm > 0.0 {
            raw.iter().map(|v| v / norm).collect()
        } else {
            raw.to_vec()
        };

        Ok(Embedding::new(values))
    }
}
