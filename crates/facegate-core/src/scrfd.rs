//! SCRFD face detection backend via ONNX Runtime.
//!
//! Runs the anchor-free SCRFD graph on a letterboxed 640×640 input and
//! decodes its three stride levels into face regions with landmarks.

use crate::locator::{DetectError, FaceLocator};
use crate::types::FaceRegion;
use image::{imageops, RgbImage};
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::cmp::Ordering;
use std::path::Path;

const INPUT_SIZE: u32 = 640;
const PIXEL_MEAN: f32 = 127.5;
const PIXEL_STD: f32 = 128.0;
const SCORE_FLOOR: f32 = 0.5;
const NMS_IOU: f32 = 0.4;
const STRIDES: [u32; 3] = [8, 16, 32];
const ANCHORS_PER_CELL: usize = 2;
/// Standard insightface export order: [scores ×3, boxes ×3, landmarks ×3],
/// strides 8/16/32 within each group.
const EXPECTED_OUTPUTS: usize = 9;

/// Coordinate mapping between the letterboxed input and the source image.
struct Letterbox {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

impl Letterbox {
    fn unmap(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

pub struct ScrfdDetector {
    session: Session,
}

impl ScrfdDetector {
    /// Load the SCRFD ONNX model from the given path.
    pub fn load(model_path: &str) -> Result<Self, DetectError> {
        if !Path::new(model_path).exists() {
            return Err(DetectError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let outputs = session.outputs().len();
        if outputs != EXPECTED_OUTPUTS {
            return Err(DetectError::Inference(format!(
                "detection model exports {outputs} tensors, expected {EXPECTED_OUTPUTS} (3 strides x score/box/landmarks)"
            )));
        }

        tracing::info!(path = model_path, "face detection model loaded");
        Ok(Self { session })
    }

    /// Letterbox the image into a normalized NCHW tensor.
    ///
    /// The tensor starts zero-filled, which is exactly the normalized value
    /// of the padding color (the pixel mean).
    fn preprocess(image: &RgbImage) -> (Array4<f32>, Letterbox) {
        let (width, height) = image.dimensions();
        let scale = (INPUT_SIZE as f32 / width as f32).min(INPUT_SIZE as f32 / height as f32);
        let scaled_w = ((width as f32 * scale).round() as u32).clamp(1, INPUT_SIZE);
        let scaled_h = ((height as f32 * scale).round() as u32).clamp(1, INPUT_SIZE);

        let resized = imageops::resize(image, scaled_w, scaled_h, imageops::FilterType::Triangle);
        let pad_x = (INPUT_SIZE - scaled_w) / 2;
        let pad_y = (INPUT_SIZE - scaled_h) / 2;

        let size = INPUT_SIZE as usize;
        let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
        for (x, y, pixel) in resized.enumerate_pixels() {
            let (tx, ty) = ((x + pad_x) as usize, (y + pad_y) as usize);
            for channel in 0..3 {
                tensor[[0, channel, ty, tx]] = (pixel.0[channel] as f32 - PIXEL_MEAN) / PIXEL_STD;
            }
        }

        (
            tensor,
            Letterbox {
                scale,
                pad_x: pad_x as f32,
                pad_y: pad_y as f32,
            },
        )
    }
}

impl FaceLocator for ScrfdDetector {
    /// Detect faces, returning regions sorted by descending confidence.
    fn locate(&mut self, image: &RgbImage) -> Result<Vec<FaceRegion>, DetectError> {
        let (input, letterbox) = Self::preprocess(image);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let mut found = Vec::new();
        for (level, &stride) in STRIDES.iter().enumerate() {
            let (_, scores) = outputs[level]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectError::Inference(format!("stride {stride} scores: {e}")))?;
            let (_, deltas) = outputs[level + 3]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectError::Inference(format!("stride {stride} boxes: {e}")))?;
            let (_, points) = outputs[level + 6]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectError::Inference(format!("stride {stride} landmarks: {e}")))?;

            found.extend(decode_level(scores, deltas, points, stride, &letterbox));
        }

        Ok(suppress(found, NMS_IOU))
    }
}

/// Decode one stride level into face regions in source-image coordinates.
fn decode_level(
    scores: &[f32],
    deltas: &[f32],
    points: &[f32],
    stride: u32,
    letterbox: &Letterbox,
) -> Vec<FaceRegion> {
    let cells = (INPUT_SIZE / stride) as usize;
    let anchors = cells * cells * ANCHORS_PER_CELL;
    let mut regions = Vec::new();

    for index in 0..anchors {
        let Some(&score) = scores.get(index) else { break };
        if score <= SCORE_FLOOR {
            continue;
        }

        let cell = index / ANCHORS_PER_CELL;
        let anchor_x = ((cell % cells) as u32 * stride) as f32;
        let anchor_y = ((cell / cells) as u32 * stride) as f32;
        let s = stride as f32;

        // Box deltas are [left, top, right, bottom] offsets from the anchor.
        let b = index * 4;
        if b + 3 >= deltas.len() {
            break;
        }
        let (x0, y0) = letterbox.unmap(anchor_x - deltas[b] * s, anchor_y - deltas[b + 1] * s);
        let (x1, y1) = letterbox.unmap(anchor_x + deltas[b + 2] * s, anchor_y + deltas[b + 3] * s);

        let k = index * 10;
        let landmarks = points.get(k..k + 10).map(|chunk| {
            std::array::from_fn(|i| {
                letterbox.unmap(
                    anchor_x + chunk[i * 2] * s,
                    anchor_y + chunk[i * 2 + 1] * s,
                )
            })
        });

        regions.push(FaceRegion {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
            confidence: score,
            landmarks,
        });
    }

    regions
}

/// Non-maximum suppression. Keeps the highest-confidence region of every
/// overlapping cluster; output stays sorted by descending confidence.
fn suppress(mut regions: Vec<FaceRegion>, iou_floor: f32) -> Vec<FaceRegion> {
    regions.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });

    let mut kept: Vec<FaceRegion> = Vec::with_capacity(regions.len());
    'candidates: for region in regions {
        for winner in &kept {
            if iou(winner, &region) > iou_floor {
                continue 'candidates;
            }
        }
        kept.push(region);
    }
    kept
}

fn iou(a: &FaceRegion, b: &FaceRegion) -> f32 {
    let x0 = a.x.max(b.x);
    let y0 = a.y.max(b.y);
    let x1 = (a.x + a.width).min(b.x + b.width);
    let y1 = (a.y + a.height).min(b.y + b.height);

    let intersection = (x1 - x0).max(0.0) * (y1 - y0).max(0.0);
    let union = a.area() + b.area() - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}
