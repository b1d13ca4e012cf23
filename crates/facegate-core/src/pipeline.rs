//! The verification decision pipeline.
//!
//! Takes a profile/ID image pair through decode → locate → embed, compares
//! the two embeddings by Euclidean distance, and classifies the pair with
//! a double gate: the raw distance must be within tolerance AND the
//! normalized confidence must clear its own threshold.

use crate::config::VerifyConfig;
use crate::decode::{decode_image, ImagePayload};
use crate::embedder::FaceEmbedder;
use crate::locator::FaceLocator;
use crate::types::{Embedding, FaceRegion, VerificationReport};
use image::RgbImage;

// Taxonomy-level reasons surfaced to callers. Internal causes go to the log.
const NO_FACE_DETECTED: &str = "No face detected in the image";
const DETECTION_FAILED: &str = "Face detection failed";
const EMBEDDING_FAILED: &str = "Face embedding extraction failed";

pub struct VerificationPipeline {
    locator: Box<dyn FaceLocator>,
    embedder: Box<dyn FaceEmbedder>,
}

impl VerificationPipeline {
    pub fn new(locator: Box<dyn FaceLocator>, embedder: Box<dyn FaceEmbedder>) -> Self {
        Self { locator, embedder }
    }

    /// Run the full decision pipeline over a profile/ID image pair.
    ///
    /// Never panics and never returns `Err`: every failure is folded into a
    /// report with `success = false` and a taxonomy-level reason.
    pub fn verify(
        &mut self,
        profile: &ImagePayload,
        id: &ImagePayload,
        config: &VerifyConfig,
    ) -> VerificationReport {
        match self.run(profile, id, config) {
            Ok(report) => report,
            Err(reason) => VerificationReport::failure(reason),
        }
    }

    fn run(
        &mut self,
        profile: &ImagePayload,
        id: &ImagePayload,
        config: &VerifyConfig,
    ) -> Result<VerificationReport, String> {
        let profile_pixels = self.decode("profile", profile, config)?;
        let id_pixels = self.decode("id", id, config)?;

        // Face presence is checked in both images before any embedding runs.
        let profile_region = self.locate_one("profile", &profile_pixels)?;
        let id_region = self.locate_one("id", &id_pixels)?;

        let profile_embedding = self.embed_region("profile", &profile_pixels, &profile_region)?;
        let id_embedding = self.embed_region("id", &id_pixels, &id_region)?;

        if profile_embedding.len() != id_embedding.len() {
            tracing::error!(
                profile_dim = profile_embedding.len(),
                id_dim = id_embedding.len(),
                "embedding backend returned mismatched vector lengths"
            );
            return Err(EMBEDDING_FAILED.into());
        }

        let distance = profile_embedding.distance(&id_embedding);
        let confidence = (1.0 - distance).clamp(0.0, 1.0);

        // Both gates must agree, each with an inclusive boundary.
        let mut is_match = distance <= config.tolerance;
        if is_match && confidence < config.confidence_threshold {
            tracing::debug!(
                distance,
                confidence,
                threshold = config.confidence_threshold,
                "match downgraded by confidence gate"
            );
            is_match = false;
        }

        tracing::info!(distance, confidence, is_match, "verification decided");
        Ok(VerificationReport::decided(
            is_match,
            confidence,
            distance,
            config.tolerance,
        ))
    }

    fn decode(
        &self,
        role: &str,
        payload: &ImagePayload,
        config: &VerifyConfig,
    ) -> Result<RgbImage, String> {
        decode_image(payload, config.max_content_length).map_err(|err| {
            tracing::info!(image = role, error = %err, "payload rejected");
            err.to_string()
        })
    }

    fn locate_one(&mut self, role: &str, pixels: &RgbImage) -> Result<FaceRegion, String> {
        let regions = self.locator.locate(pixels).map_err(|err| {
            tracing::error!(image = role, error = %err, "face detection failed");
            DETECTION_FAILED.to_string()
        })?;

        let region = select_region(&regions).ok_or_else(|| {
            tracing::info!(image = role, "no face found");
            NO_FACE_DETECTED.to_string()
        })?;
        if regions.len() > 1 {
            tracing::debug!(
                image = role,
                candidates = regions.len(),
                "multiple faces, using the largest region"
            );
        }
        Ok(region.clone())
    }

    fn embed_region(
        &mut self,
        role: &str,
        pixels: &RgbImage,
        region: &FaceRegion,
    ) -> Result<Embedding, String> {
        self.embedder.embed(pixels, region).map_err(|err| {
            tracing::error!(image = role, error = %err, "embedding extraction failed");
            EMBEDDING_FAILED.to_string()
        })
    }
}

/// Single-face selection policy: the largest-area region wins. Equal areas
/// fall back to detector order, which is descending confidence.
fn select_region(regions: &[FaceRegion]) -> Option<&FaceRegion> {
    let mut best: Option<&FaceRegion> = None;
    for region in regions {
        match best {
            Some(current) if region.area() <= current.area() => {}
            _ => best = Some(region),
        }
    }
    best
}
