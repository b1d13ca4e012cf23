//! facegate-core — the face verification decision pipeline.
//!
//! Decodes image payloads, locates faces, extracts embeddings through a
//! pluggable backend (SCRFD + ArcFace via ONNX Runtime by default), and
//! classifies a profile/ID photo pair by embedding distance with a
//! double threshold gate.

pub mod align;
pub mod arcface;
pub mod config;
pub mod decode;
pub mod embedder;
pub mod locator;
pub mod pipeline;
pub mod scrfd;
pub mod types;

pub use arcface::ArcFaceEmbedder;
pub use config::{ConfigError, ConfigUpdate, SharedConfig, VerifyConfig};
pub use decode::{DecodeError, ImagePayload};
pub use embedder::{EmbedError, FaceEmbedder};
pub use locator::{DetectError, FaceLocator};
pub use pipeline::VerificationPipeline;
pub use scrfd::ScrfdDetector;
pub use types::{Embedding, FaceRegion, VerificationReport};
