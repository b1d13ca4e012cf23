//! Daemon startup configuration, loaded from environment variables.

use facegate_core::VerifyConfig;
use std::path::PathBuf;

pub struct DaemonConfig {
    pub host: String,
    pub port: u16,
    /// Directory containing the ONNX model files.
    pub model_dir: PathBuf,
    /// Initial verification settings; mutable afterwards via `POST /config`.
    pub verify: VerifyConfig,
}

impl DaemonConfig {
    /// Load from `FACEGATE_*` variables (and the verification settings
    /// from their own `FACE_TOLERANCE` / `CONFIDENCE_THRESHOLD` /
    /// `MAX_CONTENT_LENGTH` names) with defaults.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("FACEGATE_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env_u16("FACEGATE_PORT", 5100),
            model_dir: std::env::var("FACEGATE_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("models")),
            verify: VerifyConfig::from_env(),
        }
    }

    /// Path to the SCRFD detection model.
    pub fn scrfd_model_path(&self) -> String {
        self.model_dir
            .join("det_10g.onnx")
            .to_string_lossy()
            .into_owned()
    }

    /// Path to the ArcFace recognition model.
    pub fn arcface_model_path(&self) -> String {
        self.model_dir
            .join("w600k_r50.onnx")
            .to_string_lossy()
            .into_owned()
    }

    /// JSON body limit: two base64-encoded images (4/3 expansion) plus
    /// envelope headroom.
    pub fn json_body_limit(&self) -> usize {
        self.verify.max_content_length * 3 + 4096
    }
}

fn env_u16(key: &str, default: u16) -> u16 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
