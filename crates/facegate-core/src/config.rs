//! Runtime verification settings and the process-wide store.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

pub const DEFAULT_TOLERANCE: f32 = 0.6;
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.6;
pub const DEFAULT_MAX_CONTENT_LENGTH: usize = 10 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0}")]
    Validation(String),
}

/// Settings read by every pipeline invocation.
///
/// `tolerance` is the maximum embedding distance still considered a match;
/// `confidence_threshold` gates the normalized inverse of that distance
/// separately. Both gates must agree for a positive result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VerifyConfig {
    pub tolerance: f32,
    pub confidence_threshold: f32,
    pub max_content_length: usize,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            max_content_length: DEFAULT_MAX_CONTENT_LENGTH,
        }
    }
}

impl VerifyConfig {
    /// Seed from `FACE_TOLERANCE`, `CONFIDENCE_THRESHOLD` and
    /// `MAX_CONTENT_LENGTH`, falling back to defaults for absent or
    /// unparsable values.
    pub fn from_env() -> Self {
        Self {
            tolerance: env_f32("FACE_TOLERANCE", DEFAULT_TOLERANCE),
            confidence_threshold: env_f32("CONFIDENCE_THRESHOLD", DEFAULT_CONFIDENCE_THRESHOLD),
            max_content_length: env_usize("MAX_CONTENT_LENGTH", DEFAULT_MAX_CONTENT_LENGTH),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.tolerance > 0.0 && self.tolerance <= 1.0) {
            return Err(ConfigError::Validation(
                "tolerance must be within (0, 1]".into(),
            ));
        }
        if !(self.confidence_threshold >= 0.0 && self.confidence_threshold <= 1.0) {
            return Err(ConfigError::Validation(
                "confidence_threshold must be within [0, 1]".into(),
            ));
        }
        if self.max_content_length == 0 {
            return Err(ConfigError::Validation(
                "max_content_length must be positive".into(),
            ));
        }
        Ok(())
    }

    fn merged(&self, update: &ConfigUpdate) -> VerifyConfig {
        VerifyConfig {
            tolerance: update.tolerance.unwrap_or(self.tolerance),
            confidence_threshold: update
                .confidence_threshold
                .unwrap_or(self.confidence_threshold),
            max_content_length: update.max_content_length.unwrap_or(self.max_content_length),
        }
    }
}

/// Partial update applied through the administrative surface.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigUpdate {
    pub tolerance: Option<f32>,
    pub confidence_threshold: Option<f32>,
    pub max_content_length: Option<usize>,
}

/// Process-wide configuration store shared between the administrative
/// surface and in-flight pipeline invocations.
///
/// `snapshot` hands out a full copy, so a pipeline run never observes a
/// half-applied update. `apply` validates the fully merged candidate before
/// swapping it in: an invalid update leaves the prior configuration
/// untouched in its entirety.
#[derive(Clone)]
pub struct SharedConfig {
    inner: Arc<RwLock<VerifyConfig>>,
}

impl SharedConfig {
    pub fn new(config: VerifyConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    pub fn snapshot(&self) -> VerifyConfig {
        *self.inner.read()
    }

    pub fn apply(&self, update: &ConfigUpdate) -> Result<VerifyConfig, ConfigError> {
        let mut guard = self.inner.write();
        let candidate = guard.merged(update);
        candidate.validate()?;
        *guard = candidate;
        Ok(candidate)
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(VerifyConfig::default().validate().is_ok());
    }

    #[test]
    fn tolerance_bounds_are_exclusive_zero_inclusive_one() {
        let mut config = VerifyConfig::default();

        config.tolerance = 0.0;
        assert!(config.validate().is_err());

        config.tolerance = 1.0;
        assert!(config.validate().is_ok());

        config.tolerance = 1.01;
        assert!(config.validate().is_err());

        config.tolerance = f32::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn confidence_threshold_bounds_are_inclusive() {
        let mut config = VerifyConfig::default();

        config.confidence_threshold = 0.0;
        assert!(config.validate().is_ok());

        config.confidence_threshold = 1.0;
        assert!(config.validate().is_ok());

        config.confidence_threshold = -0.1;
        assert!(config.validate().is_err());

        config.confidence_threshold = 1.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_update_leaves_store_unchanged() {
        let store = SharedConfig::new(VerifyConfig::default());
        let before = store.snapshot();

        let update = ConfigUpdate {
            tolerance: Some(1.5),
            ..Default::default()
        };
        assert!(store.apply(&update).is_err());
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn mixed_update_with_one_bad_field_applies_nothing() {
        let store = SharedConfig::new(VerifyConfig::default());
        let before = store.snapshot();

        // Valid tolerance, invalid threshold: the whole update must be
        // rejected, not partially applied.
        let update = ConfigUpdate {
            tolerance: Some(0.4),
            confidence_threshold: Some(2.0),
            ..Default::default()
        };
        assert!(store.apply(&update).is_err());
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn partial_update_merges_with_current_values() {
        let store = SharedConfig::new(VerifyConfig::default());

        let applied = store
            .apply(&ConfigUpdate {
                tolerance: Some(0.45),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(applied.tolerance, 0.45);
        assert_eq!(applied.confidence_threshold, DEFAULT_CONFIDENCE_THRESHOLD);
        assert_eq!(applied.max_content_length, DEFAULT_MAX_CONTENT_LENGTH);
        assert_eq!(store.snapshot(), applied);
    }

    #[test]
    fn zero_max_content_length_is_rejected() {
        let store = SharedConfig::new(VerifyConfig::default());
        let update = ConfigUpdate {
            max_content_length: Some(0),
            ..Default::default()
        };
        assert!(store.apply(&update).is_err());
        assert_eq!(store.snapshot().max_content_length, DEFAULT_MAX_CONTENT_LENGTH);
    }
}
