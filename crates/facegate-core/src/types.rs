use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Rectangular bounds of a face located within a decoded image, with
/// optional five-point landmarks (left eye, right eye, nose, mouth corners).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceRegion {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    pub landmarks: Option<[(f32, f32); 5]>,
}

impl FaceRegion {
    /// Region area in square pixels. Degenerate dimensions count as zero.
    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }
}

/// Fixed-length feature vector for one located face.
///
/// Produced once per verification call and discarded with it; never
/// persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Euclidean distance to another embedding of the same length.
    pub fn distance(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// Outcome of one verification call. Immutable once constructed.
///
/// `distance` and `threshold_used` are only present on a successful run;
/// a failure report carries the taxonomy-level reason in `error` and
/// nothing else.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub success: bool,
    #[serde(rename = "match")]
    pub is_match: bool,
    pub confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold_used: Option<f32>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VerificationReport {
    /// A failed run: no match, zero confidence, reason attached.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            is_match: false,
            confidence: 0.0,
            distance: None,
            threshold_used: None,
            timestamp: Utc::now(),
            error: Some(error.into()),
        }
    }

    /// A completed run that reached the classification step.
    pub fn decided(is_match: bool, confidence: f32, distance: f32, tolerance: f32) -> Self {
        Self {
            success: true,
            is_match,
            confidence,
            distance: Some(distance),
            threshold_used: Some(tolerance),
            timestamp: Utc::now(),
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_of_identical_embeddings_is_zero() {
        let a = Embedding::new(vec![0.3, -0.4, 0.5]);
        assert_eq!(a.distance(&a), 0.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let a = Embedding::new(vec![0.1, 0.9, -0.2]);
        let b = Embedding::new(vec![-0.5, 0.3, 0.7]);
        assert_eq!(a.distance(&b), b.distance(&a));
    }

    #[test]
    fn distance_matches_known_value() {
        let a = Embedding::new(vec![0.0, 0.0]);
        let b = Embedding::new(vec![3.0, 4.0]);
        assert!((a.distance(&b) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn degenerate_region_has_zero_area() {
        let region = FaceRegion {
            x: 10.0,
            y: 10.0,
            width: 0.0,
            height: 25.0,
            confidence: 0.8,
            landmarks: None,
        };
        assert_eq!(region.area(), 0.0);

        let inverted = FaceRegion { width: -5.0, ..region };
        assert_eq!(inverted.area(), 0.0);
    }

    #[test]
    fn report_serializes_match_keyword_field() {
        let report = VerificationReport::decided(true, 0.82, 0.18, 0.6);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["match"], true);
        assert_eq!(json["success"], true);
        assert!((json["distance"].as_f64().unwrap() - 0.18).abs() < 1e-6);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn failure_report_omits_distance_and_threshold() {
        let report = VerificationReport::failure("No face detected in the image");
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["match"], false);
        assert_eq!(json["confidence"], 0.0);
        assert_eq!(json["error"], "No face detected in the image");
        assert!(json.get("distance").is_none());
        assert!(json.get("threshold_used").is_none());
    }
}
