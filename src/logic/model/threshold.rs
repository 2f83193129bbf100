//! Detection Policy
//!
//! Maps a raw outlier verdict and its confidence onto the three-level
//! verdict exposed to observers.

use serde::{Deserialize, Serialize};

/// Default confidence above which an outlier is Confirmed
pub const DEFAULT_CONFIRM_THRESHOLD: f64 = 0.5;

/// Verdict level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetectionLabel {
    /// Scorer not trained yet
    Unknown,
    Normal,
    Suspicious,
    Confirmed,
}

impl DetectionLabel {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, DetectionLabel::Confirmed)
    }
}

/// Scorer output for one vector
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub is_anomalous: bool,
    pub confidence: f64,
    pub label: DetectionLabel,
}

impl DetectionResult {
    /// Neutral result returned before training
    pub fn unknown() -> Self {
        Self {
            is_anomalous: false,
            confidence: 0.0,
            label: DetectionLabel::Unknown,
        }
    }
}

/// Decision policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionPolicy {
    /// Outliers strictly above this confidence are Confirmed
    pub confirm_threshold: f64,
}

impl Default for DetectionPolicy {
    fn default() -> Self {
        Self {
            confirm_threshold: DEFAULT_CONFIRM_THRESHOLD,
        }
    }
}

impl DetectionPolicy {
    pub fn new(confirm_threshold: f64) -> Self {
        Self { confirm_threshold }
    }

    pub fn classify(&self, is_outlier: bool, confidence: f64) -> DetectionResult {
        let label = match (is_outlier, confidence > self.confirm_threshold) {
            (true, true) => DetectionLabel::Confirmed,
            (true, false) => DetectionLabel::Suspicious,
            (false, _) => DetectionLabel::Normal,
        };

        DetectionResult {
            is_anomalous: is_outlier,
            confidence,
            label,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_boundary_is_suspicious() {
        let policy = DetectionPolicy::default();

        let at = policy.classify(true, 0.5);
        assert_eq!(at.label, DetectionLabel::Suspicious);
        assert!(at.is_anomalous);

        let above = policy.classify(true, 0.5 + 1e-9);
        assert_eq!(above.label, DetectionLabel::Confirmed);
        assert!(above.is_anomalous);
    }

    #[test]
    fn test_inlier_is_normal_regardless_of_confidence() {
        let policy = DetectionPolicy::default();
        let result = policy.classify(false, 0.9);
        assert_eq!(result.label, DetectionLabel::Normal);
        assert!(!result.is_anomalous);
        assert_eq!(result.confidence, 0.9);
    }

    #[test]
    fn test_custom_threshold() {
        let policy = DetectionPolicy::new(0.7);
        assert_eq!(policy.classify(true, 0.6).label, DetectionLabel::Suspicious);
        assert_eq!(policy.classify(true, 0.75).label, DetectionLabel::Confirmed);
    }

    #[test]
    fn test_unknown_is_neutral() {
        let r = DetectionResult::unknown();
        assert!(!r.is_anomalous);
        assert_eq!(r.confidence, 0.0);
        assert!(!r.label.is_confirmed());
    }
}
