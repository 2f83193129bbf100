//! Feature Vector and Traffic Sample
//!
//! `FeatureVector` is the scorer's only input. `TrafficSample` is what the
//! generator produces each cycle and what observers see in the stream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::layout::{feature_index, FEATURE_COUNT, FEATURE_LAYOUT};

/// Feature values in the order defined by `FEATURE_LAYOUT`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub values: [f64; FEATURE_COUNT],
}

impl FeatureVector {
    pub fn from_values(values: [f64; FEATURE_COUNT]) -> Self {
        Self { values }
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied()
    }

    pub fn get_by_name(&self, name: &str) -> Option<f64> {
        feature_index(name).and_then(|i| self.get(i))
    }
}

/// Traffic regime a sample was drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Regime {
    Normal,
    Attack,
}

/// One simulated observation window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficSample {
    pub packet_rate: f64,
    pub ip_entropy: f64,
    pub syn_ratio: f64,
    pub unique_ips: f64,
    pub protocol_ratio: f64,
    pub avg_packet_size: f64,
    pub source_ip: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub regime: Regime,
}

impl TrafficSample {
    /// Extract the scorer input, in layout order
    pub fn vector(&self) -> FeatureVector {
        FeatureVector::from_values([
            self.packet_rate,
            self.ip_entropy,
            self.syn_ratio,
            self.unique_ips,
            self.protocol_ratio,
            self.avg_packet_size,
        ])
    }

    pub fn is_attack(&self) -> bool {
        self.regime == Regime::Attack
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TrafficSample {
        TrafficSample {
            packet_rate: 1.0,
            ip_entropy: 2.0,
            syn_ratio: 3.0,
            unique_ips: 4.0,
            protocol_ratio: 5.0,
            avg_packet_size: 6.0,
            source_ip: "192.168.1.1".into(),
            timestamp: Utc::now(),
            regime: Regime::Normal,
        }
    }

    #[test]
    fn test_vector_follows_layout_order() {
        let v = sample().vector();
        for (i, name) in FEATURE_LAYOUT.iter().enumerate() {
            assert_eq!(v.get_by_name(name), Some((i + 1) as f64));
        }
    }

    #[test]
    fn test_sample_serializes_regime_as_type() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["type"], "normal");
        assert_eq!(json["source_ip"], "192.168.1.1");
        assert!(json.get("regime").is_none());
    }
}
