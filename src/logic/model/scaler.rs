//! Standard scaler: zero mean, unit variance per dimension

use serde::{Deserialize, Serialize};

use crate::logic::features::{FeatureVector, FEATURE_COUNT};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: [f64; FEATURE_COUNT],
    pub scale: [f64; FEATURE_COUNT],
}

impl StandardScaler {
    /// Fit on the given vectors. Constant dimensions get scale 1.
    pub fn fit(data: &[FeatureVector]) -> Self {
        let mut mean = [0.0; FEATURE_COUNT];
        let mut scale = [1.0; FEATURE_COUNT];

        if data.is_empty() {
            return Self { mean, scale };
        }

        let n = data.len() as f64;
        for v in data {
            for (m, x) in mean.iter_mut().zip(v.values.iter()) {
                *m += x;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        for (i, s) in scale.iter_mut().enumerate() {
            let variance = data.iter().map(|v| (v.values[i] - mean[i]).powi(2)).sum::<f64>() / n;
            let std = variance.sqrt();
            *s = if std > f64::EPSILON { std } else { 1.0 };
        }

        Self { mean, scale }
    }

    pub fn transform(&self, v: &FeatureVector) -> [f64; FEATURE_COUNT] {
        let mut out = [0.0; FEATURE_COUNT];
        for i in 0..FEATURE_COUNT {
            out[i] = (v.values[i] - self.mean[i]) / self.scale[i];
        }
        out
    }
}
