//! Isolation Forest
//!
//! Unsupervised outlier model trained on scaled normal traffic. Scores follow
//! the `score_samples` convention: `-2^(-E[h(x)] / c(psi))`, so values lie in
//! (-1, 0) and lower means more anomalous. The decision offset is the
//! `contamination` quantile of the training scores.

use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::logic::features::FEATURE_COUNT;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Maximum sub-sample per tree
pub const DEFAULT_MAX_SAMPLES: usize = 256;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ForestError {
    #[error("insufficient data: need at least {needed} samples, have {actual}")]
    InsufficientData { needed: usize, actual: usize },
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Training parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_samples: usize,
    pub contamination: f64,
    pub random_state: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_samples: DEFAULT_MAX_SAMPLES,
            contamination: 0.1,
            random_state: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum IsolationNode {
    Split {
        feature: usize,
        threshold: f64,
        left: Box<IsolationNode>,
        right: Box<IsolationNode>,
    },
    Leaf {
        size: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct IsolationTree {
    root: IsolationNode,
}

impl IsolationTree {
    fn build(data: &[&[f64; FEATURE_COUNT]], height_limit: usize, rng: &mut StdRng) -> Self {
        Self { root: grow(data, 0, height_limit, rng) }
    }

    fn path_length(&self, x: &[f64; FEATURE_COUNT]) -> f64 {
        let mut node = &self.root;
        let mut depth = 0usize;
        loop {
            match node {
                IsolationNode::Leaf { size } => return depth as f64 + average_path_length(*size),
                IsolationNode::Split { feature, threshold, left, right } => {
                    node = if x[*feature] < *threshold { left } else { right };
                    depth += 1;
                }
            }
        }
    }
}

fn grow(
    data: &[&[f64; FEATURE_COUNT]],
    depth: usize,
    height_limit: usize,
    rng: &mut StdRng,
) -> IsolationNode {
    if depth >= height_limit || data.len() <= 1 {
        return IsolationNode::Leaf { size: data.len() };
    }

    // Only dimensions that still vary in this node can split it
    let mut candidates = Vec::with_capacity(FEATURE_COUNT);
    for feature in 0..FEATURE_COUNT {
        let (min, max) = bounds(data, feature);
        if max - min > f64::EPSILON {
            candidates.push((feature, min, max));
        }
    }
    if candidates.is_empty() {
        return IsolationNode::Leaf { size: data.len() };
    }

    let (feature, min, max) = candidates[rng.gen_range(0..candidates.len())];
    let threshold = rng.gen_range(min..max);

    let (left, right): (Vec<_>, Vec<_>) = data.iter().copied().partition(|x| x[feature] < threshold);

    IsolationNode::Split {
        feature,
        threshold,
        left: Box::new(grow(&left, depth + 1, height_limit, rng)),
        right: Box::new(grow(&right, depth + 1, height_limit, rng)),
    }
}

fn bounds(data: &[&[f64; FEATURE_COUNT]], feature: usize) -> (f64, f64) {
    data.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), x| {
        (lo.min(x[feature]), hi.max(x[feature]))
    })
}

/// Average path length of an unsuccessful BST search over `n` points
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Linear-interpolated quantile, `q` in [0, 1]
fn quantile(values: &mut [f64], q: f64) -> f64 {
    values.sort_by(|a, b| a.total_cmp(b));
    let pos = q.clamp(0.0, 1.0) * (values.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    values[lower] + (values[upper] - values[lower]) * frac
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    max_samples: usize,
    offset: f64,
}

impl IsolationForest {
    /// Fit on already-scaled training vectors
    pub fn fit(data: &[[f64; FEATURE_COUNT]], params: &ForestParams) -> Result<Self, ForestError> {
        if data.len() < 2 {
            return Err(ForestError::InsufficientData { needed: 2, actual: data.len() });
        }
        if params.n_estimators == 0 {
            return Err(ForestError::InvalidParameter("n_estimators must be > 0".into()));
        }
        if !(0.0..=0.5).contains(&params.contamination) {
            return Err(ForestError::InvalidParameter(format!(
                "contamination must be in [0, 0.5], got {}",
                params.contamination
            )));
        }

        let max_samples = params.max_samples.clamp(2, data.len());
        let height_limit = (max_samples as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(params.random_state);

        let trees = (0..params.n_estimators)
            .map(|_| {
                let subsample: Vec<&[f64; FEATURE_COUNT]> = index::sample(&mut rng, data.len(), max_samples)
                    .into_iter()
                    .map(|i| &data[i])
                    .collect();
                IsolationTree::build(&subsample, height_limit, &mut rng)
            })
            .collect();

        let mut forest = Self { trees, max_samples, offset: -0.5 };

        let mut training_scores: Vec<f64> = data.iter().map(|x| forest.score_samples(x)).collect();
        forest.offset = quantile(&mut training_scores, params.contamination);

        Ok(forest)
    }

    /// Anomaly score, negative; lower is more anomalous
    pub fn score_samples(&self, x: &[f64; FEATURE_COUNT]) -> f64 {
        let mean_path = self.trees.iter().map(|t| t.path_length(x)).sum::<f64>() / self.trees.len() as f64;
        -(2f64.powf(-mean_path / average_path_length(self.max_samples)))
    }

    /// Outlier verdict for a score produced by `score_samples`
    pub fn is_outlier(&self, score: f64) -> bool {
        score < self.offset
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}
