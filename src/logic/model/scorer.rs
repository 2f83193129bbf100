//! Anomaly Scorer
//!
//! Owns the trained scaler + forest. Training builds a complete new model and
//! publishes it with a single pointer swap, so concurrent `predict` calls see
//! either the old model or the new one, never a mix.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use crate::config::Config;
use crate::logic::features::{FeatureGenerator, FeatureVector};
use super::forest::{ForestError, ForestParams, IsolationForest};
use super::scaler::StandardScaler;
use super::storage::{self, ModelSnapshot, ModelStoreError};
use super::threshold::{DetectionPolicy, DetectionResult};

/// Immutable trained state shared by all sessions
#[derive(Debug)]
pub struct TrainedModel {
    pub scaler: StandardScaler,
    pub forest: IsolationForest,
    pub trained_at: DateTime<Utc>,
    pub training_samples: usize,
}

/// Scorer status for health/status reporting
#[derive(Debug, Clone, Serialize)]
pub struct ScorerStatus {
    pub trained: bool,
    pub trained_at: Option<DateTime<Utc>>,
    pub training_samples: usize,
    pub n_trees: usize,
    pub offset: Option<f64>,
    pub confirm_threshold: f64,
}

pub struct AnomalyScorer {
    model: RwLock<Option<Arc<TrainedModel>>>,
    policy: DetectionPolicy,
    params: ForestParams,
}

impl AnomalyScorer {
    pub fn new(policy: DetectionPolicy, params: ForestParams) -> Self {
        Self {
            model: RwLock::new(None),
            policy,
            params,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            DetectionPolicy::new(config.confirm_threshold),
            ForestParams {
                n_estimators: config.model_trees,
                contamination: config.contamination,
                random_state: config.model_seed,
                ..ForestParams::default()
            },
        )
    }

    /// Fit scaler and forest on normal-regime vectors, then swap them in
    pub fn train(&self, normal_vectors: &[FeatureVector]) -> Result<(), ForestError> {
        let scaler = StandardScaler::fit(normal_vectors);
        let scaled: Vec<_> = normal_vectors.iter().map(|v| scaler.transform(v)).collect();
        let forest = IsolationForest::fit(&scaled, &self.params)?;

        let model = TrainedModel {
            scaler,
            forest,
            trained_at: Utc::now(),
            training_samples: normal_vectors.len(),
        };
        self.install(model);

        tracing::info!(
            "Anomaly scorer trained on {} samples ({} trees)",
            normal_vectors.len(),
            self.params.n_estimators
        );
        Ok(())
    }

    fn install(&self, model: TrainedModel) {
        *self.model.write() = Some(Arc::new(model));
    }

    /// Score one vector. Before training this is a neutral `Unknown` result.
    pub fn predict(&self, vector: &FeatureVector) -> DetectionResult {
        let Some(model) = self.current() else {
            return DetectionResult::unknown();
        };

        let scaled = model.scaler.transform(vector);
        let score = model.forest.score_samples(&scaled);
        let is_outlier = model.forest.is_outlier(score);

        self.policy.classify(is_outlier, score.abs())
    }

    pub fn is_trained(&self) -> bool {
        self.model.read().is_some()
    }

    pub fn current(&self) -> Option<Arc<TrainedModel>> {
        self.model.read().clone()
    }

    pub fn status(&self) -> ScorerStatus {
        let model = self.current();
        ScorerStatus {
            trained: model.is_some(),
            trained_at: model.as_ref().map(|m| m.trained_at),
            training_samples: model.as_ref().map_or(0, |m| m.training_samples),
            n_trees: model.as_ref().map_or(0, |m| m.forest.n_trees()),
            offset: model.as_ref().map(|m| m.forest.offset()),
            confirm_threshold: self.policy.confirm_threshold,
        }
    }

    /// Persist the current model to `dir`
    pub fn save(&self, dir: &Path) -> Result<PathBuf, ModelStoreError> {
        let model = self.current().ok_or(ModelStoreError::NotTrained)?;
        let snapshot = ModelSnapshot::new(
            model.scaler.clone(),
            model.forest.clone(),
            model.trained_at,
            model.training_samples,
        )?;
        let path = storage::save_snapshot(&snapshot, dir)?;
        tracing::info!("Scorer snapshot saved to {}", path.display());
        Ok(path)
    }

    /// Load a snapshot from `dir`. Any failure leaves the scorer as it was and
    /// returns false so the caller can retrain.
    pub fn load(&self, dir: &Path) -> bool {
        match storage::load_snapshot(dir) {
            Ok(snapshot) => {
                self.install(TrainedModel {
                    scaler: snapshot.scaler,
                    forest: snapshot.forest,
                    trained_at: snapshot.trained_at,
                    training_samples: snapshot.training_samples,
                });
                tracing::info!("Scorer snapshot loaded from {}", dir.display());
                true
            }
            Err(e) => {
                tracing::warn!("Scorer snapshot not loaded from {}: {}", dir.display(), e);
                false
            }
        }
    }

    /// Retrain on freshly generated normal traffic, then persist
    pub fn train_synthetic(&self, config: &Config) -> Result<(), ForestError> {
        let data = FeatureGenerator::new(config.simulation_seed).training_data(config.training_samples);
        self.train(&data)?;

        if let Err(e) = self.save(&config.model_dir) {
            tracing::warn!("Trained scorer could not be persisted: {}", e);
        }
        Ok(())
    }

    /// Use the stored snapshot when valid, otherwise train. Returns true when
    /// the snapshot was used.
    pub fn load_or_train(&self, config: &Config) -> Result<bool, ForestError> {
        if self.load(&config.model_dir) {
            return Ok(true);
        }
        self.train_synthetic(config)?;
        Ok(false)
    }
}

impl Default for AnomalyScorer {
    fn default() -> Self {
        Self::new(DetectionPolicy::default(), ForestParams::default())
    }
}
