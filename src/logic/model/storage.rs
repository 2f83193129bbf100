//! Scorer snapshot persistence
//!
//! Snapshots are versioned JSON documents holding the scaler and forest.
//! Loading validates the snapshot format, the feature layout and a SHA-256
//! checksum over the model parameters before anything is used.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::logic::features::layout::{layout_hash, validate_layout, LayoutMismatchError, FEATURE_VERSION};
use super::forest::IsolationForest;
use super::scaler::StandardScaler;

/// Current snapshot format version
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Snapshot file name inside the model directory
pub const SNAPSHOT_FILE: &str = "scorer_v1.json";

#[derive(Debug, thiserror::Error)]
pub enum ModelStoreError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error(transparent)]
    LayoutMismatch(#[from] LayoutMismatchError),
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },
    #[error("unsupported snapshot format v{0}")]
    UnsupportedVersion(u32),
    #[error("scorer is not trained")]
    NotTrained,
}

/// Persisted scorer state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub format_version: u32,
    pub feature_version: u8,
    pub layout_hash: u32,
    pub trained_at: DateTime<Utc>,
    pub training_samples: usize,
    pub scaler: StandardScaler,
    pub forest: IsolationForest,
    pub checksum: String,
}

impl ModelSnapshot {
    pub fn new(
        scaler: StandardScaler,
        forest: IsolationForest,
        trained_at: DateTime<Utc>,
        training_samples: usize,
    ) -> Result<Self, ModelStoreError> {
        let checksum = params_checksum(&scaler, &forest)?;
        Ok(Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            feature_version: FEATURE_VERSION,
            layout_hash: layout_hash(),
            trained_at,
            training_samples,
            scaler,
            forest,
            checksum,
        })
    }

    /// Validate format, layout and checksum
    pub fn validate(&self) -> Result<(), ModelStoreError> {
        if self.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(ModelStoreError::UnsupportedVersion(self.format_version));
        }
        validate_layout(self.feature_version, self.layout_hash)?;

        let actual = params_checksum(&self.scaler, &self.forest)?;
        if actual != self.checksum {
            return Err(ModelStoreError::ChecksumMismatch {
                expected: self.checksum.clone(),
                actual,
            });
        }
        Ok(())
    }
}

fn params_checksum(scaler: &StandardScaler, forest: &IsolationForest) -> Result<String, ModelStoreError> {
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(scaler)?);
    hasher.update(serde_json::to_vec(forest)?);
    Ok(hex::encode(hasher.finalize()))
}

pub fn snapshot_path(dir: &Path) -> PathBuf {
    dir.join(SNAPSHOT_FILE)
}

/// Write snapshot to `dir`, replacing any previous one
pub fn save_snapshot(snapshot: &ModelSnapshot, dir: &Path) -> Result<PathBuf, ModelStoreError> {
    fs::create_dir_all(dir)?;

    let path = snapshot_path(dir);
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_vec(snapshot)?)?;
    fs::rename(&tmp, &path)?;
    Ok(path)
}

/// Read and validate snapshot from `dir`
pub fn load_snapshot(dir: &Path) -> Result<ModelSnapshot, ModelStoreError> {
    let data = fs::read(snapshot_path(dir))?;
    let snapshot: ModelSnapshot = serde_json::from_slice(&data)?;
    snapshot.validate()?;
    Ok(snapshot)
}
