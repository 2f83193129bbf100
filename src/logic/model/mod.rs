//! Model Module - unsupervised anomaly scoring
//!
//! Scaler + isolation forest trained once on normal traffic, a decision
//! policy on top, and versioned snapshot persistence.

pub mod scaler;
pub mod forest;
pub mod threshold;
pub mod storage;
pub mod scorer;


// Re-export common types
pub use forest::{ForestError, ForestParams, IsolationForest};
pub use scorer::{AnomalyScorer, ScorerStatus, TrainedModel};
pub use storage::ModelStoreError;
pub use threshold::{DetectionLabel, DetectionPolicy, DetectionResult};
