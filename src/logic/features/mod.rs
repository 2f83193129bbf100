//! Features Module - traffic feature layout, vectors and the synthetic generator

pub mod layout;
pub mod vector;
pub mod generator;

pub use layout::{FEATURE_COUNT, FEATURE_LAYOUT, FEATURE_VERSION, layout_hash};
pub use vector::{FeatureVector, Regime, TrafficSample};
pub use generator::{AttackControl, AttackState, FeatureGenerator};
