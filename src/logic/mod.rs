//! Logic Module - detection pipeline
//!
//! - `features/` - synthetic traffic and the feature layout
//! - `model/` - anomaly scoring (scaler, isolation forest, policy, snapshots)
//! - `fingerprint` - one-way attack identifiers
//! - `attestor` - durable log + ledger anchoring
//! - `registry` - cooperating nodes
//! - `stream/` - per-observer pipeline loop

// Pipeline stages
pub mod features;
pub mod model;
pub mod fingerprint;
pub mod attestor;
pub mod registry;

// Session loop
pub mod stream;
