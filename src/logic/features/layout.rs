//! Feature Layout - Centralized Feature Definition
//!
//! Order of `FEATURE_LAYOUT` is the order of every vector fed to the scorer,
//! both at training and at inference time. Persisted scorer snapshots carry
//! the version and hash below so a reordered layout is never scored against
//! an old model.
//!
//! ## Rules:
//! 1. Add feature → increment FEATURE_VERSION
//! 2. Change order → increment FEATURE_VERSION
//! 3. Remove feature → increment FEATURE_VERSION

use crc32fast::Hasher;
use serde::{Deserialize, Serialize};

/// Current feature layout version
pub const FEATURE_VERSION: u8 = 1;

/// Feature names in exact order they appear in the vector
pub const FEATURE_LAYOUT: &[&str] = &[
    "packet_rate",      // 0: packets per second
    "ip_entropy",       // 1: entropy of source addresses
    "syn_ratio",        // 2: SYN packets / all TCP packets
    "unique_ips",       // 3: distinct sources in the window
    "protocol_ratio",   // 4: share of the dominant protocol
    "avg_packet_size",  // 5: mean packet size in bytes
];

/// Total number of features
pub const FEATURE_COUNT: usize = 6;

/// Compute CRC32 hash of the feature layout
pub fn layout_hash() -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(&[FEATURE_VERSION]);

    for name in FEATURE_LAYOUT {
        hasher.update(name.as_bytes());
        hasher.update(&[0]);
    }

    hasher.finalize()
}

/// Get index of feature by name
pub fn feature_index(name: &str) -> Option<usize> {
    FEATURE_LAYOUT.iter().position(|&n| n == name)
}

/// Layout mismatch error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("feature layout mismatch: expected v{expected_version} ({expected_hash:x}), got v{actual_version} ({actual_hash:x})")]
pub struct LayoutMismatchError {
    pub expected_version: u8,
    pub expected_hash: u32,
    pub actual_version: u8,
    pub actual_hash: u32,
}

/// Validate a (version, hash) pair against the current layout
pub fn validate_layout(version: u8, hash: u32) -> Result<(), LayoutMismatchError> {
    let expected_hash = layout_hash();
    if version != FEATURE_VERSION || hash != expected_hash {
        return Err(LayoutMismatchError {
            expected_version: FEATURE_VERSION,
            expected_hash,
            actual_version: version,
            actual_hash: hash,
        });
    }
    Ok(())
}
