//! Attack fingerprints
//!
//! One-way identifier for an attack observation. Identical inputs always give
//! the same fingerprint, so records can be correlated across nodes and the
//! ledger without exposing the source address.

use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};

const DELIMITER: char = ':';

/// `sha256("{source}:{attack_type}:{timestamp}")` as lowercase hex
pub fn fingerprint(source_identity: &str, attack_type: &str, timestamp: &DateTime<Utc>) -> String {
    let data = format!(
        "{source_identity}{DELIMITER}{attack_type}{DELIMITER}{}",
        timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
    );

    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    hex::encode(hasher.finalize())
}
