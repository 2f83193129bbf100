//! Ledger Module - tamper-evident anchoring of confirmed attacks
//!
//! The attestor only talks to `LedgerClient`. Backends:
//! - `ChainLedger`: in-process hash chain, optionally persisted as JSONL
//! - `HttpLedger`: remote ledger gateway
//! - `OfflineLedger`: always disconnected

pub mod chain;
pub mod http;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{Config, LedgerMode};

pub use chain::ChainLedger;
pub use http::HttpLedger;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("ledger not connected")]
    Disconnected,
    #[error("ledger request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("ledger gateway returned status {0}")]
    Status(u16),
    #[error("ledger io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("ledger serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("ledger integrity violation: {0}")]
    Integrity(String),
}

/// What gets anchored for one confirmed attack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub fingerprint: String,
    pub attack_type: String,
    pub severity: u8,
    /// Unix seconds
    pub timestamp: i64,
}

/// An anchored attack as read back from the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerAttack {
    pub id: u64,
    pub fingerprint: String,
    pub attack_type: String,
    pub severity: u8,
    pub timestamp: i64,
    pub reporter: String,
    pub tx_hash: String,
    pub recorded_at: DateTime<Utc>,
}

#[axum::async_trait]
pub trait LedgerClient: Send + Sync {
    /// Backend name for logs and health output
    fn name(&self) -> &'static str;

    async fn is_connected(&self) -> bool;

    /// Anchor an entry; `Ok(None)` means the ledger accepted nothing
    async fn log_attack(&self, entry: LedgerEntry) -> Result<Option<String>, LedgerError>;

    async fn attack_count(&self) -> Result<u64, LedgerError>;

    async fn get_attack(&self, id: u64) -> Result<Option<LedgerAttack>, LedgerError>;

    async fn is_threat_known(&self, fingerprint: &str) -> Result<bool, LedgerError>;

    /// Last `count` attacks, oldest first
    async fn recent_attacks(&self, count: u64) -> Result<Vec<LedgerAttack>, LedgerError> {
        let total = self.attack_count().await?;
        let mut attacks = Vec::new();
        for id in total.saturating_sub(count)..total {
            if let Some(attack) = self.get_attack(id).await? {
                attacks.push(attack);
            }
        }
        Ok(attacks)
    }
}

/// Ledger that is never connected
#[derive(Debug, Default)]
pub struct OfflineLedger;

#[axum::async_trait]
impl LedgerClient for OfflineLedger {
    fn name(&self) -> &'static str {
        "offline"
    }

    async fn is_connected(&self) -> bool {
        false
    }

    async fn log_attack(&self, _entry: LedgerEntry) -> Result<Option<String>, LedgerError> {
        Err(LedgerError::Disconnected)
    }

    async fn attack_count(&self) -> Result<u64, LedgerError> {
        Ok(0)
    }

    async fn get_attack(&self, _id: u64) -> Result<Option<LedgerAttack>, LedgerError> {
        Ok(None)
    }

    async fn is_threat_known(&self, _fingerprint: &str) -> Result<bool, LedgerError> {
        Ok(false)
    }
}

/// Build the configured ledger backend
pub fn connect(config: &Config) -> Result<Arc<dyn LedgerClient>, LedgerError> {
    let ledger: Arc<dyn LedgerClient> = match config.ledger_mode {
        LedgerMode::Chain => match &config.ledger_file {
            Some(path) => Arc::new(ChainLedger::open(path, "ledger-shield")?),
            None => Arc::new(ChainLedger::new("ledger-shield")),
        },
        LedgerMode::Http => Arc::new(HttpLedger::new(&config.ledger_url, config.ledger_receipt_timeout)?),
        LedgerMode::Off => Arc::new(OfflineLedger),
    };

    tracing::info!("Ledger backend: {}", ledger.name());
    Ok(ledger)
}
