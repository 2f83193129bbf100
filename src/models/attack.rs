//! Attack record model and the durable attack log

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::AppResult;

pub const ATTACK_TYPE_DDOS: &str = "DDoS";
pub const MAX_SEVERITY: u8 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct AttackRecord {
    pub id: Uuid,
    pub fingerprint: String,
    pub attack_type: String,
    #[sqlx(try_from = "i64")]
    pub severity: u8,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
    pub ledger_tx: Option<String>,
}

impl AttackRecord {
    /// `min(10, trunc(confidence * 10) + 5)`
    pub fn severity_for(confidence: f64) -> u8 {
        let scaled = (confidence * 10.0).trunc().clamp(0.0, f64::from(MAX_SEVERITY)) as u8;
        (scaled + 5).min(MAX_SEVERITY)
    }
}

/// Append-only store for attack records
#[axum::async_trait]
pub trait AttackLog: Send + Sync {
    /// Persist a record, returning its sequence number
    async fn append(&self, record: &AttackRecord) -> AppResult<i64>;

    /// Most recent first
    async fn query_recent(&self, limit: i64) -> AppResult<Vec<AttackRecord>>;
}

#[axum::async_trait]
impl AttackLog for SqlitePool {
    async fn append(&self, record: &AttackRecord) -> AppResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO attacks (id, fingerprint, attack_type, severity, confidence, timestamp, ledger_tx)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id)
        .bind(&record.fingerprint)
        .bind(&record.attack_type)
        .bind(i64::from(record.severity))
        .bind(record.confidence)
        .bind(record.timestamp)
        .bind(&record.ledger_tx)
        .execute(self)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn query_recent(&self, limit: i64) -> AppResult<Vec<AttackRecord>> {
        let records = sqlx::query_as::<_, AttackRecord>(
            r#"
            SELECT id, fingerprint, attack_type, severity, confidence, timestamp, ledger_tx
            FROM attacks
            ORDER BY seq DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(self)
        .await?;

        Ok(records)
    }
}
