//! Attestor - turns a Confirmed verdict into an immutable attack record
//!
//! Order of effects: fingerprint, bounded ledger write, durable log append.
//! The ledger is best-effort; the durable log is not.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::ledger::{LedgerClient, LedgerEntry};
use crate::logic::features::FeatureVector;
use crate::logic::fingerprint::fingerprint;
use crate::logic::model::DetectionResult;
use crate::models::{AttackLog, AttackRecord, ATTACK_TYPE_DDOS};
use crate::{AppError, AppResult};

pub struct Attestor {
    log: Arc<dyn AttackLog>,
    ledger: Arc<dyn LedgerClient>,
    receipt_timeout: Duration,
}

impl Attestor {
    pub fn new(log: Arc<dyn AttackLog>, ledger: Arc<dyn LedgerClient>, receipt_timeout: Duration) -> Self {
        Self { log, ledger, receipt_timeout }
    }

    pub fn ledger(&self) -> &Arc<dyn LedgerClient> {
        &self.ledger
    }

    pub fn log(&self) -> &Arc<dyn AttackLog> {
        &self.log
    }

    /// Record one confirmed attack. `timestamp` is the sample's and feeds the
    /// fingerprint; the record and the ledger entry carry the attestation time.
    pub async fn attest(
        &self,
        vector: &FeatureVector,
        result: &DetectionResult,
        source: &str,
        timestamp: DateTime<Utc>,
    ) -> AppResult<AttackRecord> {
        if !result.label.is_confirmed() {
            return Err(AppError::ValidationError(format!(
                "only confirmed detections are attested, got {:?}",
                result.label
            )));
        }

        let fingerprint = fingerprint(source, ATTACK_TYPE_DDOS, &timestamp);
        let recorded_at = Utc::now();
        let severity = AttackRecord::severity_for(result.confidence);

        tracing::debug!(
            fingerprint = %fingerprint,
            severity,
            confidence = result.confidence,
            packet_rate = vector.values[0],
            "Attesting confirmed attack"
        );

        let ledger_tx = self
            .anchor(LedgerEntry {
                fingerprint: fingerprint.clone(),
                attack_type: ATTACK_TYPE_DDOS.to_string(),
                severity,
                timestamp: recorded_at.timestamp(),
            })
            .await;

        let record = AttackRecord {
            id: Uuid::new_v4(),
            fingerprint,
            attack_type: ATTACK_TYPE_DDOS.to_string(),
            severity,
            confidence: result.confidence,
            timestamp: recorded_at,
            ledger_tx,
        };

        let seq = self.log.append(&record).await?;
        tracing::info!("Attack {} logged (seq {}, severity {})", record.id, seq, record.severity);

        Ok(record)
    }

    /// Ledger write bounded by `receipt_timeout`; any failure yields `None`
    async fn anchor(&self, entry: LedgerEntry) -> Option<String> {
        if !self.ledger.is_connected().await {
            tracing::debug!("Ledger {} not connected, skipping anchor", self.ledger.name());
            return None;
        }

        let ledger = Arc::clone(&self.ledger);
        let fingerprint = entry.fingerprint.clone();
        let mut task = tokio::spawn(async move { ledger.log_attack(entry).await });

        match tokio::time::timeout(self.receipt_timeout, &mut task).await {
            Ok(Ok(Ok(Some(tx)))) => Some(tx),
            Ok(Ok(Ok(None))) => {
                tracing::warn!("Ledger returned no receipt for {}", fingerprint);
                None
            }
            Ok(Ok(Err(e))) => {
                tracing::warn!("Ledger write failed for {}: {}", fingerprint, e);
                None
            }
            Ok(Err(e)) => {
                tracing::warn!("Ledger task aborted for {}: {}", fingerprint, e);
                None
            }
            Err(_) => {
                tracing::warn!(
                    "Ledger receipt for {} not received within {:?}",
                    fingerprint,
                    self.receipt_timeout
                );
                tokio::spawn(async move {
                    if let Ok(Ok(Some(tx))) = task.await {
                        tracing::info!("Late ledger confirmation for {}: {}", fingerprint, tx);
                    }
                });
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use sqlx::SqlitePool;

    use super::*;
    use crate::db::memory_pool;
    use crate::ledger::{ChainLedger, LedgerAttack, LedgerError, OfflineLedger};
    use crate::logic::model::DetectionLabel;

    struct FailingLog;

    #[axum::async_trait]
    impl AttackLog for FailingLog {
        async fn append(&self, _record: &AttackRecord) -> AppResult<i64> {
            Err(AppError::DatabaseError("disk full".into()))
        }

        async fn query_recent(&self, _limit: i64) -> AppResult<Vec<AttackRecord>> {
            Ok(Vec::new())
        }
    }

    /// Connected ledger that takes far longer than any receipt bound
    struct SlowLedger;

    #[axum::async_trait]
    impl LedgerClient for SlowLedger {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn is_connected(&self) -> bool {
            true
        }

        async fn log_attack(&self, _entry: LedgerEntry) -> Result<Option<String>, LedgerError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Some("0xlate".into()))
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

    fn confirmed(confidence: f64) -> DetectionResult {
        DetectionResult { is_anomalous: true, confidence, label: DetectionLabel::Confirmed }
    }

    fn vector() -> FeatureVector {
        FeatureVector::from_values([9000.0, 7.5, 0.85, 800.0, 0.8, 200.0])
    }

    async fn count(pool: &SqlitePool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM attacks").fetch_one(pool).await.unwrap()
    }

    #[tokio::test]
    async fn test_offline_ledger_still_appends() {
        let pool = memory_pool().await;
        let attestor = Attestor::new(Arc::new(pool.clone()), Arc::new(OfflineLedger), Duration::from_secs(1));

        let record = attestor.attest(&vector(), &confirmed(0.62), "10.0.1.1", Utc::now()).await.unwrap();
        assert!(record.ledger_tx.is_none());
        assert_eq!(record.severity, 10);
        assert_eq!(record.attack_type, "DDoS");
        assert_eq!(count(&pool).await, 1);
    }

    #[tokio::test]
    async fn test_chain_ledger_receipt_lands_in_record() {
        let pool = memory_pool().await;
        let chain = Arc::new(ChainLedger::new("test"));
        let attestor = Attestor::new(Arc::new(pool.clone()), chain.clone(), Duration::from_secs(1));

        let now = Utc::now();
        let record = attestor.attest(&vector(), &confirmed(0.55), "10.0.1.2", now).await.unwrap();

        assert_eq!(record.ledger_tx, chain.head_hash().map(|h| format!("0x{}", h)));
        assert_eq!(record.fingerprint, fingerprint("10.0.1.2", "DDoS", &now));
        assert!(chain.is_threat_known(&record.fingerprint).await.unwrap());

        let stored = pool.query_recent(1).await.unwrap();
        assert_eq!(stored[0].ledger_tx, record.ledger_tx);
    }

    #[tokio::test]
    async fn test_record_carries_attestation_time() {
        let pool = memory_pool().await;
        let chain = Arc::new(ChainLedger::new("test"));
        let attestor = Attestor::new(Arc::new(pool.clone()), chain.clone(), Duration::from_secs(1));

        let sampled_at = Utc::now() - chrono::Duration::hours(1);
        let started = Utc::now();
        let record = attestor.attest(&vector(), &confirmed(0.8), "10.0.1.6", sampled_at).await.unwrap();

        assert_eq!(record.fingerprint, fingerprint("10.0.1.6", "DDoS", &sampled_at));
        assert!(record.timestamp >= started);

        let anchored = chain.recent_attacks(1).await.unwrap();
        assert_eq!(anchored[0].timestamp, record.timestamp.timestamp());
        assert!(anchored[0].timestamp >= started.timestamp());
    }

    #[tokio::test]
    async fn test_slow_ledger_is_bounded() {
        let pool = memory_pool().await;
        let attestor = Attestor::new(Arc::new(pool.clone()), Arc::new(SlowLedger), Duration::from_millis(50));

        let started = Instant::now();
        let record = attestor.attest(&vector(), &confirmed(0.7), "10.0.1.3", Utc::now()).await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(record.ledger_tx.is_none());
        assert_eq!(count(&pool).await, 1);
    }

    #[tokio::test]
    async fn test_log_failure_fails_attestation() {
        let attestor = Attestor::new(Arc::new(FailingLog), Arc::new(OfflineLedger), Duration::from_secs(1));
        let result = attestor.attest(&vector(), &confirmed(0.9), "10.0.1.4", Utc::now()).await;
        assert!(matches!(result, Err(AppError::DatabaseError(_))));
    }

    #[tokio::test]
    async fn test_non_confirmed_is_rejected() {
        let pool = memory_pool().await;
        let attestor = Attestor::new(Arc::new(pool.clone()), Arc::new(OfflineLedger), Duration::from_secs(1));

        let suspicious = DetectionResult { is_anomalous: true, confidence: 0.4, label: DetectionLabel::Suspicious };
        let result = attestor.attest(&vector(), &suspicious, "10.0.1.5", Utc::now()).await;

        assert!(matches!(result, Err(AppError::ValidationError(_))));
        assert_eq!(count(&pool).await, 0);
    }
}
