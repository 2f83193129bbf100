//! Streaming pipeline
//!
//! One `StreamCoordinator` per observer. Coordinators share a `DefenseContext`
//! (scorer, attestor, registry, attack state, counters) and nothing else.

mod coordinator;


use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::logic::attestor::Attestor;
use crate::logic::features::{AttackControl, TrafficSample};
use crate::logic::model::{AnomalyScorer, DetectionResult};
use crate::logic::registry::NodeRegistry;
use crate::models::AttackRecord;

pub use coordinator::StreamCoordinator;

// ============================================================================
// MESSAGES
// ============================================================================

/// Where a coordinator is in its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamPhase {
    Idle,
    Sampling,
    Scoring,
    Deciding,
    Attesting,
    Emitting,
    Closed,
}

/// Provenance of a record attested during this cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttackLogged {
    pub tx_hash: Option<String>,
    pub severity: u8,
    pub fingerprint: String,
    pub record_id: Uuid,
}

impl From<&AttackRecord> for AttackLogged {
    fn from(record: &AttackRecord) -> Self {
        Self {
            tx_hash: record.ledger_tx.clone(),
            severity: record.severity,
            fingerprint: record.fingerprint.clone(),
            record_id: record.id,
        }
    }
}

/// One emitted result per cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamMessage {
    pub traffic: TrafficSample,
    pub detection: DetectionResult,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attack_logged: Option<AttackLogged>,
}

/// Per-session totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub cycles: u64,
    pub total_detected: u64,
    pub total_blocked: u64,
}

// ============================================================================
// TRANSPORT
// ============================================================================

#[derive(Debug, thiserror::Error)]
#[error("transport closed")]
pub struct TransportClosed;

/// Observer-facing sink for cycle results
#[axum::async_trait]
pub trait Transport: Send + Sync {
    async fn emit(&mut self, message: StreamMessage) -> Result<(), TransportClosed>;

    /// True once the observer has gone away
    fn is_closed(&self) -> bool;

    /// Resolves when the observer goes away
    async fn closed(&self);
}

#[axum::async_trait]
impl Transport for mpsc::Sender<StreamMessage> {
    async fn emit(&mut self, message: StreamMessage) -> Result<(), TransportClosed> {
        self.send(message).await.map_err(|_| TransportClosed)
    }

    fn is_closed(&self) -> bool {
        mpsc::Sender::is_closed(self)
    }

    async fn closed(&self) {
        mpsc::Sender::closed(self).await
    }
}

// ============================================================================
// SHARED CONTEXT
// ============================================================================

/// Service-wide counters across all sessions
#[derive(Debug, Default)]
pub struct DefenseStats {
    total_detected: AtomicU64,
    total_blocked: AtomicU64,
    active_streams: AtomicUsize,
    sessions_started: AtomicU64,
}

/// Handed out when an observer session opens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTicket {
    /// 1-based, never reused
    pub session: u64,
    pub active: usize,
}

impl SessionTicket {
    /// Reproducible per-session seed derived from a base seed
    pub fn seed(&self, base: Option<u64>) -> Option<u64> {
        base.map(|seed| seed.wrapping_add(self.session))
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct DefenseTotals {
    pub total_detected: u64,
    pub total_blocked: u64,
    pub active_streams: usize,
}

impl DefenseStats {
    pub fn record_attack(&self, blocked: u64) {
        self.total_detected.fetch_add(1, Ordering::Relaxed);
        self.total_blocked.fetch_add(blocked, Ordering::Relaxed);
    }

    pub fn stream_opened(&self) -> SessionTicket {
        let session = self.sessions_started.fetch_add(1, Ordering::Relaxed) + 1;
        let active = self.active_streams.fetch_add(1, Ordering::Relaxed) + 1;
        SessionTicket { session, active }
    }

    pub fn stream_closed(&self) -> usize {
        self.active_streams.fetch_sub(1, Ordering::Relaxed).saturating_sub(1)
    }

    pub fn totals(&self) -> DefenseTotals {
        DefenseTotals {
            total_detected: self.total_detected.load(Ordering::Relaxed),
            total_blocked: self.total_blocked.load(Ordering::Relaxed),
            active_streams: self.active_streams.load(Ordering::Relaxed),
        }
    }
}

/// Everything the pipeline shares between sessions
#[derive(Clone)]
pub struct DefenseContext {
    pub scorer: Arc<AnomalyScorer>,
    pub attestor: Arc<Attestor>,
    pub registry: Arc<NodeRegistry>,
    pub attack: Arc<AttackControl>,
    pub stats: Arc<DefenseStats>,
}

impl DefenseContext {
    pub fn new(scorer: Arc<AnomalyScorer>, attestor: Arc<Attestor>, registry: Arc<NodeRegistry>) -> Self {
        Self {
            scorer,
            attestor,
            registry,
            attack: Arc::new(AttackControl::new()),
            stats: Arc::new(DefenseStats::default()),
        }
    }
}
