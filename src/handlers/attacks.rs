//! Attack log and ledger query handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::ledger::LedgerAttack;
use crate::models::AttackRecord;
use crate::{AppResult, AppState};

pub const DEFAULT_RECENT_LIMIT: i64 = 20;

/// Ledger attacks returned by `/ledger/attacks`
pub const LEDGER_WINDOW: u64 = 20;

#[derive(Debug, Deserialize, Validate)]
pub struct RecentQuery {
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct RecentResponse {
    pub attacks: Vec<AttackRecord>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct LedgerAttacksResponse {
    pub attacks: Vec<LedgerAttack>,
    /// Entries in `attacks`
    pub count: usize,
    /// Entries in the whole ledger
    pub total: u64,
    pub connected: bool,
}

#[derive(Debug, Serialize)]
pub struct ThreatResponse {
    pub fingerprint: String,
    pub known: bool,
}

/// Most recent durable log entries
pub async fn recent(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> AppResult<Json<RecentResponse>> {
    query.validate()?;

    let log = state.defense.attestor.log();
    let attacks = log.query_recent(query.limit.unwrap_or(DEFAULT_RECENT_LIMIT)).await?;

    Ok(Json(RecentResponse {
        count: attacks.len(),
        attacks,
    }))
}

/// Latest ledger-anchored attacks; empty when the ledger is down
pub async fn ledger_attacks(State(state): State<AppState>) -> AppResult<Json<LedgerAttacksResponse>> {
    let ledger = state.defense.attestor.ledger();
    if !ledger.is_connected().await {
        return Ok(Json(LedgerAttacksResponse {
            attacks: Vec::new(),
            count: 0,
            total: 0,
            connected: false,
        }));
    }

    let total = ledger.attack_count().await?;
    let attacks = ledger.recent_attacks(LEDGER_WINDOW).await?;

    Ok(Json(LedgerAttacksResponse {
        count: attacks.len(),
        total,
        attacks,
        connected: true,
    }))
}

pub async fn threat_known(
    State(state): State<AppState>,
    Path(fingerprint): Path<String>,
) -> AppResult<Json<ThreatResponse>> {
    let ledger = state.defense.attestor.ledger();
    let known = if ledger.is_connected().await {
        ledger.is_threat_known(&fingerprint).await?
    } else {
        false
    };

    Ok(Json(ThreatResponse { fingerprint, known }))
}
