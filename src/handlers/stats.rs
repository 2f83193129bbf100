//! Aggregate statistics handler

use axum::{extract::State, Json};
use serde::Serialize;

use crate::{AppResult, AppState};

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total_detected: u64,
    pub total_blocked: u64,
    pub active_attacks: u32,
    pub attack_intensity: f64,
    pub ledger_attacks: u64,
    pub active_nodes: usize,
    pub active_streams: usize,
}

pub async fn get(State(state): State<AppState>) -> AppResult<Json<StatsResponse>> {
    let defense = &state.defense;
    let totals = defense.stats.totals();
    let attack = defense.attack.snapshot();

    let ledger = defense.attestor.ledger();
    let ledger_attacks = if ledger.is_connected().await {
        ledger.attack_count().await?
    } else {
        0
    };

    Ok(Json(StatsResponse {
        total_detected: totals.total_detected,
        total_blocked: totals.total_blocked,
        active_attacks: u32::from(attack.active),
        attack_intensity: attack.intensity,
        ledger_attacks,
        active_nodes: defense.registry.len(),
        active_streams: totals.active_streams,
    }))
}
