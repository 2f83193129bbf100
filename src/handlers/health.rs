//! Health check handlers

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct BannerResponse {
    service: &'static str,
    version: &'static str,
    status: &'static str,
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    database: bool,
    model_trained: bool,
    ledger_backend: &'static str,
    ledger_connected: bool,
    active_connections: usize,
    cloud_nodes: usize,
    timestamp: i64,
}

pub async fn banner() -> Json<BannerResponse> {
    Json(BannerResponse {
        service: "ledger-shield",
        version: env!("CARGO_PKG_VERSION"),
        status: "running",
    })
}

pub async fn check(State(state): State<AppState>) -> Json<HealthResponse> {
    let defense = &state.defense;
    let ledger = defense.attestor.ledger();
    let database = sqlx::query("SELECT 1").execute(&state.pool).await.is_ok();

    Json(HealthResponse {
        status: if database { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        database,
        model_trained: defense.scorer.is_trained(),
        ledger_backend: ledger.name(),
        ledger_connected: ledger.is_connected().await,
        active_connections: defense.stats.totals().active_streams,
        cloud_nodes: defense.registry.len(),
        timestamp: chrono::Utc::now().timestamp(),
    })
}
