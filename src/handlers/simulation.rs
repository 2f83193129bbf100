//! Simulation control handlers - scorer init and attack state

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::logic::features::AttackState;
use crate::logic::model::ScorerStatus;
use crate::{AppError, AppResult, AppState};

pub const DEFAULT_INTENSITY: f64 = 0.5;

#[derive(Debug, Deserialize, Validate)]
pub struct StartAttackQuery {
    #[validate(range(min = 0.0, max = 1.0))]
    pub intensity: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct InitResponse {
    pub status: &'static str,
    pub model: ScorerStatus,
}

#[derive(Debug, Serialize)]
pub struct AttackResponse {
    pub status: &'static str,
    pub active: bool,
    pub intensity: f64,
}

impl AttackResponse {
    fn new(status: &'static str, state: AttackState) -> Self {
        Self {
            status,
            active: state.active,
            intensity: state.intensity,
        }
    }
}

/// Train the scorer if it is not trained yet
pub async fn init(State(state): State<AppState>) -> AppResult<Json<InitResponse>> {
    let scorer = Arc::clone(&state.defense.scorer);
    if scorer.is_trained() {
        return Ok(Json(InitResponse {
            status: "already_trained",
            model: scorer.status(),
        }));
    }

    let config = state.config.clone();
    let trainer = Arc::clone(&scorer);
    tokio::task::spawn_blocking(move || trainer.train_synthetic(&config))
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?
        .map_err(|e| AppError::ModelError(e.to_string()))?;

    Ok(Json(InitResponse {
        status: "initialized",
        model: scorer.status(),
    }))
}

pub async fn start_attack(
    State(state): State<AppState>,
    Query(query): Query<StartAttackQuery>,
) -> AppResult<Json<AttackResponse>> {
    query.validate()?;

    let attack = state.defense.attack.start(query.intensity.unwrap_or(DEFAULT_INTENSITY));
    tracing::info!("Attack simulation started (intensity {:.2})", attack.intensity);

    Ok(Json(AttackResponse::new("attack_started", attack)))
}

pub async fn stop_attack(State(state): State<AppState>) -> Json<AttackResponse> {
    let attack = state.defense.attack.stop();
    tracing::info!("Attack simulation stopped");
    Json(AttackResponse::new("attack_stopped", attack))
}

pub async fn escalate_attack(State(state): State<AppState>) -> Json<AttackResponse> {
    let attack = state.defense.attack.escalate();
    if attack.active {
        tracing::info!("Attack escalated to intensity {:.2}", attack.intensity);
        Json(AttackResponse::new("attack_escalated", attack))
    } else {
        Json(AttackResponse::new("no_active_attack", attack))
    }
}
