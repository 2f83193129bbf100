//! Ledger Shield Server
//!
//! Streaming DDoS detection with tamper-evident attestation.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       LEDGER SHIELD                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐   ┌──────────────────────────────────────┐  │
//! │  │  API      │   │  Stream Coordinator (per observer)   │  │
//! │  │  (Axum)   │──▶│  sample → score → attest → fan-out   │  │
//! │  └───────────┘   └──────────┬─────────────────┬─────────┘  │
//! │                             ▼                 ▼            │
//! │                      ┌────────────┐    ┌────────────┐      │
//! │                      │ SQLite log │    │   Ledger   │      │
//! │                      └────────────┘    └────────────┘      │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod db;
mod error;
mod handlers;
mod ledger;
mod logic;
mod models;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::logic::attestor::Attestor;
use crate::logic::model::AnomalyScorer;
use crate::logic::registry::NodeRegistry;
use crate::logic::stream::DefenseContext;

pub use error::{AppError, AppResult};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = config::Config::from_env();
    init_tracing(&config);

    tracing::info!("Ledger Shield starting ({})", config.environment);
    tracing::info!("Database: {}", config.database_url);

    // Initialize database pool
    let pool = db::create_pool(&config.database_url)
        .await
        .context("Failed to create database pool")?;

    // Run migrations
    tracing::info!("Running database migrations...");
    db::run_migrations(&pool).await.context("Failed to run migrations")?;

    // Build application state
    let state = build_state(pool, config.clone()).await?;

    let scorer = Arc::clone(&state.defense.scorer);
    let bootstrap_config = config.clone();
    let from_snapshot = tokio::task::spawn_blocking(move || scorer.load_or_train(&bootstrap_config))
        .await
        .context("Scorer bootstrap task failed")?
        .context("Failed to train anomaly scorer")?;
    tracing::info!(
        "Anomaly scorer ready ({})",
        if from_snapshot { "snapshot" } else { "freshly trained" }
    );

    // Build router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("🚀 Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

fn init_tracing(config: &config::Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "ledger_shield=debug,tower_http=debug".into());

    if config.json_logs() {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pool: sqlx::SqlitePool,
    pub config: config::Config,
    pub defense: DefenseContext,
}

/// Wire scorer, ledger, attestor and registry into one context
async fn build_state(pool: sqlx::SqlitePool, config: config::Config) -> anyhow::Result<AppState> {
    let ledger = ledger::connect(&config).context("Failed to connect ledger backend")?;
    if !ledger.is_connected().await {
        tracing::warn!("Ledger {} not reachable; attacks will be logged without receipts", ledger.name());
    }

    let attestor = Attestor::new(Arc::new(pool.clone()), ledger, config.ledger_receipt_timeout);

    let registry = NodeRegistry::new();
    registry.bootstrap(config.default_nodes);

    let defense = DefenseContext::new(
        Arc::new(AnomalyScorer::from_config(&config)),
        Arc::new(attestor),
        Arc::new(registry),
    );

    Ok(AppState { pool, config, defense })
}

/// Create the main router with all routes
fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/", get(handlers::health::banner))
        .route("/health", get(handlers::health::check))
        .route("/init", post(handlers::simulation::init))

        // Attack simulation
        .route("/attack/start", post(handlers::simulation::start_attack))
        .route("/attack/stop", post(handlers::simulation::stop_attack))
        .route("/attack/escalate", post(handlers::simulation::escalate_attack))

        // Durable log and ledger
        .route("/attacks/recent", get(handlers::attacks::recent))
        .route("/ledger/attacks", get(handlers::attacks::ledger_attacks))
        .route("/ledger/threats/:fingerprint", get(handlers::attacks::threat_known))

        // Nodes
        .route("/nodes/status", get(handlers::nodes::status))
        .route("/nodes/register", post(handlers::nodes::register))

        // Stats and live stream
        .route("/stats", get(handlers::stats::get))
        .route("/traffic/stream", get(handlers::stream::traffic));

    Router::new()
        .nest("/api", api_routes)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::config::{Config, LedgerMode};
    use crate::logic::features::FeatureGenerator;
    use crate::logic::model::DetectionLabel;

    async fn test_app(ledger_mode: LedgerMode) -> (Router, AppState, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            ledger_mode,
            model_dir: dir.path().to_path_buf(),
            training_samples: 400,
            default_nodes: 3,
            simulation_seed: Some(3),
            ..Config::default()
        };
        let pool = db::memory_pool().await;
        let state = build_state(pool, config).await.unwrap();
        (create_router(state.clone()), state, dir)
    }

    async fn call(app: &Router, method: &str, uri: &str) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn test_health_reports_bootstrap() {
        let (app, _, _dir) = test_app(LedgerMode::Chain).await;

        let (status, body) = call(&app, "GET", "/api/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["model_trained"], false);
        assert_eq!(body["ledger_connected"], true);
        assert_eq!(body["cloud_nodes"], 3);
        assert_eq!(body["active_connections"], 0);

        let (status, body) = call(&app, "GET", "/api").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], "ledger-shield");
    }

    #[tokio::test]
    async fn test_init_trains_once() {
        let (app, state, dir) = test_app(LedgerMode::Chain).await;

        let (status, body) = call(&app, "POST", "/api/init").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "initialized");
        assert_eq!(body["model"]["training_samples"], 400);
        assert!(state.defense.scorer.is_trained());
        assert!(dir.path().join("scorer_v1.json").exists());

        let (_, body) = call(&app, "POST", "/api/init").await;
        assert_eq!(body["status"], "already_trained");
    }

    #[tokio::test]
    async fn test_attack_controls() {
        let (app, _, _dir) = test_app(LedgerMode::Off).await;

        let (status, _) = call(&app, "POST", "/api/attack/start?intensity=1.5").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, body) = call(&app, "POST", "/api/attack/escalate").await;
        assert_eq!(body["status"], "no_active_attack");

        let (status, body) = call(&app, "POST", "/api/attack/start").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["intensity"], 0.5);

        let (_, body) = call(&app, "POST", "/api/attack/escalate").await;
        assert!((body["intensity"].as_f64().unwrap() - 0.7).abs() < 1e-9);

        let (_, body) = call(&app, "GET", "/api/stats").await;
        assert_eq!(body["active_attacks"], 1);
        assert_eq!(body["ledger_attacks"], 0);

        let (_, body) = call(&app, "POST", "/api/attack/stop").await;
        assert_eq!(body["active"], false);
        assert_eq!(body["intensity"], 0.0);
    }

    #[tokio::test]
    async fn test_node_registration() {
        let (app, _, _dir) = test_app(LedgerMode::Off).await;

        let (_, body) = call(&app, "POST", "/api/nodes/register?node_id=edge-eu").await;
        assert_eq!(body["status"], "registered");

        let (_, body) = call(&app, "POST", "/api/nodes/register?node_id=edge-eu").await;
        assert_eq!(body["status"], "exists");

        let (status, _) = call(&app, "POST", "/api/nodes/register?node_id=").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, body) = call(&app, "GET", "/api/nodes/status").await;
        assert_eq!(body["total_nodes"], 4);
        assert_eq!(body["nodes"][3]["node_id"], "edge-eu");
    }

    #[tokio::test]
    async fn test_recent_attacks_and_ledger_queries() {
        let (app, state, _dir) = test_app(LedgerMode::Chain).await;

        let (status, _) = call(&app, "GET", "/api/attacks/recent?limit=500").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // Push one confirmed attack through the attestor directly
        let scorer = &state.defense.scorer;
        scorer.train(&FeatureGenerator::seeded(4).training_data(800)).unwrap();
        let mut generator = FeatureGenerator::seeded(5);
        let record = loop {
            let sample = generator.sample_attack(1.0);
            let result = scorer.predict(&sample.vector());
            if result.label == DetectionLabel::Confirmed {
                break state
                    .defense
                    .attestor
                    .attest(&sample.vector(), &result, &sample.source_ip, sample.timestamp)
                    .await
                    .unwrap();
            }
        };

        let (_, body) = call(&app, "GET", "/api/attacks/recent").await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["attacks"][0]["fingerprint"], record.fingerprint.as_str());

        let (_, body) = call(&app, "GET", "/api/ledger/attacks").await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["total"], 1);
        assert_eq!(body["attacks"][0]["fingerprint"], record.fingerprint.as_str());

        let (_, body) = call(&app, "GET", &format!("/api/ledger/threats/{}", record.fingerprint)).await;
        assert_eq!(body["known"], true);

        let (_, body) = call(&app, "GET", "/api/ledger/threats/unknown").await;
        assert_eq!(body["known"], false);
    }

    #[tokio::test]
    async fn test_ledger_attacks_window() {
        let (app, state, _dir) = test_app(LedgerMode::Chain).await;

        let ledger = state.defense.attestor.ledger();
        for i in 0..25 {
            ledger
                .log_attack(crate::ledger::LedgerEntry {
                    fingerprint: format!("fp{}", i),
                    attack_type: "DDoS".to_string(),
                    severity: 7,
                    timestamp: 1_700_000_000 + i,
                })
                .await
                .unwrap();
        }

        let (_, body) = call(&app, "GET", "/api/ledger/attacks").await;
        let attacks = body["attacks"].as_array().unwrap();
        assert_eq!(attacks.len(), 20);
        assert_eq!(body["count"], 20);
        assert_eq!(body["total"], 25);
        assert_eq!(attacks[0]["fingerprint"], "fp5");
        assert_eq!(attacks[19]["fingerprint"], "fp24");
    }

    #[tokio::test]
    async fn test_offline_ledger_queries_are_empty() {
        let (app, _, _dir) = test_app(LedgerMode::Off).await;

        let (status, body) = call(&app, "GET", "/api/ledger/attacks").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["connected"], false);
        assert_eq!(body["attacks"].as_array().unwrap().len(), 0);
    }
}
