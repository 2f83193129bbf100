//! Configuration module

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Which ledger backend the attestor anchors records to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerMode {
    /// In-process hash-chained ledger
    Chain,
    /// Remote ledger gateway over HTTP
    Http,
    /// No ledger; attestation only hits the durable log
    Off,
}

impl FromStr for LedgerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chain" => Ok(LedgerMode::Chain),
            "http" => Ok(LedgerMode::Http),
            "off" | "none" => Ok(LedgerMode::Off),
            other => Err(format!("unknown ledger mode: {}", other)),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Durable attack log connection URL
    pub database_url: String,

    /// Server port
    pub port: u16,

    /// Directory holding the persisted scorer snapshot
    pub model_dir: PathBuf,

    /// Ledger backend
    pub ledger_mode: LedgerMode,

    /// Ledger gateway base URL (http mode)
    pub ledger_url: String,

    /// Optional JSONL file backing the chain ledger
    pub ledger_file: Option<PathBuf>,

    /// Upper bound on waiting for a ledger receipt
    pub ledger_receipt_timeout: Duration,

    /// Delay between stream cycles
    pub stream_interval: Duration,

    /// Confidence above which an outlier is Confirmed
    pub confirm_threshold: f64,

    /// Expected outlier share in the training data
    pub contamination: f64,

    /// Trees in the isolation forest
    pub model_trees: usize,

    /// Seed for model training
    pub model_seed: u64,

    /// Synthetic normal samples used when (re)training
    pub training_samples: usize,

    /// Nodes registered at startup
    pub default_nodes: usize,

    /// Base seed for traffic generation; entropy when unset
    pub simulation_seed: Option<u64>,

    /// `LOG_FORMAT` override (`json` or `text`)
    pub log_format: Option<String>,

    /// Environment (development, production)
    pub environment: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://ledger-shield.db?mode=rwc".to_string()),

            port: parse_var("PORT").unwrap_or(8001),

            model_dir: env::var("MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("models")),

            ledger_mode: parse_var("LEDGER_MODE").unwrap_or(LedgerMode::Chain),

            ledger_url: env::var("LEDGER_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8545".to_string()),

            ledger_file: env::var("LEDGER_FILE").ok().map(PathBuf::from),

            ledger_receipt_timeout: Duration::from_millis(
                parse_var("LEDGER_RECEIPT_TIMEOUT_MS").unwrap_or(3_000),
            ),

            stream_interval: Duration::from_millis(
                parse_var("STREAM_INTERVAL_MS").unwrap_or(500),
            ),

            confirm_threshold: parse_var("THRESHOLD_CONFIRM").unwrap_or(0.5),

            contamination: parse_var("MODEL_CONTAMINATION").unwrap_or(0.1),

            model_trees: parse_var("MODEL_TREES").unwrap_or(100),

            model_seed: parse_var("MODEL_SEED").unwrap_or(42),

            training_samples: parse_var("TRAINING_SAMPLES").unwrap_or(1000),

            default_nodes: parse_var("DEFAULT_NODES").unwrap_or(5),

            simulation_seed: parse_var("SIMULATION_SEED"),

            log_format: env::var("LOG_FORMAT").ok(),

            environment: env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string()),
        }
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// JSON logs when asked for, otherwise in production
    pub fn json_logs(&self) -> bool {
        match &self.log_format {
            Some(format) => format.eq_ignore_ascii_case("json"),
            None => self.is_production(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            port: 8001,
            model_dir: PathBuf::from("models"),
            ledger_mode: LedgerMode::Chain,
            ledger_url: "http://127.0.0.1:8545".to_string(),
            ledger_file: None,
            ledger_receipt_timeout: Duration::from_millis(3_000),
            stream_interval: Duration::from_millis(500),
            confirm_threshold: 0.5,
            contamination: 0.1,
            model_trees: 100,
            model_seed: 42,
            training_samples: 1000,
            default_nodes: 5,
            simulation_seed: None,
            log_format: None,
            environment: "development".to_string(),
        }
    }
}

fn parse_var<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
