//! Ledger gateway client
//!
//! Talks JSON to a ledger gateway that fronts the actual contract:
//! `GET /health`, `POST /attacks`, `GET /attacks/count`, `GET /attacks/{id}`,
//! `GET /threats/{fingerprint}`.

use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::{LedgerAttack, LedgerClient, LedgerEntry, LedgerError};

#[derive(Debug, Serialize, Deserialize)]
pub struct LogAttackResponse {
    pub tx_hash: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct KnownResponse {
    pub known: bool,
}

pub struct HttpLedger {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpLedger {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, LedgerError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn check(response: reqwest::Response) -> Result<reqwest::Response, LedgerError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(LedgerError::Status(response.status().as_u16()))
        }
    }
}

#[axum::async_trait]
impl LedgerClient for HttpLedger {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn is_connected(&self) -> bool {
        match self.http_client.get(self.url("/health")).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::debug!("Ledger gateway unreachable: {}", e);
                false
            }
        }
    }

    async fn log_attack(&self, entry: LedgerEntry) -> Result<Option<String>, LedgerError> {
        let response = self
            .http_client
            .post(self.url("/attacks"))
            .json(&entry)
            .send()
            .await?;

        let body: LogAttackResponse = Self::check(response)?.json().await?;
        Ok(body.tx_hash)
    }

    async fn attack_count(&self) -> Result<u64, LedgerError> {
        let response = self.http_client.get(self.url("/attacks/count")).send().await?;
        let body: CountResponse = Self::check(response)?.json().await?;
        Ok(body.count)
    }

    async fn get_attack(&self, id: u64) -> Result<Option<LedgerAttack>, LedgerError> {
        let response = self
            .http_client
            .get(self.url(&format!("/attacks/{}", id)))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(Self::check(response)?.json().await?))
    }

    async fn is_threat_known(&self, fingerprint: &str) -> Result<bool, LedgerError> {
        let response = self
            .http_client
            .get(self.url(&format!("/threats/{}", fingerprint)))
            .send()
            .await?;

        let body: KnownResponse = Self::check(response)?.json().await?;
        Ok(body.known)
    }
}
