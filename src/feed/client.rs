//! HTTP client for the scraping backend.
//!
//! Endpoints (all JSON, all wrapped in `{ data, timestamp? }`):
//!   POST /api/scrape/all-races
//!   POST /api/scrape/upcoming/{today|tomorrow|YYYY-MM-DD}
//!   POST /api/scrape/winners
//!   GET  /api/health
//!
//! Scrapes can be slow (the backend drives a browser), so the timeout is
//! configurable and generous by default.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

use super::{Envelope, FetchRequest, RaceSource};
use crate::engine::cancel::CancelToken;
use crate::types::{PaddockError, Winner};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";

const HEALTH_PATH: &str = "/api/health";

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// reqwest-backed `RaceSource`.
pub struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("paddock/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client for scraping backend")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // -- Internal helpers ------------------------------------------------

    async fn post_envelope(&self, path: &str) -> Result<Envelope, PaddockError> {
        let url = self.url(path);
        debug!(url = %url, "Requesting scrape");

        let resp = self
            .http
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PaddockError::Network(format!(
                "API error {status} from {path}: {}",
                body.trim()
            )));
        }

        let text = resp.text().await?;
        serde_json::from_str::<Envelope>(&text)
            .map_err(|e| PaddockError::malformed(None, format!("bad response envelope: {e}")))
    }
}

/// Decode the winners payload one element at a time. Elements that do not
/// match the schema are logged and skipped.
pub fn decode_winners(data: &serde_json::Value) -> Result<Vec<Winner>, PaddockError> {
    let items = match data {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Null => return Ok(Vec::new()),
        _ => return Err(PaddockError::malformed(None, "winners data is not an array")),
    };

    let mut winners = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        match serde_json::from_value::<Winner>(item.clone()) {
            Ok(w) => winners.push(w),
            Err(e) => warn!(index, error = %e, "Skipping malformed winner record"),
        }
    }
    Ok(winners)
}

#[async_trait]
impl RaceSource for ApiClient {
    async fn fetch_races(
        &self,
        request: &FetchRequest,
        cancel: &CancelToken,
    ) -> Result<Envelope, PaddockError> {
        cancel.run(self.post_envelope(&request.path())).await
    }

    async fn fetch_winners(&self, cancel: &CancelToken) -> Result<Vec<Winner>, PaddockError> {
        let envelope = cancel.run(self.post_envelope(&FetchRequest::Winners.path())).await?;
        decode_winners(&envelope.data)
    }

    async fn health(&self) -> Result<(), PaddockError> {
        let resp = self.http.get(self.url(HEALTH_PATH)).send().await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(PaddockError::Network(format!(
                "health check returned {}",
                resp.status()
            )))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
