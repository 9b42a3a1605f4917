//! Market capitalization lookup with a TTL cache.
//!
//! The cache never fails: a source error is logged and reported as `None`,
//! and sentiment falls back to its cap-free formula.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::retry::{RetryPolicy, Retryable};

pub const COINGECKO_BASE_URL: &str = "https://api.coingecko.com/api/v3";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MarketCapError {
    #[error("market cap request failed: {0}")]
    Request(String),

    #[error("market cap source returned HTTP {0}")]
    Status(u16),

    #[error("market cap missing from response: {0}")]
    Missing(String),
}

impl Retryable for MarketCapError {
    fn is_retryable(&self) -> bool {
        match self {
            MarketCapError::Request(_) => true,
            MarketCapError::Status(code) => *code == 429 || *code >= 500,
            MarketCapError::Missing(_) => false,
        }
    }
}

pub trait MarketCapSource: Send + Sync {
    /// Market cap in USD for a source-specific id (e.g. "bitcoin").
    fn market_cap(&self, id: &str) -> Result<f64, MarketCapError>;
}

#[derive(Debug, Deserialize)]
struct CoinResponse {
    market_data: MarketData,
}

#[derive(Debug, Deserialize)]
struct MarketData {
    market_cap: HashMap<String, f64>,
}

/// Extract `market_data.market_cap.usd` from a `/coins/{id}` body.
pub fn parse_coin_market_cap(body: &str) -> Result<f64, MarketCapError> {
    let coin: CoinResponse =
        serde_json::from_str(body).map_err(|e| MarketCapError::Missing(e.to_string()))?;
    coin.market_data
        .market_cap
        .get("usd")
        .copied()
        .ok_or_else(|| MarketCapError::Missing("market_data.market_cap.usd".into()))
}

pub struct CoinGeckoSource {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl CoinGeckoSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, MarketCapError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MarketCapError::Request(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

impl MarketCapSource for CoinGeckoSource {
    fn market_cap(&self, id: &str) -> Result<f64, MarketCapError> {
        let url = format!("{}/coins/{id}", self.base_url);
        let resp = self
            .client
            .get(&url)
            .send()
            .map_err(|e| MarketCapError::Request(e.to_string()))?;
        let status = resp.status().as_u16();
        if status != 200 {
            return Err(MarketCapError::Status(status));
        }
        let body = resp.text().map_err(|e| MarketCapError::Request(e.to_string()))?;
        parse_coin_market_cap(&body)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketCapEntry {
    pub value: f64,
    pub fetched_at: DateTime<Utc>,
}

pub struct MarketCapCache {
    source: Box<dyn MarketCapSource>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    retry: RetryPolicy,
    entries: Mutex<HashMap<String, MarketCapEntry>>,
}

impl MarketCapCache {
    pub fn new(
        source: Box<dyn MarketCapSource>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            source,
            clock,
            ttl,
            retry,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Cached value if fresh, else a refetch. `None` when the source fails;
    /// a stale entry is never served.
    pub fn get(&self, id: &str) -> Option<f64> {
        let now = self.clock.now();
        if let Some(entry) = self.entries.lock().unwrap().get(id) {
            let age = (now - entry.fetched_at).to_std().unwrap_or(Duration::ZERO);
            if age < self.ttl {
                debug!(id, "market cap cache hit");
                return Some(entry.value);
            }
        }

        let label = format!("market_cap:{id}");
        match self
            .retry
            .run(self.clock.as_ref(), &label, |_| self.source.market_cap(id))
        {
            Ok(value) => {
                self.entries.lock().unwrap().insert(
                    id.to_string(),
                    MarketCapEntry {
                        value,
                        fetched_at: self.clock.now(),
                    },
                );
                Some(value)
            }
            Err(e) => {
                warn!(id, error = %e, "market cap unavailable");
                None
            }
        }
    }

    pub fn entry(&self, id: &str) -> Option<MarketCapEntry> {
        self.entries.lock().unwrap().get(id).copied()
    }
}
