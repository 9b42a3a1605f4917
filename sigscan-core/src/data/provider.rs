//! Market data facade and its structured error type.
//!
//! The orchestrator only ever talks to `MarketDataProvider`, so the exchange
//! transport can be swapped or scripted in tests.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::domain::{Candle, OrderBookSnapshot, Ticker24h};

/// Candle interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "30m")]
    M30,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "1d")]
    D1,
}

impl Interval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::M1 => "1m",
            Interval::M5 => "5m",
            Interval::M15 => "15m",
            Interval::M30 => "30m",
            Interval::H1 => "1h",
            Interval::H4 => "4h",
            Interval::D1 => "1d",
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1m" => Ok(Interval::M1),
            "5m" => Ok(Interval::M5),
            "15m" => Ok(Interval::M15),
            "30m" => Ok(Interval::M30),
            "1h" => Ok(Interval::H1),
            "4h" => Ok(Interval::H4),
            "1d" => Ok(Interval::D1),
            other => Err(format!("unknown interval '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AcquisitionError {
    #[error("exchange unavailable: {0}")]
    Unavailable(String),

    #[error("rate limited by exchange (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("invalid symbol: {symbol}")]
    InvalidSymbol { symbol: String },

    #[error("hard stop: exchange has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("unexpected response format: {0}")]
    ResponseFormat(String),
}

impl AcquisitionError {
    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AcquisitionError::Unavailable(_) | AcquisitionError::RateLimited { .. }
        )
    }
}

pub trait MarketDataProvider: Send + Sync {
    fn name(&self) -> &str;

    /// The most recent `limit` candles, oldest first.
    fn candles(
        &self,
        symbol: &str,
        interval: Interval,
        limit: usize,
    ) -> Result<Vec<Candle>, AcquisitionError>;

    fn order_book(&self, symbol: &str, depth: usize) -> Result<OrderBookSnapshot, AcquisitionError>;

    /// 24h statistics including open interest.
    fn ticker(&self, symbol: &str) -> Result<Ticker24h, AcquisitionError>;

    /// Currently tradable instruments whose symbol ends with `quote`.
    fn tradable_symbols(&self, quote: &str) -> Result<Vec<String>, AcquisitionError>;

    /// Connectivity check used once at startup.
    fn ping(&self) -> Result<(), AcquisitionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_round_trips_through_str() {
        for iv in [Interval::M1, Interval::M15, Interval::H1, Interval::H4, Interval::D1] {
            assert_eq!(iv.as_str().parse::<Interval>().unwrap(), iv);
        }
        assert!("2h".parse::<Interval>().is_err());
    }

    #[test]
    fn retryable_classification() {
        assert!(AcquisitionError::Unavailable("timeout".into()).is_retryable());
        assert!(AcquisitionError::RateLimited { retry_after_secs: 5 }.is_retryable());
        assert!(!AcquisitionError::InvalidSymbol { symbol: "X".into() }.is_retryable());
        assert!(!AcquisitionError::CircuitBreakerTripped.is_retryable());
        assert!(!AcquisitionError::ResponseFormat("bad".into()).is_retryable());
    }
}
