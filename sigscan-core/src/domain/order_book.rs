//! Order-book snapshot captured from the exchange at request time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One price level: resting size at a price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Level {
    pub price: f64,
    pub size: f64,
}

impl Level {
    pub fn new(price: f64, size: f64) -> Self {
        Self { price, size }
    }
}

/// Immutable snapshot of both book sides.
///
/// Bids are ordered best (highest) first, asks best (lowest) first, as the
/// exchange delivers them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    pub symbol: String,
    pub bids: Vec<Level>,
    pub asks: Vec<Level>,
    pub captured_at: DateTime<Utc>,
}

impl OrderBookSnapshot {
    pub fn best_bid(&self) -> Option<f64> {
        self.bids.first().map(|l| l.price)
    }

    pub fn best_ask(&self) -> Option<f64> {
        self.asks.first().map(|l| l.price)
    }

    /// Top-of-book spread (best ask − best bid).
    pub fn spread(&self) -> Option<f64> {
        Some(self.best_ask()? - self.best_bid()?)
    }

    /// Top-of-book mid price.
    pub fn mid(&self) -> Option<f64> {
        Some((self.best_ask()? + self.best_bid()?) / 2.0)
    }

    pub fn bid_volume(&self) -> f64 {
        side_volume(&self.bids)
    }

    pub fn ask_volume(&self) -> f64 {
        side_volume(&self.asks)
    }

    /// True when either side has no levels.
    pub fn has_empty_side(&self) -> bool {
        self.bids.is_empty() || self.asks.is_empty()
    }
}

/// Aggregate resting size of one side.
pub fn side_volume(levels: &[Level]) -> f64 {
    levels.iter().map(|l| l.size).sum()
}
