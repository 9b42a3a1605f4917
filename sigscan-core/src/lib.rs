//! SigScan Core: domain types, indicators, market analysis and data access.
//!
//! This crate contains everything needed to turn candles and an order book
//! into a validated trade signal:
//! - Domain types (candles, order books, tickers, signals)
//! - Indicator engine (VWAP, ATR, EMA, RSI, MFI, MACD, Ichimoku, Fibonacci)
//! - Order-book, volume-profile, entry, risk and validation stages
//! - Market data facade with a Binance provider and circuit breaker
//! - Retry policy, injectable clock and the market-cap cache

pub mod analysis;
pub mod clock;
pub mod data;
pub mod domain;
pub mod error;
pub mod indicators;
pub mod log_once;
pub mod market_cap;
pub mod retry;

pub use analysis::{Evaluation, Outcome, Pipeline, PipelineConfig};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::DataError;
