//! Concrete indicator implementations.
//!
//! Single-series indicators implement the `Indicator` trait: a full candle
//! series in, a numeric series of the same length out, with a NaN warmup
//! prefix. Multi-line indicators (MACD, Ichimoku) expose a struct of series
//! instead; `engine` bundles everything the pipeline reads into an
//! `IndicatorSet`.

pub mod atr;
pub mod cross;
pub mod ema;
pub mod engine;
pub mod fibonacci;
pub mod ichimoku;
pub mod macd;
pub mod mfi;
pub mod rsi;
pub mod sma;
pub mod vwap;

pub use atr::Atr;
pub use cross::{detect_cross, last_cross};
pub use ema::Ema;
pub use engine::{IndicatorConfig, IndicatorEngine, IndicatorSet, IndicatorSnapshot};
pub use fibonacci::FibonacciLevels;
pub use ichimoku::{Ichimoku, IchimokuLines};
pub use macd::{Macd, MacdLines};
pub use mfi::Mfi;
pub use rsi::Rsi;
pub use vwap::Vwap;

use crate::domain::Candle;

/// Trait for single-series indicators.
///
/// Indicators take a full candle series and produce a numeric output series
/// of the same length. The first `lookback()` values are `f64::NAN` (warmup).
///
/// No value at index t may depend on candles after t. Ichimoku's chikou line
/// is the one deliberate exception and is not an `Indicator`.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "ema_50", "atr_14").
    fn name(&self) -> &str;

    /// Number of candles needed before the indicator produces valid output.
    fn lookback(&self) -> usize;

    /// Compute the indicator for the entire candle series.
    fn compute(&self, candles: &[Candle]) -> Vec<f64>;
}

/// Last value of a series if it is finite.
pub fn last_finite(series: &[f64]) -> Option<f64> {
    series.last().copied().filter(|v| v.is_finite())
}

/// Create synthetic hourly candles from close prices for testing.
///
/// Generates plausible OHLCV: open = prev_close (or close for first candle),
/// high = max(open,close) + 1.0, low = min(open,close) - 1.0, volume = 1000.
#[cfg(test)]
pub fn make_candles(closes: &[f64]) -> Vec<Candle> {
    use chrono::TimeZone;
    let base = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Candle {
                timestamp: base + chrono::Duration::hours(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000.0,
            }
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
