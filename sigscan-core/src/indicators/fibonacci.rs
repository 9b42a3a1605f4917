//! Fibonacci retracement and extension levels between a series high and low.

use serde::{Deserialize, Serialize};

const RETRACEMENT_RATIOS: [f64; 4] = [0.236, 0.382, 0.618, 0.786];
const EXTENSION_RATIOS: [f64; 4] = [1.272, 1.618, 2.618, 4.236];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FibonacciLevels {
    pub high: f64,
    pub low: f64,
    /// Measured down from the high: 0.236, 0.382, 0.5, 0.618, 0.786, 1.0 (= high).
    pub retracements: [f64; 6],
    /// Projected above the high: 1.272, 1.618, 2.618, 4.236.
    pub extensions: [f64; 4],
}

impl FibonacciLevels {
    pub fn new(high: f64, low: f64) -> Self {
        let range = high - low;
        let r = |ratio: f64| high - range * ratio;
        let retracements = [
            r(RETRACEMENT_RATIOS[0]),
            r(RETRACEMENT_RATIOS[1]),
            (high + low) / 2.0,
            r(RETRACEMENT_RATIOS[2]),
            r(RETRACEMENT_RATIOS[3]),
            high,
        ];
        let extensions = EXTENSION_RATIOS.map(|ratio| high + range * ratio);
        Self {
            high,
            low,
            retracements,
            extensions,
        }
    }

    /// Levels over the max high and min low of a candle series.
    pub fn from_candles(candles: &[crate::domain::Candle]) -> Option<Self> {
        if candles.is_empty() {
            return None;
        }
        let high = candles.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
        let low = candles.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
        (high.is_finite() && low.is_finite()).then(|| Self::new(high, low))
    }

    /// True when `price` lies within `tolerance` (absolute) of any retracement.
    pub fn near_retracement(&self, price: f64, tolerance: f64) -> bool {
        self.retracements
            .iter()
            .any(|level| (price - level).abs() <= tolerance)
    }
}
