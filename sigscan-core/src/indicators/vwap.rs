//! Rolling Volume-Weighted Average Price.
//!
//! VWAP[t] = Σ(typical * volume) / Σ(volume) over the last `window` candles.
//! A window with zero total volume is undefined (NaN).
//! Lookback: window - 1.

use super::Indicator;
use crate::domain::Candle;

#[derive(Debug, Clone)]
pub struct Vwap {
    window: usize,
    name: String,
}

impl Vwap {
    pub fn new(window: usize) -> Self {
        assert!(window >= 1, "VWAP window must be >= 1");
        Self {
            window,
            name: format!("vwap_{window}"),
        }
    }
}

impl Indicator for Vwap {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.window - 1
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let n = candles.len();
        let mut result = vec![f64::NAN; n];
        if n < self.window {
            return result;
        }

        for i in (self.window - 1)..n {
            let slice = &candles[i + 1 - self.window..=i];
            let volume: f64 = slice.iter().map(|c| c.volume).sum();
            if volume > 0.0 {
                let pv: f64 = slice.iter().map(|c| c.typical_price() * c.volume).sum();
                result[i] = pv / volume;
            }
        }

        result
    }
}
