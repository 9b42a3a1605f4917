//! Money Flow Index (MFI).
//!
//! Volume-weighted RSI over typical price. Raw flow = typical * volume,
//! classed positive/negative by the direction of typical price versus the
//! previous candle. MFI = 100 - 100 / (1 + Σpos / Σneg) over `period` flows.
//! Lookback: period.

use super::rsi::compute_rsi;
use super::Indicator;
use crate::domain::Candle;

#[derive(Debug, Clone)]
pub struct Mfi {
    period: usize,
    name: String,
}

impl Mfi {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "MFI period must be >= 1");
        Self {
            period,
            name: format!("mfi_{period}"),
        }
    }
}

impl Indicator for Mfi {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let n = candles.len();
        let mut result = vec![f64::NAN; n];

        if n < self.period + 1 {
            return result;
        }

        let typical: Vec<f64> = candles.iter().map(Candle::typical_price).collect();

        // (positive, negative) flow per candle; index 0 has no predecessor.
        let mut flows = vec![(f64::NAN, f64::NAN); n];
        for i in 1..n {
            let raw = typical[i] * candles[i].volume;
            if raw.is_nan() || typical[i - 1].is_nan() {
                continue;
            }
            flows[i] = if typical[i] > typical[i - 1] {
                (raw, 0.0)
            } else if typical[i] < typical[i - 1] {
                (0.0, raw)
            } else {
                (0.0, 0.0)
            };
        }

        for i in self.period..n {
            let window = &flows[i + 1 - self.period..=i];
            if window.iter().any(|(p, _)| p.is_nan()) {
                continue;
            }
            let pos: f64 = window.iter().map(|(p, _)| p).sum();
            let neg: f64 = window.iter().map(|(_, q)| q).sum();
            result[i] = compute_rsi(pos, neg);
        }

        result
    }
}
