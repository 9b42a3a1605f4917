//! Moving Average Convergence Divergence (MACD).
//!
//! line = EMA(fast) - EMA(slow); signal = EMA(signal) of line;
//! histogram = line - signal. The histogram is what the pipeline calls
//! "macd" when scoring entries.

use super::ema::{ema_after_warmup, ema_of_series};
use super::Indicator;
use crate::domain::Candle;

#[derive(Debug, Clone)]
pub struct Macd {
    fast: usize,
    slow: usize,
    signal: usize,
    name: String,
}

/// The three MACD series, all indexed like the input candles.
#[derive(Debug, Clone, PartialEq)]
pub struct MacdLines {
    pub line: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        assert!(fast >= 1 && signal >= 1, "MACD periods must be >= 1");
        assert!(fast < slow, "MACD fast period must be below slow period");
        Self {
            fast,
            slow,
            signal,
            name: format!("macd_{fast}_{slow}_{signal}"),
        }
    }

    pub fn lines(&self, candles: &[Candle]) -> MacdLines {
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let fast = ema_of_series(&closes, self.fast);
        let slow = ema_of_series(&closes, self.slow);
        let line: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
        let signal = ema_after_warmup(&line, self.signal);
        let histogram = line.iter().zip(&signal).map(|(l, s)| l - s).collect();
        MacdLines {
            line,
            signal,
            histogram,
        }
    }
}

impl Indicator for Macd {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.slow + self.signal - 2
    }

    /// Histogram series.
    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        self.lines(candles).histogram
    }
}
