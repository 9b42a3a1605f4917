//! Ichimoku Kinko Hyo.
//!
//! tenkan  = midpoint of the `conversion` window (high/low)
//! kijun   = midpoint of the `base` window
//! senkouA = (tenkan + kijun) / 2, not shifted forward
//! senkouB = midpoint of the `span_b` window, not shifted forward
//! chikou  = close plotted `displacement` periods behind:
//!           chikou[t] = close[t + displacement], last `displacement` undefined.

use crate::domain::{Candle, CrossKind};

use super::cross::detect_cross;

#[derive(Debug, Clone)]
pub struct Ichimoku {
    conversion: usize,
    base: usize,
    span_b: usize,
    displacement: usize,
}

/// The five Ichimoku lines plus the per-candle tenkan/kijun cross.
#[derive(Debug, Clone, PartialEq)]
pub struct IchimokuLines {
    pub tenkan: Vec<f64>,
    pub kijun: Vec<f64>,
    pub senkou_a: Vec<f64>,
    pub senkou_b: Vec<f64>,
    pub chikou: Vec<f64>,
    pub cross: Vec<Option<CrossKind>>,
}

impl Default for Ichimoku {
    fn default() -> Self {
        Self::new(9, 26, 52)
    }
}

impl Ichimoku {
    pub fn new(conversion: usize, base: usize, span_b: usize) -> Self {
        assert!(
            conversion >= 1 && base >= 1 && span_b >= 1,
            "Ichimoku windows must be >= 1"
        );
        Self {
            conversion,
            base,
            span_b,
            displacement: base,
        }
    }

    pub fn lines(&self, candles: &[Candle]) -> IchimokuLines {
        let tenkan = midpoint(candles, self.conversion);
        let kijun = midpoint(candles, self.base);
        let senkou_a = tenkan
            .iter()
            .zip(&kijun)
            .map(|(t, k)| (t + k) / 2.0)
            .collect();
        let senkou_b = midpoint(candles, self.span_b);

        let n = candles.len();
        let chikou = (0..n)
            .map(|t| {
                candles
                    .get(t + self.displacement)
                    .map_or(f64::NAN, |c| c.close)
            })
            .collect();

        let cross = detect_cross(&tenkan, &kijun);

        IchimokuLines {
            tenkan,
            kijun,
            senkou_a,
            senkou_b,
            chikou,
            cross,
        }
    }
}

/// (highest high + lowest low) / 2 over a trailing window.
fn midpoint(candles: &[Candle], window: usize) -> Vec<f64> {
    let n = candles.len();
    let mut out = vec![f64::NAN; n];
    if n < window {
        return out;
    }
    for i in (window - 1)..n {
        let slice = &candles[i + 1 - window..=i];
        let hi = slice.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
        let lo = slice.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
        if hi.is_finite() && lo.is_finite() {
            out[i] = (hi + lo) / 2.0;
        }
    }
    out
}
