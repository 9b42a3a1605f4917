//! Indicator engine: candles in, `IndicatorSet` out.
//!
//! Every series in the set shares the candle index. The engine validates the
//! input once; `IndicatorSet::snapshot` then checks that every value the
//! downstream stages read on the last candle is defined.

use serde::{Deserialize, Serialize};

use super::{
    atr::Atr, cross::last_cross, ema::Ema, fibonacci::FibonacciLevels, ichimoku::Ichimoku,
    last_finite, macd::Macd, mfi::Mfi, rsi::Rsi, vwap::Vwap, Indicator,
};
use crate::domain::{mean_close, Candle, CrossKind};
use crate::error::DataError;

/// Periods and windows for the indicator engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    pub min_candles: usize,
    pub vwap_window: usize,
    pub atr_period: usize,
    pub rsi_period: usize,
    pub mfi_period: usize,
    pub ema_trend_fast: usize,
    pub ema_trend_slow: usize,
    pub ema_cross_fast: usize,
    pub ema_cross_slow: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub ichimoku_conversion: usize,
    pub ichimoku_base: usize,
    pub ichimoku_span_b: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            min_candles: 200,
            vwap_window: 14,
            atr_period: 14,
            rsi_period: 14,
            mfi_period: 14,
            ema_trend_fast: 50,
            ema_trend_slow: 200,
            ema_cross_fast: 9,
            ema_cross_slow: 26,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            ichimoku_conversion: 9,
            ichimoku_base: 26,
            ichimoku_span_b: 52,
        }
    }
}

impl IndicatorConfig {
    /// Reject windows the indicator constructors cannot accept.
    pub fn validate(&self) -> Result<(), String> {
        let windows = [
            ("vwap_window", self.vwap_window),
            ("atr_period", self.atr_period),
            ("rsi_period", self.rsi_period),
            ("mfi_period", self.mfi_period),
            ("ema_trend_fast", self.ema_trend_fast),
            ("ema_trend_slow", self.ema_trend_slow),
            ("ema_cross_fast", self.ema_cross_fast),
            ("ema_cross_slow", self.ema_cross_slow),
            ("macd_fast", self.macd_fast),
            ("macd_slow", self.macd_slow),
            ("macd_signal", self.macd_signal),
            ("ichimoku_conversion", self.ichimoku_conversion),
            ("ichimoku_base", self.ichimoku_base),
            ("ichimoku_span_b", self.ichimoku_span_b),
        ];
        if let Some((name, _)) = windows.iter().find(|(_, w)| *w == 0) {
            return Err(format!("indicators.{name} must be at least 1"));
        }
        if self.macd_fast >= self.macd_slow {
            return Err(format!(
                "indicators.macd_fast ({}) must be below indicators.macd_slow ({})",
                self.macd_fast, self.macd_slow
            ));
        }
        Ok(())
    }
}

/// Per-instrument indicator bundle, recomputed every cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSet {
    pub close: Vec<f64>,
    pub vwap: Vec<f64>,
    pub atr: Vec<f64>,
    pub ema50: Vec<f64>,
    pub ema200: Vec<f64>,
    pub ema9: Vec<f64>,
    pub ema26: Vec<f64>,
    pub rsi: Vec<f64>,
    pub mfi: Vec<f64>,
    /// MACD histogram (line − signal).
    pub macd: Vec<f64>,
    pub macd_line: Vec<f64>,
    pub macd_signal: Vec<f64>,
    pub tenkan: Vec<f64>,
    pub kijun: Vec<f64>,
    pub senkou_a: Vec<f64>,
    pub senkou_b: Vec<f64>,
    pub chikou: Vec<f64>,
    pub ichimoku_cross: Vec<Option<CrossKind>>,
    pub fibonacci: FibonacciLevels,
    pub mean_close: f64,
}

/// Last-candle values of an `IndicatorSet`, all guaranteed finite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub close: f64,
    pub vwap: f64,
    pub atr: f64,
    pub ema50: f64,
    pub ema200: f64,
    pub rsi: f64,
    pub mfi: f64,
    pub macd: f64,
    pub macd_line: f64,
    pub macd_signal: f64,
    /// Min/max of the defined MACD histogram values over the series.
    pub macd_min: f64,
    pub macd_max: f64,
    pub tenkan: f64,
    pub kijun: f64,
    pub senkou_a: f64,
    pub senkou_b: f64,
    pub ichimoku_cross: Option<CrossKind>,
    pub ema_cross: Option<CrossKind>,
    pub mean_close: f64,
}

#[derive(Debug, Clone, Default)]
pub struct IndicatorEngine {
    config: IndicatorConfig,
}

impl IndicatorEngine {
    pub fn new(config: IndicatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IndicatorConfig {
        &self.config
    }

    /// Compute every series over `candles`.
    ///
    /// Fails with `InsufficientData` on an empty or short series, or when a
    /// required column holds a non-finite value.
    pub fn compute(&self, candles: &[Candle]) -> Result<IndicatorSet, DataError> {
        let cfg = &self.config;
        if candles.is_empty() {
            return Err(DataError::InsufficientData("empty candle series".into()));
        }
        if candles.len() < cfg.min_candles {
            return Err(DataError::InsufficientData(format!(
                "{} candles, need at least {}",
                candles.len(),
                cfg.min_candles
            )));
        }
        if let Some(i) = candles.iter().position(Candle::is_void) {
            return Err(DataError::InsufficientData(format!(
                "non-finite value in candle {i}"
            )));
        }

        let macd = Macd::new(cfg.macd_fast, cfg.macd_slow, cfg.macd_signal).lines(candles);
        let ichimoku = Ichimoku::new(
            cfg.ichimoku_conversion,
            cfg.ichimoku_base,
            cfg.ichimoku_span_b,
        )
        .lines(candles);
        let fibonacci = FibonacciLevels::from_candles(candles)
            .ok_or_else(|| DataError::InsufficientData("no high/low range".into()))?;
        let mean_close = mean_close(candles)
            .ok_or_else(|| DataError::InsufficientData("empty candle series".into()))?;

        Ok(IndicatorSet {
            close: candles.iter().map(|c| c.close).collect(),
            vwap: Vwap::new(cfg.vwap_window).compute(candles),
            atr: Atr::new(cfg.atr_period).compute(candles),
            ema50: Ema::new(cfg.ema_trend_fast).compute(candles),
            ema200: Ema::new(cfg.ema_trend_slow).compute(candles),
            ema9: Ema::new(cfg.ema_cross_fast).compute(candles),
            ema26: Ema::new(cfg.ema_cross_slow).compute(candles),
            rsi: Rsi::new(cfg.rsi_period).compute(candles),
            mfi: Mfi::new(cfg.mfi_period).compute(candles),
            macd: macd.histogram,
            macd_line: macd.line,
            macd_signal: macd.signal,
            tenkan: ichimoku.tenkan,
            kijun: ichimoku.kijun,
            senkou_a: ichimoku.senkou_a,
            senkou_b: ichimoku.senkou_b,
            chikou: ichimoku.chikou,
            ichimoku_cross: ichimoku.cross,
            fibonacci,
            mean_close,
        })
    }
}

impl IndicatorSet {
    pub fn len(&self) -> usize {
        self.close.len()
    }

    pub fn is_empty(&self) -> bool {
        self.close.is_empty()
    }

    /// EMA(9/26) cross on the last candle.
    pub fn ema_cross(&self) -> Option<CrossKind> {
        last_cross(&self.ema9, &self.ema26)
    }

    /// Extract last-candle values, failing with `UndefinedIndicator` when
    /// any of them is not finite.
    pub fn snapshot(&self) -> Result<IndicatorSnapshot, DataError> {
        let last = |name: &str, series: &[f64]| {
            last_finite(series).ok_or_else(|| DataError::undefined(name))
        };

        let (macd_min, macd_max) = self
            .macd
            .iter()
            .filter(|v| v.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });

        Ok(IndicatorSnapshot {
            close: last("close", &self.close)?,
            vwap: last("vwap", &self.vwap)?,
            atr: last("atr", &self.atr)?,
            ema50: last("ema50", &self.ema50)?,
            ema200: last("ema200", &self.ema200)?,
            rsi: last("rsi", &self.rsi)?,
            mfi: last("mfi", &self.mfi)?,
            macd: last("macd", &self.macd)?,
            macd_line: last("macd_line", &self.macd_line)?,
            macd_signal: last("macd_signal", &self.macd_signal)?,
            macd_min,
            macd_max,
            tenkan: last("tenkan", &self.tenkan)?,
            kijun: last("kijun", &self.kijun)?,
            senkou_a: last("senkou_a", &self.senkou_a)?,
            senkou_b: last("senkou_b", &self.senkou_b)?,
            ichimoku_cross: self.ichimoku_cross.last().copied().flatten(),
            ema_cross: self.ema_cross(),
            mean_close: self.mean_close,
        })
    }
}
