//! Risk calculator: entry nudging, secondary entry, stop-loss, take-profit
//! ladder and 0–100 signal strength.

use serde::{Deserialize, Serialize};

use crate::domain::{Direction, EntryCandidate, StopTakeLadder};
use crate::indicators::{FibonacciLevels, IndicatorSnapshot};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Entries within this relative distance of VWAP get nudged.
    pub vwap_nudge_band: f64,
    pub vwap_nudge_atr: f64,
    /// ATR multiple between the adjusted entry and the secondary entry.
    pub secondary_atr: f64,
    pub stop_multiplier_min: f64,
    pub stop_multiplier_max: f64,
    /// ATR / mean close at or below which the minimum multiplier applies.
    pub stop_scale_low: f64,
    /// ATR / mean close at or above which the maximum multiplier applies.
    pub stop_scale_high: f64,
    pub take_profit_multiples: [f64; 4],
    pub extreme_take_profit_multiples: [f64; 4],
    /// RSI below this (Long) widens the ladder.
    pub ladder_rsi_oversold: f64,
    /// RSI above this (Short) widens the ladder.
    pub ladder_rsi_overbought: f64,
    /// RSI bounds for the extreme-RSI strength boost.
    pub strength_rsi_oversold: f64,
    pub strength_rsi_overbought: f64,
    pub strength_boost: f64,
    /// Confluence tolerance as a fraction of mean close.
    pub confluence_tolerance: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            vwap_nudge_band: 0.02,
            vwap_nudge_atr: 0.1,
            secondary_atr: 0.5,
            stop_multiplier_min: 1.5,
            stop_multiplier_max: 2.0,
            stop_scale_low: 0.01,
            stop_scale_high: 0.03,
            take_profit_multiples: [2.0, 3.0, 5.0, 7.0],
            extreme_take_profit_multiples: [3.0, 5.0, 8.0, 10.0],
            ladder_rsi_oversold: 20.0,
            ladder_rsi_overbought: 80.0,
            strength_rsi_oversold: 30.0,
            strength_rsi_overbought: 70.0,
            strength_boost: 1.2,
            confluence_tolerance: 0.01,
        }
    }
}

/// Fully levelled plan for one entry candidate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskPlan {
    pub direction: Direction,
    pub entry1: f64,
    pub entry2: f64,
    pub ladder: StopTakeLadder,
    pub strength: f64,
}

/// Nudge an entry 0.1·ATR in the trade direction when it sits near VWAP.
pub fn adjust_entry(entry: f64, direction: Direction, snap: &IndicatorSnapshot, cfg: &RiskConfig) -> f64 {
    if snap.vwap <= 0.0 {
        return entry;
    }
    let to_vwap = (entry - snap.vwap).abs() / snap.vwap;
    if to_vwap < cfg.vwap_nudge_band {
        entry + direction.sign() * snap.atr * cfg.vwap_nudge_atr
    } else {
        entry
    }
}

/// Deeper fill: below the adjusted entry for Long, above for Short.
pub fn secondary_entry(adjusted: f64, direction: Direction, atr: f64, cfg: &RiskConfig) -> f64 {
    adjusted - direction.sign() * atr * cfg.secondary_atr
}

/// Stop multiplier, linear in ATR / mean close between the two scale points.
pub fn stop_multiplier(atr: f64, mean_close: f64, cfg: &RiskConfig) -> f64 {
    if mean_close <= 0.0 || cfg.stop_scale_high <= cfg.stop_scale_low {
        return cfg.stop_multiplier_min;
    }
    let ratio = atr / mean_close;
    let t = ((ratio - cfg.stop_scale_low) / (cfg.stop_scale_high - cfg.stop_scale_low)).clamp(0.0, 1.0);
    cfg.stop_multiplier_min + t * (cfg.stop_multiplier_max - cfg.stop_multiplier_min)
}

/// Stop-loss and four take-profits from `entry`.
pub fn ladder(entry: f64, direction: Direction, snap: &IndicatorSnapshot, cfg: &RiskConfig) -> StopTakeLadder {
    let s = direction.sign();
    let atr = snap.atr;
    let extreme = match direction {
        Direction::Long => snap.rsi < cfg.ladder_rsi_oversold,
        Direction::Short => snap.rsi > cfg.ladder_rsi_overbought,
    };
    let multiples = if extreme {
        cfg.extreme_take_profit_multiples
    } else {
        cfg.take_profit_multiples
    };
    StopTakeLadder {
        stop_loss: entry - s * atr * stop_multiplier(atr, snap.mean_close, cfg),
        take_profits: multiples.map(|m| entry + s * atr * m),
    }
}

/// Signal strength in [0, 100].
pub fn strength(
    direction: Direction,
    entry: f64,
    snap: &IndicatorSnapshot,
    fib: &FibonacciLevels,
    cfg: &RiskConfig,
) -> f64 {
    let rsi_norm = (snap.rsi - 20.0) / 60.0;
    let macd_range = snap.macd_max - snap.macd_min;
    let macd_norm = if macd_range > 0.0 {
        (snap.macd - snap.macd_min) / macd_range
    } else {
        0.5
    };

    let close = snap.close;
    let mut adj = if close > 0.0 {
        (1.0 - (close - entry).abs() / close).max(0.0)
    } else {
        0.0
    };

    let tolerance = cfg.confluence_tolerance * snap.mean_close;
    let near_cloud = (entry - snap.senkou_a).abs() <= tolerance || (entry - snap.senkou_b).abs() <= tolerance;
    if fib.near_retracement(entry, tolerance) || near_cloud {
        adj *= cfg.strength_boost;
    }

    let extreme_rsi = match direction {
        Direction::Long => snap.rsi < cfg.strength_rsi_oversold && entry < close,
        Direction::Short => snap.rsi > cfg.strength_rsi_overbought && entry > close,
    };
    if extreme_rsi {
        adj *= cfg.strength_boost;
    }

    let macd_cross = match direction {
        Direction::Long => snap.macd_line > snap.macd_signal && snap.macd_line > 0.0,
        Direction::Short => snap.macd_line < snap.macd_signal && snap.macd_line < 0.0,
    };
    if macd_cross {
        adj *= cfg.strength_boost;
    }

    let base = match direction {
        Direction::Long => (rsi_norm + macd_norm) / 2.0,
        Direction::Short => ((1.0 - rsi_norm) + (1.0 - macd_norm)) / 2.0,
    };
    let raw = base * adj * 100.0;
    if raw.is_finite() {
        raw.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

/// Adjust, derive the secondary entry, ladder and strength for a candidate.
pub fn plan(
    candidate: &EntryCandidate,
    snap: &IndicatorSnapshot,
    fib: &FibonacciLevels,
    cfg: &RiskConfig,
) -> RiskPlan {
    let direction = candidate.direction;
    let entry1 = adjust_entry(candidate.price, direction, snap, cfg);
    let entry2 = secondary_entry(entry1, direction, snap.atr, cfg);
    RiskPlan {
        direction,
        entry1,
        entry2,
        ladder: ladder(entry1, direction, snap, cfg),
        strength: strength(direction, entry1, snap, fib, cfg),
    }
}
