//! Entry point finder.
//!
//! Derives up to two entry candidates per direction from the order-book
//! weighted prices and ATR, scores each against the indicator snapshot and the
//! volume profile, and discards those below an ATR-adaptive threshold.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::order_book::BookAnalysis;
use super::volume_profile::{VolumeNode, VolumeProfile};
use crate::domain::{Direction, EntryCandidate};
use crate::indicators::IndicatorSnapshot;

const ALIGNMENT_WEIGHT: f64 = 0.7;
const RSI_WEIGHT: f64 = 1.2;
const MACD_WEIGHT: f64 = 1.0;
const VWAP_PROXIMITY_WEIGHT: f64 = 1.0;
const ATR_DEVIATION_WEIGHT: f64 = 1.0;
const LVN_SCORE: f64 = 1.5;
const HVN_SCORE: f64 = 0.5;
const NEUTRAL_NODE_SCORE: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntryConfig {
    /// Side force required before any entry is proposed.
    pub force_gate: f64,
    /// ATR multiple subtracted (Long) or added (Short) for the primary entry.
    pub primary_atr_offset: f64,
    pub secondary_atr_offset: f64,
    /// Threshold when ATR is below `calm_atr_ratio` of mean close.
    pub calm_threshold: f64,
    pub volatile_threshold: f64,
    pub calm_atr_ratio: f64,
    /// RSI band considered healthy for an entry (exclusive bounds).
    pub rsi_healthy_low: f64,
    pub rsi_healthy_high: f64,
    /// RSI or MFI above this searches Short first.
    pub overbought: f64,
    /// RSI or MFI below this searches Long first.
    pub oversold: f64,
}

impl Default for EntryConfig {
    fn default() -> Self {
        Self {
            force_gate: 0.55,
            primary_atr_offset: 1.0,
            secondary_atr_offset: 1.5,
            calm_threshold: 4.0,
            volatile_threshold: 3.5,
            calm_atr_ratio: 0.01,
            rsi_healthy_low: 20.0,
            rsi_healthy_high: 80.0,
            overbought: 80.0,
            oversold: 20.0,
        }
    }
}

/// Raw (entry1, entry2) for a direction, or `None` when the side's force
/// does not clear the gate.
pub fn raw_entries(
    direction: Direction,
    book: &BookAnalysis,
    atr: f64,
    config: &EntryConfig,
) -> Option<(f64, f64)> {
    match direction {
        Direction::Long if book.buyer_force > config.force_gate => Some((
            book.support.max(book.weighted_bid - atr * config.primary_atr_offset),
            book.support.max(book.weighted_bid - atr * config.secondary_atr_offset),
        )),
        Direction::Short if book.seller_force > config.force_gate => Some((
            book.resistance.min(book.weighted_ask + atr * config.primary_atr_offset),
            book.resistance.min(book.weighted_ask + atr * config.secondary_atr_offset),
        )),
        _ => None,
    }
}

/// Weighted quality of entering at `price`. Always >= 0.
pub fn quality_score(
    direction: Direction,
    price: f64,
    snap: &IndicatorSnapshot,
    profile: &VolumeProfile,
    config: &EntryConfig,
) -> f64 {
    // Long: price above the line scores; Short: below.
    let aligned = |line: f64| match direction {
        Direction::Long => price > line,
        Direction::Short => price < line,
    };
    let flag = |b: bool| if b { 1.0 } else { 0.0 };

    let alignment = [snap.tenkan, snap.kijun, snap.ema50, snap.senkou_a, snap.senkou_b]
        .into_iter()
        .map(|line| flag(aligned(line)) * ALIGNMENT_WEIGHT)
        .sum::<f64>();

    let rsi_healthy = snap.rsi > config.rsi_healthy_low && snap.rsi < config.rsi_healthy_high;
    let macd_agrees = match direction {
        Direction::Long => snap.macd > 0.0,
        Direction::Short => snap.macd < 0.0,
    };

    let deviation = (price - snap.vwap).abs();
    let vwap_proximity = if snap.vwap > 0.0 {
        1.0 - (deviation / snap.vwap).min(1.0)
    } else {
        0.0
    };
    let low_atr_deviation = snap.atr > 0.0 && deviation / snap.atr < 1.0;

    let volume_score = match profile.node_at(price) {
        Some(VolumeNode::Low) => LVN_SCORE,
        Some(VolumeNode::High) => HVN_SCORE,
        Some(VolumeNode::Neutral) | None => NEUTRAL_NODE_SCORE,
    };

    alignment
        + flag(rsi_healthy) * RSI_WEIGHT
        + flag(macd_agrees) * MACD_WEIGHT
        + vwap_proximity * VWAP_PROXIMITY_WEIGHT
        + flag(low_atr_deviation) * ATR_DEVIATION_WEIGHT
        + volume_score
}

/// Stricter threshold in calm markets.
pub fn quality_threshold(atr: f64, mean_close: f64, config: &EntryConfig) -> f64 {
    if atr < mean_close * config.calm_atr_ratio {
        config.calm_threshold
    } else {
        config.volatile_threshold
    }
}

/// Up to two scored candidates, best first. Empty when the force gate fails
/// or nothing clears the threshold.
pub fn find_entries(
    direction: Direction,
    snap: &IndicatorSnapshot,
    book: &BookAnalysis,
    profile: &VolumeProfile,
    config: &EntryConfig,
) -> Vec<EntryCandidate> {
    let Some((e1, e2)) = raw_entries(direction, book, snap.atr, config) else {
        debug!(%direction, "side force below gate, no entries");
        return Vec::new();
    };

    let threshold = quality_threshold(snap.atr, snap.mean_close, config);
    let mut candidates: Vec<EntryCandidate> = [e1, e2]
        .into_iter()
        .map(|price| EntryCandidate {
            price,
            direction,
            quality_score: quality_score(direction, price, snap, profile, config),
        })
        .filter(|c| {
            let keep = c.quality_score >= threshold;
            if !keep {
                debug!(
                    %direction,
                    price = c.price,
                    quality = c.quality_score,
                    threshold,
                    "entry below quality threshold"
                );
            }
            keep
        })
        .collect();

    // Stable sort keeps entry1 first on ties.
    candidates.sort_by(|a, b| b.quality_score.total_cmp(&a.quality_score));
    candidates
}
