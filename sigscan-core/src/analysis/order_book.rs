//! Order-book microstructure: weighted prices, buyer/seller force, key levels,
//! liquidity voids and stop-hunt detection.

use serde::{Deserialize, Serialize};

use crate::domain::{side_volume, Level, OrderBookSnapshot};
use crate::error::DataError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderBookConfig {
    /// Depth requested from the exchange.
    pub depth: usize,
    /// Each side's aggregate size must reach this to be significant.
    pub min_side_volume: f64,
    /// Re-acquisitions of an insignificant book before abstaining.
    pub max_reacquire: u32,
    /// Relative spread/mid above which the book has a liquidity void.
    pub void_threshold: f64,
    /// Relative distance to support/resistance that counts as "near".
    pub stop_hunt_tolerance: f64,
}

impl Default for OrderBookConfig {
    fn default() -> Self {
        Self {
            depth: 100,
            min_side_volume: 1000.0,
            max_reacquire: 3,
            void_threshold: 0.05,
            stop_hunt_tolerance: 0.03,
        }
    }
}

/// Σ(price·size) / Σ(size); `None` for empty levels or zero total size.
pub fn weighted_average_price(levels: &[Level]) -> Option<f64> {
    let total = side_volume(levels);
    if levels.is_empty() || total <= 0.0 {
        return None;
    }
    let notional: f64 = levels.iter().map(|l| l.price * l.size).sum();
    Some(notional / total)
}

/// Buyer and seller force in [0, 1].
///
/// force = log1p(side volume) / log1p(total volume); (0.5, 0.5) when the
/// book holds no volume at all.
pub fn force(bids: &[Level], asks: &[Level]) -> (f64, f64) {
    let bid_vol = side_volume(bids).max(0.0);
    let ask_vol = side_volume(asks).max(0.0);
    let total = bid_vol + ask_vol;
    if total <= 0.0 {
        return (0.5, 0.5);
    }
    let denom = total.ln_1p();
    (bid_vol.ln_1p() / denom, ask_vol.ln_1p() / denom)
}

/// Support = weighted bid price, resistance = weighted ask price.
pub fn key_levels(book: &OrderBookSnapshot) -> (Option<f64>, Option<f64>) {
    (
        weighted_average_price(&book.bids),
        weighted_average_price(&book.asks),
    )
}

/// Both sides carry at least `min_side_volume` aggregate size.
pub fn check_significance(book: &OrderBookSnapshot, min_side_volume: f64) -> Result<(), DataError> {
    let (bids, asks) = (book.bid_volume(), book.ask_volume());
    if bids >= min_side_volume && asks >= min_side_volume {
        Ok(())
    } else {
        Err(DataError::InsignificantBookVolume {
            bids,
            asks,
            floor: min_side_volume,
        })
    }
}

/// Gap in the book: both sides have two or more levels and the top-of-book
/// spread exceeds `threshold` of mid.
pub fn has_liquidity_void(book: &OrderBookSnapshot, threshold: f64) -> bool {
    if book.bids.len() < 2 || book.asks.len() < 2 {
        return false;
    }
    match (book.spread(), book.mid()) {
        (Some(spread), Some(mid)) if mid > 0.0 => spread / mid > threshold,
        _ => false,
    }
}

/// Price sits within `tolerance` (relative) of support or resistance while
/// the live spread is wider than the volatility estimate.
///
/// `atr` is the candle-based estimate when available; without candles the
/// estimate falls back to (resistance − support) / 10.
pub fn is_stop_hunt(
    price: f64,
    support: f64,
    resistance: f64,
    book: &OrderBookSnapshot,
    tolerance: f64,
    atr: Option<f64>,
) -> bool {
    let near = |level: f64| level != 0.0 && ((price - level) / level).abs() < tolerance;
    if !(near(support) || near(resistance)) {
        return false;
    }
    let estimate = atr.unwrap_or((resistance - support) / 10.0);
    book.spread().is_some_and(|spread| spread > estimate)
}

/// Everything the entry finder needs from one book snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookAnalysis {
    pub weighted_bid: f64,
    pub weighted_ask: f64,
    pub support: f64,
    pub resistance: f64,
    pub buyer_force: f64,
    pub seller_force: f64,
    pub liquidity_void: bool,
    pub stop_hunt: bool,
}

impl BookAnalysis {
    /// Analyze a snapshot. `price` and `atr` feed the stop-hunt heuristic.
    pub fn analyze(
        book: &OrderBookSnapshot,
        config: &OrderBookConfig,
        price: f64,
        atr: Option<f64>,
    ) -> Result<Self, DataError> {
        if book.has_empty_side() {
            return Err(DataError::EmptyOrderBook);
        }
        let weighted_bid = weighted_average_price(&book.bids)
            .ok_or(DataError::UndefinedWeightedPrice { side: "bid" })?;
        let weighted_ask = weighted_average_price(&book.asks)
            .ok_or(DataError::UndefinedWeightedPrice { side: "ask" })?;
        let (buyer_force, seller_force) = force(&book.bids, &book.asks);

        Ok(Self {
            weighted_bid,
            weighted_ask,
            support: weighted_bid,
            resistance: weighted_ask,
            buyer_force,
            seller_force,
            liquidity_void: has_liquidity_void(book, config.void_threshold),
            stop_hunt: is_stop_hunt(
                price,
                weighted_bid,
                weighted_ask,
                book,
                config.stop_hunt_tolerance,
                atr,
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn book(bids: &[(f64, f64)], asks: &[(f64, f64)]) -> OrderBookSnapshot {
        OrderBookSnapshot {
            symbol: "TEST".into(),
            bids: bids.iter().map(|&(p, s)| Level::new(p, s)).collect(),
            asks: asks.iter().map(|&(p, s)| Level::new(p, s)).collect(),
            captured_at: Utc::now(),
        }
    }

    #[test]
    fn weighted_price_of_empty_or_zero_is_none() {
        assert_eq!(weighted_average_price(&[]), None);
        assert_eq!(
            weighted_average_price(&[Level::new(100.0, 0.0), Level::new(99.0, 0.0)]),
            None
        );
    }

    #[test]
    fn weighted_price_weights_by_size() {
        let levels = [Level::new(100.0, 1.0), Level::new(110.0, 3.0)];
        assert_eq!(weighted_average_price(&levels), Some(107.5));
    }

    #[test]
    fn force_is_neutral_on_empty_book() {
        assert_eq!(force(&[], &[]), (0.5, 0.5));
    }

    #[test]
    fn force_one_sided() {
        let (bull, bear) = force(&[Level::new(1.0, 500.0)], &[]);
        assert!((bull - 1.0).abs() < 1e-12);
        assert_eq!(bear, 0.0);
    }

    #[test]
    fn significance_floor() {
        let b = book(&[(99.0, 600.0), (98.0, 500.0)], &[(101.0, 900.0)]);
        assert!(matches!(
            check_significance(&b, 1000.0),
            Err(DataError::InsignificantBookVolume { .. })
        ));
        assert!(check_significance(&b, 800.0).is_ok());
    }

    #[test]
    fn liquidity_void_needs_two_levels_per_side() {
        let wide = book(&[(90.0, 1.0), (89.0, 1.0)], &[(110.0, 1.0), (111.0, 1.0)]);
        assert!(has_liquidity_void(&wide, 0.05));
        let thin = book(&[(90.0, 1.0)], &[(110.0, 1.0), (111.0, 1.0)]);
        assert!(!has_liquidity_void(&thin, 0.05));
        let tight = book(&[(99.9, 1.0), (99.8, 1.0)], &[(100.1, 1.0), (100.2, 1.0)]);
        assert!(!has_liquidity_void(&tight, 0.05));
    }

    #[test]
    fn stop_hunt_requires_proximity_and_wide_spread() {
        let b = book(&[(95.0, 1.0)], &[(105.0, 1.0)]);
        // spread 10 > atr 5, price 96 within 3% of support 95
        assert!(is_stop_hunt(96.0, 95.0, 105.0, &b, 0.03, Some(5.0)));
        // spread 10 < atr 20
        assert!(!is_stop_hunt(96.0, 95.0, 105.0, &b, 0.03, Some(20.0)));
        // far from both levels
        assert!(!is_stop_hunt(100.0, 90.0, 110.0, &b, 0.03, Some(5.0)));
        // no candles: estimate (105 - 95) / 10 = 1 < spread 10
        assert!(is_stop_hunt(104.0, 95.0, 105.0, &b, 0.03, None));
    }

    #[test]
    fn analyze_rejects_zero_volume_side() {
        let b = book(&[(99.0, 0.0)], &[(101.0, 5.0)]);
        let err = BookAnalysis::analyze(&b, &OrderBookConfig::default(), 100.0, None).unwrap_err();
        assert_eq!(err, DataError::UndefinedWeightedPrice { side: "bid" });
    }

    #[test]
    fn analyze_sets_support_and_resistance() {
        let b = book(&[(99.0, 10.0), (98.0, 10.0)], &[(101.0, 10.0), (102.0, 10.0)]);
        let a = BookAnalysis::analyze(&b, &OrderBookConfig::default(), 100.0, Some(1.0)).unwrap();
        assert_eq!(a.support, 98.5);
        assert_eq!(a.resistance, 101.5);
        assert!((a.buyer_force - a.seller_force).abs() < 1e-12);
    }
}
