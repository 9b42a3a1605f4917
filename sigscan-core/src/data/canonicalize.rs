//! Candle series clean-up before indicator computation.
//!
//! Exchanges occasionally return a duplicated open time at a page boundary
//! or a row with a missing field. The series is sorted by timestamp, the
//! first row per timestamp is kept, and rows that fail `Candle::is_sane` are
//! dropped.

use tracing::warn;

use crate::domain::Candle;

/// What `canonicalize` removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CanonicalReport {
    pub duplicates: usize,
    pub invalid: usize,
}

impl CanonicalReport {
    pub fn is_clean(&self) -> bool {
        self.duplicates == 0 && self.invalid == 0
    }
}

pub fn canonicalize(mut candles: Vec<Candle>) -> (Vec<Candle>, CanonicalReport) {
    let mut report = CanonicalReport::default();

    candles.sort_by_key(|c| c.timestamp);
    let before = candles.len();
    candles.dedup_by_key(|c| c.timestamp);
    report.duplicates = before - candles.len();

    let before = candles.len();
    candles.retain(Candle::is_sane);
    report.invalid = before - candles.len();

    (candles, report)
}

/// `canonicalize` with a warning per symbol when anything was dropped.
pub fn canonicalize_logged(symbol: &str, candles: Vec<Candle>) -> Vec<Candle> {
    let (clean, report) = canonicalize(candles);
    if !report.is_clean() {
        warn!(
            symbol,
            duplicates = report.duplicates,
            invalid = report.invalid,
            "dropped candles during canonicalization"
        );
    }
    clean
}
