//! Fast/slow line crossover detection.
//!
//! A bullish cross at t requires fast[t-1] < slow[t-1] and fast[t] > slow[t];
//! bearish is the mirror. Touches (equality) and undefined values never cross.

use crate::domain::CrossKind;

/// Per-index cross classification; index 0 is always `None`.
pub fn detect_cross(fast: &[f64], slow: &[f64]) -> Vec<Option<CrossKind>> {
    let n = fast.len().min(slow.len());
    let mut out = vec![None; n];
    for t in 1..n {
        out[t] = cross_at(fast[t - 1], slow[t - 1], fast[t], slow[t]);
    }
    out
}

/// Cross on the last index only.
pub fn last_cross(fast: &[f64], slow: &[f64]) -> Option<CrossKind> {
    let n = fast.len().min(slow.len());
    if n < 2 {
        return None;
    }
    cross_at(fast[n - 2], slow[n - 2], fast[n - 1], slow[n - 1])
}

fn cross_at(prev_fast: f64, prev_slow: f64, fast: f64, slow: f64) -> Option<CrossKind> {
    // NaN comparisons are false, so undefined inputs fall through.
    if prev_fast < prev_slow && fast > slow {
        Some(CrossKind::Bullish)
    } else if prev_fast > prev_slow && fast < slow {
        Some(CrossKind::Bearish)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_bullish_and_bearish() {
        let fast = [1.0, 3.0, 1.0];
        let slow = [2.0, 2.0, 2.0];
        let crosses = detect_cross(&fast, &slow);
        assert_eq!(crosses, vec![None, Some(CrossKind::Bullish), Some(CrossKind::Bearish)]);
    }

    #[test]
    fn touch_is_not_a_cross() {
        let fast = [1.0, 2.0, 3.0];
        let slow = [2.0, 2.0, 2.0];
        assert_eq!(detect_cross(&fast, &slow), vec![None, None, None]);
    }

    #[test]
    fn nan_never_crosses() {
        assert_eq!(last_cross(&[f64::NAN, 3.0], &[2.0, 2.0]), None);
    }

    #[test]
    fn last_cross_reads_tail() {
        assert_eq!(
            last_cross(&[5.0, 5.0, 1.0, 3.0], &[2.0, 2.0, 2.0, 2.0]),
            Some(CrossKind::Bullish)
        );
        assert_eq!(last_cross(&[1.0], &[2.0]), None);
    }
}
