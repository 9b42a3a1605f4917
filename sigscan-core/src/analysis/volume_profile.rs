//! Binned close-price volume profile with volatility-adaptive node flags.
//!
//! The close range is split into equal-width bins; each bin's share of total
//! volume is compared against `base_threshold * (1 + atr / mean_close)`.
//! Shares above the threshold are high-volume nodes (HVN), shares below half
//! of it are low-volume nodes (LVN). The two flags are disjoint.

use serde::{Deserialize, Serialize};

use crate::domain::Candle;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeProfileConfig {
    pub bins: usize,
    pub base_threshold: f64,
}

impl Default for VolumeProfileConfig {
    fn default() -> Self {
        Self {
            bins: 20,
            base_threshold: 0.05,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolumeBin {
    pub price_low: f64,
    pub price_high: f64,
    pub volume: f64,
    pub volume_percent: f64,
    pub is_hvn: bool,
    pub is_lvn: bool,
}

impl VolumeBin {
    pub fn mid(&self) -> f64 {
        (self.price_low + self.price_high) / 2.0
    }
}

/// Classification of the bin containing a price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolumeNode {
    High,
    Low,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VolumeProfile {
    pub bins: Vec<VolumeBin>,
    pub threshold: f64,
}

impl VolumeProfile {
    /// The explicit "no profile" value: zero total volume or a flat range.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Build the profile. `last_atr` scales the node threshold.
    pub fn build(candles: &[Candle], last_atr: f64, config: &VolumeProfileConfig) -> Self {
        let n_bins = config.bins.max(1);
        let closes = candles.iter().map(|c| c.close);
        let lo = closes.clone().fold(f64::INFINITY, f64::min);
        let hi = closes.fold(f64::NEG_INFINITY, f64::max);
        let total: f64 = candles.iter().map(|c| c.volume).sum();

        let flat = hi.is_nan() || lo.is_nan() || hi <= lo;
        if candles.is_empty() || flat || !total.is_finite() || total <= 0.0 {
            return Self::empty();
        }

        let width = (hi - lo) / n_bins as f64;
        let mut volumes = vec![0.0; n_bins];
        for c in candles {
            let idx = (((c.close - lo) / width) as usize).min(n_bins - 1);
            volumes[idx] += c.volume;
        }

        let mean_close = candles.iter().map(|c| c.close).sum::<f64>() / candles.len() as f64;
        let atr_ratio = if last_atr.is_finite() && mean_close > 0.0 {
            last_atr / mean_close
        } else {
            0.0
        };
        let threshold = config.base_threshold * (1.0 + atr_ratio);

        let bins = volumes
            .into_iter()
            .enumerate()
            .map(|(i, volume)| {
                let share = volume / total;
                let is_hvn = share > threshold;
                VolumeBin {
                    price_low: lo + width * i as f64,
                    price_high: if i + 1 == n_bins {
                        hi
                    } else {
                        lo + width * (i + 1) as f64
                    },
                    volume,
                    volume_percent: share,
                    is_hvn,
                    is_lvn: !is_hvn && share < threshold / 2.0,
                }
            })
            .collect();

        Self { bins, threshold }
    }

    /// Mean mid-price of HVN bins.
    pub fn hvn_price(&self) -> Option<f64> {
        mean_mid(self.bins.iter().filter(|b| b.is_hvn))
    }

    /// Mean mid-price of LVN bins.
    pub fn lvn_price(&self) -> Option<f64> {
        mean_mid(self.bins.iter().filter(|b| b.is_lvn))
    }

    /// Node class of the bin containing `price`; `None` outside the profile.
    pub fn node_at(&self, price: f64) -> Option<VolumeNode> {
        let last = self.bins.len().checked_sub(1)?;
        let bin = self.bins.iter().enumerate().find(|(i, b)| {
            price >= b.price_low && (price < b.price_high || (*i == last && price <= b.price_high))
        })?;
        let b = bin.1;
        Some(if b.is_hvn {
            VolumeNode::High
        } else if b.is_lvn {
            VolumeNode::Low
        } else {
            VolumeNode::Neutral
        })
    }
}

fn mean_mid<'a>(bins: impl Iterator<Item = &'a VolumeBin>) -> Option<f64> {
    let (sum, count) = bins.fold((0.0, 0usize), |(s, c), b| (s + b.mid(), c + 1));
    (count > 0).then(|| sum / count as f64)
}
