//! Advisory context: benchmark sentiment, Ichimoku wave/time-cycle overlay,
//! Ichimoku bias and unusual-volume detection. Nothing here gates a signal.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::{Candle, SentimentLabel, Ticker24h};
use crate::indicators::sma::rolling_mean;
use crate::indicators::{last_finite, IndicatorSnapshot};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Instrument whose 24h stats drive sentiment and whose candles are
    /// fetched on the benchmark timeframes each cycle.
    pub benchmark_symbol: String,
    /// Market-cap source id for the benchmark (e.g. CoinGecko coin id).
    pub market_cap_id: String,
    pub market_cap_ttl_secs: u64,
    pub cycle_length: usize,
    pub unusual_volume_mid: f64,
    pub unusual_volume_short: f64,
    pub unusual_volume_long: f64,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            benchmark_symbol: "BTCUSDT".into(),
            market_cap_id: "bitcoin".into(),
            market_cap_ttl_secs: 3600,
            cycle_length: 26,
            unusual_volume_mid: 1.5,
            unusual_volume_short: 1.2,
            unusual_volume_long: 1.1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    pub label: SentimentLabel,
    pub score: f64,
}

/// Label from the sign of the 24h change; the score is scaled by market cap
/// when one is known.
pub fn sentiment(ticker: &Ticker24h, market_cap: Option<f64>) -> Sentiment {
    let change = ticker.price_change_percent;
    let label = if change > 0.0 {
        SentimentLabel::Bullish
    } else if change < 0.0 {
        SentimentLabel::Bearish
    } else {
        SentimentLabel::Neutral
    };
    let base = change * ticker.volume * ticker.open_interest;
    let score = match market_cap {
        Some(cap) if cap > 0.0 => base * cap / 1e12,
        _ => base / 1e4,
    };
    Sentiment { label, score }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IchimokuBias {
    Buy,
    Sell,
    Neutral,
}

impl fmt::Display for IchimokuBias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IchimokuBias::Buy => "Buy",
            IchimokuBias::Sell => "Sell",
            IchimokuBias::Neutral => "Neutral",
        };
        f.write_str(s)
    }
}

pub fn ichimoku_bias(snap: &IndicatorSnapshot) -> IchimokuBias {
    if snap.tenkan > snap.kijun && snap.close > snap.senkou_a {
        IchimokuBias::Buy
    } else if snap.tenkan < snap.kijun && snap.close < snap.senkou_b {
        IchimokuBias::Sell
    } else {
        IchimokuBias::Neutral
    }
}

/// Four projected time-cycle indices: `anchor + cycle·i + len` for
/// i = 1..=4 with anchor = len − cycle.
pub fn time_cycles(len: usize, cycle_length: usize) -> [i64; 4] {
    let len = len as i64;
    let cycle = cycle_length as i64;
    let anchor = len - cycle;
    [1, 2, 3, 4].map(|i| anchor + cycle * i + len)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WaveOverlay {
    pub i_wave: f64,
    pub v_wave: f64,
    pub n_wave: f64,
    pub v_target: f64,
    pub e_target: f64,
    pub nt_target: f64,
    pub time_cycles: [i64; 4],
}

impl WaveOverlay {
    /// `None` for an empty series or a non-positive minimum low.
    pub fn compute(candles: &[Candle], cycle_length: usize) -> Option<Self> {
        let last = candles.last()?;
        let min_low = candles.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
        let max_high = candles.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
        let max_close = candles.iter().map(|c| c.close).fold(f64::NEG_INFINITY, f64::max);
        if min_low.is_nan() || min_low <= 0.0 {
            return None;
        }

        let i_wave = (last.close - min_low) / min_low;
        let v_wave = (max_high - min_low) / min_low;
        let v_target = max_close + (max_close - min_low);
        let e_target = v_target * 1.618;
        Some(Self {
            i_wave,
            v_wave,
            n_wave: v_wave + i_wave,
            v_target,
            e_target,
            nt_target: e_target * 1.272,
            time_cycles: time_cycles(candles.len(), cycle_length),
        })
    }
}

/// Last volume exceeds the 20-, 5- and 50-period means by the configured
/// multiples.
pub fn unusual_volume(candles: &[Candle], cfg: &ContextConfig) -> bool {
    let volumes: Vec<f64> = candles.iter().map(|c| c.volume).collect();
    let Some(&last) = volumes.last() else {
        return false;
    };
    let mean = |window| last_finite(&rolling_mean(&volumes, window));
    match (mean(20), mean(5), mean(50)) {
        (Some(mid), Some(short), Some(long)) => {
            last > mid * cfg.unusual_volume_mid
                && last > short * cfg.unusual_volume_short
                && last > long * cfg.unusual_volume_long
        }
        _ => false,
    }
}
