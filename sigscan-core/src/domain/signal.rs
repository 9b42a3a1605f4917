//! Signal types: direction, entry candidates, stop/take ladders and the
//! validated signal document handed to the output sink.

use super::ids::SignalId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Directional intent of a trade proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// +1.0 for Long, −1.0 for Short. Multiplying an offset by the sign moves
    /// a level in the profitable direction.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Long => "Long",
            Direction::Short => "Short",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fast/slow line crossover on the last bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrossKind {
    #[serde(rename = "Bullish Cross")]
    Bullish,
    #[serde(rename = "Bearish Cross")]
    Bearish,
}

impl CrossKind {
    /// The trade direction a cross argues for.
    pub fn direction(self) -> Direction {
        match self {
            CrossKind::Bullish => Direction::Long,
            CrossKind::Bearish => Direction::Short,
        }
    }
}

impl fmt::Display for CrossKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrossKind::Bullish => f.write_str("Bullish Cross"),
            CrossKind::Bearish => f.write_str("Bearish Cross"),
        }
    }
}

/// Coarse market mood derived from the benchmark's 24h statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SentimentLabel {
    Bullish,
    Bearish,
    Neutral,
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SentimentLabel::Bullish => "Bullish",
            SentimentLabel::Bearish => "Bearish",
            SentimentLabel::Neutral => "Neutral",
        };
        f.write_str(s)
    }
}

/// A proposed entry price with its quality score (always >= 0).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntryCandidate {
    pub price: f64,
    pub direction: Direction,
    pub quality_score: f64,
}

/// Stop-loss plus a four-level take-profit ladder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StopTakeLadder {
    pub stop_loss: f64,
    pub take_profits: [f64; 4],
}

impl StopTakeLadder {
    /// Long: stop below entry, targets strictly increasing above entry.
    /// Short: the mirror image.
    pub fn is_well_formed(&self, entry: f64, direction: Direction) -> bool {
        let s = direction.sign();
        if (entry - self.stop_loss) * s <= 0.0 {
            return false;
        }
        let mut prev = entry;
        for &tp in &self.take_profits {
            if (tp - prev) * s <= 0.0 {
                return false;
            }
            prev = tp;
        }
        true
    }
}

/// A fully levelled trade proposal that has not yet passed the validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalCandidate {
    pub symbol: String,
    pub direction: Direction,
    pub entry1: f64,
    pub entry2: f64,
    pub stop_loss: f64,
    pub take_profits: [f64; 4],
    pub strength: f64,
}

impl SignalCandidate {
    /// The seven numeric levels in document order.
    pub fn levels(&self) -> [f64; 7] {
        [
            self.entry1,
            self.entry2,
            self.stop_loss,
            self.take_profits[0],
            self.take_profits[1],
            self.take_profits[2],
            self.take_profits[3],
        ]
    }

    /// |tp2 − entry1| / |entry1 − stop_loss|; zero when risk is zero.
    pub fn risk_reward(&self) -> f64 {
        let risk = (self.entry1 - self.stop_loss).abs();
        let reward = (self.take_profits[1] - self.entry1).abs();
        if risk > 0.0 {
            reward / risk
        } else {
            0.0
        }
    }
}

/// A validated, immutable trading signal. Superseded, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub id: SignalId,
    pub symbol: String,
    pub direction: Direction,
    pub entry1: f64,
    pub entry2: f64,
    pub stop_loss: f64,
    pub take_profits: [f64; 4],
    pub strength: f64,
    pub ema_cross: Option<CrossKind>,
    pub sentiment: Option<SentimentLabel>,
    pub created_at: DateTime<Utc>,
}

impl Signal {
    /// Promote a validated candidate into a signal, stamping id and time.
    pub fn from_candidate(
        candidate: SignalCandidate,
        ema_cross: Option<CrossKind>,
        sentiment: Option<SentimentLabel>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let id = SignalId::derive(
            &candidate.symbol,
            candidate.direction.as_str(),
            &candidate.levels(),
            created_at.timestamp_millis(),
        );
        Self {
            id,
            symbol: candidate.symbol,
            direction: candidate.direction,
            entry1: candidate.entry1,
            entry2: candidate.entry2,
            stop_loss: candidate.stop_loss,
            take_profits: candidate.take_profits,
            strength: candidate.strength,
            ema_cross,
            sentiment,
            created_at,
        }
    }

    pub fn levels(&self) -> [f64; 7] {
        [
            self.entry1,
            self.entry2,
            self.stop_loss,
            self.take_profits[0],
            self.take_profits[1],
            self.take_profits[2],
            self.take_profits[3],
        ]
    }
}
