//! One consolidated evaluation of a single instrument.
//!
//! candles + book → indicators → book analysis → volume profile → entries
//! → risk plan → direction selection → validation. Pure: no I/O, no clock.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::context::{ichimoku_bias, unusual_volume, ContextConfig, IchimokuBias, WaveOverlay};
use super::entry::{find_entries, EntryConfig};
use super::order_book::{BookAnalysis, OrderBookConfig};
use super::risk::{plan, RiskConfig, RiskPlan};
use super::validator::{validate, Rejection, ValidatorConfig};
use super::volume_profile::{VolumeProfile, VolumeProfileConfig};
use crate::domain::{Candle, CrossKind, Direction, OrderBookSnapshot, SignalCandidate};
use crate::error::DataError;
use crate::indicators::{IndicatorConfig, IndicatorEngine, IndicatorSnapshot};

/// Tunables for every computation stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub indicators: IndicatorConfig,
    pub order_book: OrderBookConfig,
    pub volume_profile: VolumeProfileConfig,
    pub entry: EntryConfig,
    pub risk: RiskConfig,
    pub validator: ValidatorConfig,
    pub context: ContextConfig,
}

/// What the pipeline concluded for one instrument.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A candidate that passed validation.
    Accepted(SignalCandidate),
    /// No direction produced an entry above the quality threshold (or the
    /// EMA cross direction had none).
    NoEntry,
    /// The selected candidate failed validation.
    Rejected {
        candidate: SignalCandidate,
        reason: Rejection,
    },
}

/// Full evaluation result, including the advisory overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub symbol: String,
    pub snapshot: IndicatorSnapshot,
    pub book: BookAnalysis,
    pub hvn_price: Option<f64>,
    pub lvn_price: Option<f64>,
    pub ema_cross: Option<CrossKind>,
    pub bias: IchimokuBias,
    pub waves: Option<WaveOverlay>,
    pub unusual_volume: bool,
    pub outcome: Outcome,
}

impl Evaluation {
    pub fn accepted(&self) -> Option<&SignalCandidate> {
        match &self.outcome {
            Outcome::Accepted(c) => Some(c),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    config: PipelineConfig,
    engine: IndicatorEngine,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let engine = IndicatorEngine::new(config.indicators.clone());
        Self { config, engine }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Evaluate one instrument. `Err` means abstain for a data reason;
    /// `Ok` carries either an accepted candidate or why there is none.
    pub fn evaluate(
        &self,
        symbol: &str,
        candles: &[Candle],
        book: &OrderBookSnapshot,
    ) -> Result<Evaluation, DataError> {
        let cfg = &self.config;
        let set = self.engine.compute(candles)?;
        let snap = set.snapshot()?;
        let analysis = BookAnalysis::analyze(book, &cfg.order_book, snap.close, Some(snap.atr))?;
        let profile = VolumeProfile::build(candles, snap.atr, &cfg.volume_profile);

        if analysis.liquidity_void {
            info!(symbol, "liquidity void in order book");
        }
        if analysis.stop_hunt {
            info!(symbol, "possible stop hunt near key level");
        }

        let mut plans = Vec::new();
        for direction in priority_directions(&snap, &cfg.entry) {
            plans.extend(self.plan_direction(direction, &snap, &analysis, &profile, &set.fibonacci));
        }
        if plans.is_empty() {
            for direction in [Direction::Long, Direction::Short] {
                plans.extend(self.plan_direction(direction, &snap, &analysis, &profile, &set.fibonacci));
            }
        }

        let ema_cross = snap.ema_cross;
        let selected = select_plan(&plans, ema_cross);

        let outcome = match selected {
            None => Outcome::NoEntry,
            Some(p) => {
                let candidate = SignalCandidate {
                    symbol: symbol.to_string(),
                    direction: p.direction,
                    entry1: p.entry1,
                    entry2: p.entry2,
                    stop_loss: p.ladder.stop_loss,
                    take_profits: p.ladder.take_profits,
                    strength: p.strength,
                };
                match validate(&candidate, &cfg.validator) {
                    Ok(()) => Outcome::Accepted(candidate),
                    Err(reason) => {
                        debug!(symbol, %reason, "candidate rejected");
                        Outcome::Rejected { candidate, reason }
                    }
                }
            }
        };

        Ok(Evaluation {
            symbol: symbol.to_string(),
            hvn_price: profile.hvn_price(),
            lvn_price: profile.lvn_price(),
            ema_cross,
            bias: ichimoku_bias(&snap),
            waves: WaveOverlay::compute(candles, cfg.context.cycle_length),
            unusual_volume: unusual_volume(candles, &cfg.context),
            book: analysis,
            snapshot: snap,
            outcome,
        })
    }

    fn plan_direction(
        &self,
        direction: Direction,
        snap: &IndicatorSnapshot,
        book: &BookAnalysis,
        profile: &VolumeProfile,
        fib: &crate::indicators::FibonacciLevels,
    ) -> Option<RiskPlan> {
        let best = find_entries(direction, snap, book, profile, &self.config.entry)
            .into_iter()
            .next()?;
        Some(plan(&best, snap, fib, &self.config.risk))
    }
}

/// Directions to search first: Short when RSI or MFI is overbought, Long
/// when oversold. Empty when neither applies.
pub fn priority_directions(snap: &IndicatorSnapshot, cfg: &EntryConfig) -> Vec<Direction> {
    let mut out = Vec::new();
    if snap.rsi > cfg.overbought || snap.mfi > cfg.overbought {
        out.push(Direction::Short);
    }
    if snap.rsi < cfg.oversold || snap.mfi < cfg.oversold {
        out.push(Direction::Long);
    }
    out
}

/// An EMA cross picks its own direction; otherwise the stronger plan wins
/// (Short on a tie, whatever the evaluation order).
pub fn select_plan(plans: &[RiskPlan], ema_cross: Option<CrossKind>) -> Option<RiskPlan> {
    match ema_cross {
        Some(cross) => plans.iter().find(|p| p.direction == cross.direction()).copied(),
        None => plans.iter().copied().reduce(|best, p| {
            let tie_to_short = p.strength == best.strength && p.direction == Direction::Short;
            if p.strength > best.strength || tie_to_short {
                p
            } else {
                best
            }
        }),
    }
}
