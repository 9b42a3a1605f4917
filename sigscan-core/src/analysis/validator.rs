//! Signal validator: level collisions, minimum strength, minimum risk/reward.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::SignalCandidate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Two levels closer than this (absolute) collide.
    pub level_tolerance: f64,
    pub min_strength: f64,
    pub min_risk_reward: f64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            level_tolerance: 0.01,
            min_strength: 70.0,
            min_risk_reward: 2.0,
        }
    }
}

/// Slack on the risk/reward gate so ladders built at exactly the minimum
/// ratio survive float rounding.
const RATIO_EPSILON: f64 = 1e-9;

/// Why a candidate was turned down.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    NonFiniteLevel { index: usize },
    LevelCollision { a: usize, b: usize },
    WeakStrength { strength: f64, min: f64 },
    PoorRiskReward { ratio: f64, min: f64 },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::NonFiniteLevel { index } => write!(f, "level {index} is not finite"),
            Rejection::LevelCollision { a, b } => write!(f, "levels {a} and {b} collide"),
            Rejection::WeakStrength { strength, min } => {
                write!(f, "strength {strength:.2} below {min:.2}")
            }
            Rejection::PoorRiskReward { ratio, min } => {
                write!(f, "risk/reward {ratio:.2} below {min:.2}")
            }
        }
    }
}

/// Accept or reject a candidate. Checks run in order: finiteness,
/// collisions, strength, risk/reward.
pub fn validate(candidate: &SignalCandidate, cfg: &ValidatorConfig) -> Result<(), Rejection> {
    let levels = candidate.levels();

    if let Some(index) = levels.iter().position(|v| !v.is_finite()) {
        return Err(Rejection::NonFiniteLevel { index });
    }

    for a in 0..levels.len() {
        for b in (a + 1)..levels.len() {
            if (levels[a] - levels[b]).abs() < cfg.level_tolerance {
                return Err(Rejection::LevelCollision { a, b });
            }
        }
    }

    if candidate.strength.is_nan() || candidate.strength < cfg.min_strength {
        return Err(Rejection::WeakStrength {
            strength: candidate.strength,
            min: cfg.min_strength,
        });
    }

    let ratio = candidate.risk_reward();
    if ratio + RATIO_EPSILON < cfg.min_risk_reward {
        return Err(Rejection::PoorRiskReward {
            ratio,
            min: cfg.min_risk_reward,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Direction;

    fn candidate() -> SignalCandidate {
        SignalCandidate {
            symbol: "SOLUSDT".into(),
            direction: Direction::Long,
            entry1: 100.0,
            entry2: 98.0,
            stop_loss: 95.0,
            take_profits: [105.0, 110.0, 118.0, 124.0],
            strength: 82.0,
        }
    }

    #[test]
    fn risk_reward_exactly_two_passes() {
        assert_eq!(validate(&candidate(), &ValidatorConfig::default()), Ok(()));
    }

    #[test]
    fn calm_market_ladder_at_minimum_ratio_passes() {
        use crate::analysis::risk::{ladder, RiskConfig};
        use crate::indicators::IndicatorSnapshot;

        let cfg = ValidatorConfig::default();
        for i in 0..2000 {
            let entry = 100.0 + i as f64 * 0.137;
            let atr = entry * 0.005;
            let snap = IndicatorSnapshot {
                close: entry,
                vwap: entry,
                atr,
                ema50: entry,
                ema200: entry,
                rsi: 50.0,
                mfi: 50.0,
                macd: 0.0,
                macd_line: 0.0,
                macd_signal: 0.0,
                macd_min: -1.0,
                macd_max: 1.0,
                tenkan: entry,
                kijun: entry,
                senkou_a: entry,
                senkou_b: entry,
                ichimoku_cross: None,
                ema_cross: None,
                mean_close: entry,
            };
            let l = ladder(entry, Direction::Long, &snap, &RiskConfig::default());
            let c = SignalCandidate {
                symbol: "SOLUSDT".into(),
                direction: Direction::Long,
                entry1: entry,
                entry2: entry - 0.25 * atr,
                stop_loss: l.stop_loss,
                take_profits: l.take_profits,
                strength: 82.0,
            };
            assert_eq!(validate(&c, &cfg), Ok(()), "entry {entry}");
        }
    }

    #[test]
    fn colliding_levels_rejected() {
        let mut c = candidate();
        c.entry2 = 100.005;
        assert_eq!(
            validate(&c, &ValidatorConfig::default()),
            Err(Rejection::LevelCollision { a: 0, b: 1 })
        );
    }

    #[test]
    fn weak_strength_rejected() {
        let mut c = candidate();
        c.strength = 69.9;
        assert!(matches!(
            validate(&c, &ValidatorConfig::default()),
            Err(Rejection::WeakStrength { .. })
        ));
    }

    #[test]
    fn poor_risk_reward_rejected() {
        let mut c = candidate();
        c.take_profits[1] = 109.0;
        assert!(matches!(
            validate(&c, &ValidatorConfig::default()),
            Err(Rejection::PoorRiskReward { .. })
        ));
    }

    #[test]
    fn nan_level_rejected() {
        let mut c = candidate();
        c.take_profits[3] = f64::NAN;
        assert_eq!(
            validate(&c, &ValidatorConfig::default()),
            Err(Rejection::NonFiniteLevel { index: 6 })
        );
    }

    #[test]
    fn thresholds_are_configurable() {
        let mut c = candidate();
        c.strength = 60.0;
        let cfg = ValidatorConfig {
            min_strength: 50.0,
            ..ValidatorConfig::default()
        };
        assert_eq!(validate(&c, &cfg), Ok(()));
    }
}
