//! Bounded retry with fixed, linear or exponential backoff.
//!
//! Delays go through the injected `Clock`, so a test can drive a full
//! exhaustion sequence without waiting.

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::time::Duration;
use tracing::warn;

use crate::clock::Clock;
use crate::data::AcquisitionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
    Fixed,
    Linear,
    Exponential,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first. At least 1.
    pub max_attempts: u32,
    pub delay_ms: u64,
    pub backoff: Backoff,
    /// Upper bound on any single delay.
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 5_000,
            backoff: Backoff::Fixed,
            max_delay_ms: 60_000,
        }
    }
}

/// Errors that know whether another attempt could succeed.
pub trait Retryable {
    fn is_retryable(&self) -> bool;

    /// Minimum wait the remote side asked for, if any.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl Retryable for AcquisitionError {
    fn is_retryable(&self) -> bool {
        AcquisitionError::is_retryable(self)
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            AcquisitionError::RateLimited { retry_after_secs } => {
                Some(Duration::from_secs(*retry_after_secs))
            }
            _ => None,
        }
    }
}

impl RetryPolicy {
    /// No retries at all.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay after failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.delay_ms;
        let n = attempt.max(1) as u64;
        let ms = match self.backoff {
            Backoff::Fixed => base,
            Backoff::Linear => base.saturating_mul(n),
            Backoff::Exponential => {
                let factor = 1u64.checked_shl((n - 1).min(63) as u32).unwrap_or(u64::MAX);
                base.saturating_mul(factor)
            }
        };
        Duration::from_millis(ms.min(self.max_delay_ms))
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    /// `op` receives the 1-based attempt number.
    pub fn run<T, E, F>(&self, clock: &dyn Clock, label: &str, mut op: F) -> Result<T, E>
    where
        E: Retryable + Display,
        F: FnMut(u32) -> Result<T, E>,
    {
        let max = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_retryable() || attempt >= max => return Err(e),
                Err(e) => {
                    let mut delay = self.delay_for(attempt);
                    if let Some(floor) = e.retry_after() {
                        delay = delay.max(floor.min(Duration::from_millis(self.max_delay_ms)));
                    }
                    warn!(
                        label,
                        attempt,
                        max_attempts = max,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying"
                    );
                    clock.sleep(delay);
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::Utc;

    fn policy(backoff: Backoff) -> RetryPolicy {
        RetryPolicy {
            max_attempts: 4,
            delay_ms: 1_000,
            backoff,
            max_delay_ms: 60_000,
        }
    }

    #[test]
    fn backoff_schedules() {
        let secs = |p: &RetryPolicy| (1..=4).map(|a| p.delay_for(a).as_secs()).collect::<Vec<_>>();
        assert_eq!(secs(&policy(Backoff::Fixed)), vec![1, 1, 1, 1]);
        assert_eq!(secs(&policy(Backoff::Linear)), vec![1, 2, 3, 4]);
        assert_eq!(secs(&policy(Backoff::Exponential)), vec![1, 2, 4, 8]);
    }

    #[test]
    fn delay_is_capped() {
        let mut p = policy(Backoff::Exponential);
        p.max_delay_ms = 3_000;
        assert_eq!(p.delay_for(10), Duration::from_secs(3));
        assert_eq!(p.delay_for(200), Duration::from_secs(3));
    }

    #[test]
    fn succeeds_after_transient_failures() {
        let clock = ManualClock::new(Utc::now());
        let result = policy(Backoff::Linear).run(&clock, "test", |attempt| {
            if attempt < 3 {
                Err(AcquisitionError::Unavailable("down".into()))
            } else {
                Ok(attempt)
            }
        });
        assert_eq!(result, Ok(3));
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(1), Duration::from_secs(2)]);
    }

    #[test]
    fn exhausts_attempts() {
        let clock = ManualClock::new(Utc::now());
        let mut calls = 0;
        let result: Result<(), _> = policy(Backoff::Fixed).run(&clock, "test", |_| {
            calls += 1;
            Err(AcquisitionError::Unavailable("down".into()))
        });
        assert!(result.is_err());
        assert_eq!(calls, 4);
        assert_eq!(clock.sleeps().len(), 3);
    }

    #[test]
    fn permanent_error_is_not_retried() {
        let clock = ManualClock::new(Utc::now());
        let mut calls = 0;
        let result: Result<(), _> = policy(Backoff::Fixed).run(&clock, "test", |_| {
            calls += 1;
            Err(AcquisitionError::InvalidSymbol { symbol: "NOPE".into() })
        });
        assert!(matches!(result, Err(AcquisitionError::InvalidSymbol { .. })));
        assert_eq!(calls, 1);
        assert!(clock.sleeps().is_empty());
    }

    #[test]
    fn rate_limit_extends_delay() {
        let clock = ManualClock::new(Utc::now());
        let _ = policy(Backoff::Fixed).run(&clock, "test", |attempt| {
            if attempt == 1 {
                Err(AcquisitionError::RateLimited { retry_after_secs: 30 })
            } else {
                Ok(())
            }
        });
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(30)]);
    }

    #[test]
    fn none_policy_runs_once() {
        let clock = ManualClock::new(Utc::now());
        let mut calls = 0;
        let _: Result<(), _> = RetryPolicy::none().run(&clock, "test", |_| {
            calls += 1;
            Err(AcquisitionError::Unavailable("x".into()))
        });
        assert_eq!(calls, 1);
    }
}
