//! Circuit breaker for exchange bans and sustained rate limiting.
//!
//! HTTP 418 (IP ban) trips the breaker immediately; repeated 429s or server
//! errors trip it after `failure_threshold` consecutive failures. While open,
//! every request is refused until the cooldown elapses on the injected clock.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::clock::Clock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open { tripped_at: DateTime<Utc> },
}

pub struct CircuitBreaker {
    state: Mutex<BreakerState>,
    consecutive_failures: Mutex<u32>,
    cooldown: Duration,
    failure_threshold: u32,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("state", &self.state())
            .field("cooldown", &self.cooldown)
            .field("failure_threshold", &self.failure_threshold)
            .finish()
    }
}

impl CircuitBreaker {
    pub fn new(cooldown: Duration, failure_threshold: u32, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(BreakerState::Closed),
            consecutive_failures: Mutex::new(0),
            cooldown,
            failure_threshold: failure_threshold.max(1),
            clock,
        }
    }

    /// 30-minute cooldown, trips after 3 consecutive failures.
    pub fn default_exchange(clock: Arc<dyn Clock>) -> Self {
        Self::new(Duration::from_secs(30 * 60), 3, clock)
    }

    pub fn state(&self) -> BreakerState {
        *self.state.lock().unwrap()
    }

    /// Whether a request may go out now. Closes the breaker once the
    /// cooldown has expired.
    pub fn is_allowed(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        match *state {
            BreakerState::Closed => true,
            BreakerState::Open { tripped_at } => {
                if self.elapsed_since(tripped_at) >= self.cooldown {
                    *state = BreakerState::Closed;
                    *self.consecutive_failures.lock().unwrap() = 0;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        *self.consecutive_failures.lock().unwrap() = 0;
    }

    pub fn record_failure(&self) {
        let mut failures = self.consecutive_failures.lock().unwrap();
        *failures += 1;
        if *failures >= self.failure_threshold {
            *self.state.lock().unwrap() = BreakerState::Open {
                tripped_at: self.clock.now(),
            };
        }
    }

    /// Open immediately (ban responses).
    pub fn trip(&self) {
        *self.state.lock().unwrap() = BreakerState::Open {
            tripped_at: self.clock.now(),
        };
    }

    /// Zero when closed.
    pub fn remaining_cooldown(&self) -> Duration {
        match self.state() {
            BreakerState::Closed => Duration::ZERO,
            BreakerState::Open { tripped_at } => {
                self.cooldown.saturating_sub(self.elapsed_since(tripped_at))
            }
        }
    }

    fn elapsed_since(&self, at: DateTime<Utc>) -> Duration {
        (self.clock.now() - at).to_std().unwrap_or(Duration::ZERO)
    }
}
