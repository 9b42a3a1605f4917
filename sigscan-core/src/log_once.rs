//! Per-symbol message de-duplication.
//!
//! The scan loop revisits the same instruments every super-cycle and would
//! otherwise repeat identical "insufficient data" lines forever. `LogOnce`
//! remembers the last message emitted per symbol and suppresses repeats
//! until a different message is seen or the memory is cleared.

use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{info, warn};

#[derive(Debug, Default)]
pub struct LogOnce {
    last: Mutex<HashMap<String, String>>,
}

impl LogOnce {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true (and records the message) when it differs from the last
    /// one seen for `symbol`.
    pub fn should_log(&self, symbol: &str, message: &str) -> bool {
        let mut last = self.last.lock().unwrap();
        match last.get(symbol) {
            Some(prev) if prev == message => false,
            _ => {
                last.insert(symbol.to_string(), message.to_string());
                true
            }
        }
    }

    pub fn info(&self, symbol: &str, message: &str) {
        if self.should_log(symbol, message) {
            info!(symbol, "{message}");
        }
    }

    pub fn warn(&self, symbol: &str, message: &str) {
        if self.should_log(symbol, message) {
            warn!(symbol, "{message}");
        }
    }

    pub fn clear(&self) {
        self.last.lock().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeats_are_suppressed_per_symbol() {
        let log = LogOnce::new();
        assert!(log.should_log("ETHUSDT", "too short"));
        assert!(!log.should_log("ETHUSDT", "too short"));
        assert!(log.should_log("SOLUSDT", "too short"));
        assert!(log.should_log("ETHUSDT", "empty book"));
        assert!(log.should_log("ETHUSDT", "too short"));
    }

    #[test]
    fn clear_forgets_history() {
        let log = LogOnce::new();
        assert!(log.should_log("ETHUSDT", "x"));
        log.clear();
        assert!(log.should_log("ETHUSDT", "x"));
    }
}
