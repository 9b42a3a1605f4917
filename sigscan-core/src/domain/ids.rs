use serde::{Deserialize, Serialize};
use std::fmt;

/// Content-addressed signal identifier.
///
/// Two signals with identical symbol, direction, levels and creation time
/// hash to the same id, which lets history stores drop duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignalId(pub String);

impl SignalId {
    /// Hash the canonical byte form of a signal's identity fields.
    ///
    /// Uses BLAKE3 for stable hashing across builds/platforms.
    pub fn derive(symbol: &str, direction: &str, levels: &[f64], created_at_millis: i64) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(symbol.as_bytes());
        hasher.update(&[0]);
        hasher.update(direction.as_bytes());
        for level in levels {
            hasher.update(&level.to_bits().to_le_bytes());
        }
        hasher.update(&created_at_millis.to_le_bytes());
        let hash = hasher.finalize();
        // 16 hex chars is plenty to tell signals apart in a history file.
        Self(hash.to_hex()[..16].to_string())
    }
}

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
