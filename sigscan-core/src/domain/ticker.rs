use serde::{Deserialize, Serialize};

/// Rolling 24h statistics for one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker24h {
    pub symbol: String,
    pub last_price: f64,
    pub price_change_percent: f64,
    pub volume: f64,
    pub open_interest: f64,
}
