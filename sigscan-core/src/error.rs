//! Structured error types for the computation stages.
//!
//! Every `DataError` means "abstain on this instrument for this cycle"; none
//! of them is fatal to the scan loop.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError {
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("indicator '{name}' is undefined on the last candle")]
    UndefinedIndicator { name: String },

    #[error("order book has an empty side")]
    EmptyOrderBook,

    #[error("order book volume below significance floor (bids {bids:.2}, asks {asks:.2}, floor {floor:.2})")]
    InsignificantBookVolume { bids: f64, asks: f64, floor: f64 },

    #[error("weighted {side} price is undefined (zero resting size)")]
    UndefinedWeightedPrice { side: &'static str },

    #[error("volume profile is empty")]
    EmptyVolumeProfile,
}

impl DataError {
    pub fn undefined(name: impl Into<String>) -> Self {
        DataError::UndefinedIndicator { name: name.into() }
    }
}
