//! Domain types for SigScan

pub mod candle;
pub mod ids;
pub mod order_book;
pub mod signal;
pub mod ticker;

pub use candle::{mean_close, Candle};
pub use ids::SignalId;
pub use order_book::{side_volume, Level, OrderBookSnapshot};
pub use signal::{
    CrossKind, Direction, EntryCandidate, SentimentLabel, Signal, SignalCandidate, StopTakeLadder,
};
pub use ticker::Ticker24h;

/// Symbol type alias
pub type Symbol = String;
