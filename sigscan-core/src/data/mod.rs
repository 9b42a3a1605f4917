//! Market data acquisition: the facade trait, the Binance provider, the
//! circuit breaker guarding it, and candle clean-up.

pub mod binance;
pub mod canonicalize;
pub mod circuit_breaker;
pub mod provider;

pub use binance::{BinanceProvider, DEFAULT_BASE_URL};
pub use canonicalize::{canonicalize, canonicalize_logged, CanonicalReport};
pub use circuit_breaker::{BreakerState, CircuitBreaker};
pub use provider::{AcquisitionError, Interval, MarketDataProvider};
