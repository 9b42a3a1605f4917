//! SigScan Runner: the scan loop around `sigscan-core`.
//!
//! This crate provides:
//! - TOML scan configuration
//! - Scan memory and seeded instrument sampling
//! - The SELECT → FETCH → COMPUTE → EVALUATE → EMIT/ABSTAIN → SLEEP loop
//! - Signal stores (latest-value JSON document, CSV history, in-memory)

pub mod config;
pub mod memory;
pub mod orchestrator;
pub mod store;

pub use config::{ConfigError, ExchangeConfig, ScanConfig, ScanSettings, StoreConfig};
pub use memory::ScanMemory;
pub use orchestrator::{
    sleep_cancellable, CycleReport, InstrumentError, Phase, ScanError, ScanSummary, Scanner,
};
pub use store::{CsvHistoryStore, JsonFileStore, MemoryStore, SignalStore, StoreError, TeeStore};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn config_is_send_sync() {
        assert_send::<ScanConfig>();
        assert_sync::<ScanConfig>();
    }

    #[test]
    fn scanner_is_send() {
        assert_send::<Scanner>();
    }

    #[test]
    fn stores_are_send() {
        assert_send::<JsonFileStore>();
        assert_send::<CsvHistoryStore>();
        assert_send::<TeeStore>();
        assert_send::<Box<dyn SignalStore>>();
    }

    #[test]
    fn errors_are_send_sync() {
        assert_send::<ScanError>();
        assert_sync::<ScanError>();
        assert_send::<InstrumentError>();
        assert_sync::<InstrumentError>();
    }
}
