//! Scan loop behavior against a scripted market-data provider and a manual
//! clock: startup failure, bounded cycles, cancellation, scan memory,
//! retry classification, book re-acquisition and signal emission.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{TimeZone, Utc};
use sigscan_core::data::{AcquisitionError, Interval, MarketDataProvider};
use sigscan_core::domain::{Candle, Level, OrderBookSnapshot, Ticker24h};
use sigscan_core::{Clock, ManualClock};
use sigscan_runner::{JsonFileStore, MemoryStore, ScanConfig, ScanError, Scanner, SignalStore};

// ── Mock provider ────────────────────────────────────────────────────

#[derive(Default)]
struct MockProvider {
    symbols: Vec<String>,
    ping_fails: bool,
    bid_size: f64,
    /// Scripted candle failures per symbol, consumed front to back.
    candle_failures: Mutex<HashMap<String, Vec<AcquisitionError>>>,
    calls: Mutex<HashMap<&'static str, usize>>,
}

impl MockProvider {
    fn new(symbols: &[&str]) -> Self {
        Self {
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
            bid_size: 500.0,
            ..Self::default()
        }
    }

    fn fail_candles(self, symbol: &str, errors: Vec<AcquisitionError>) -> Self {
        self.candle_failures
            .lock()
            .unwrap()
            .insert(symbol.to_string(), errors);
        self
    }

    fn count(&self, op: &'static str) {
        *self.calls.lock().unwrap().entry(op).or_default() += 1;
    }

    fn calls(&self, op: &'static str) -> usize {
        self.calls.lock().unwrap().get(op).copied().unwrap_or(0)
    }
}

fn series(n: usize) -> Vec<Candle> {
    let base = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    (0..n)
        .map(|i| {
            let t = i as f64;
            let close = 100.0 + 0.03 * t + (t * 0.15).sin() * 3.0;
            let open = close - 0.4 * (t * 0.3).cos();
            Candle {
                timestamp: base + chrono::Duration::hours(i as i64),
                open,
                high: open.max(close) + 0.8,
                low: open.min(close) - 0.8,
                close,
                volume: 1_000.0 + ((i * 37) % 500) as f64,
            }
        })
        .collect()
}

impl MarketDataProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn candles(
        &self,
        symbol: &str,
        _interval: Interval,
        limit: usize,
    ) -> Result<Vec<Candle>, AcquisitionError> {
        self.count(if symbol == "BTCUSDT" { "benchmark" } else { "candles" });
        if let Some(queue) = self.candle_failures.lock().unwrap().get_mut(symbol) {
            if !queue.is_empty() {
                return Err(queue.remove(0));
            }
        }
        Ok(series(limit.min(300)))
    }

    fn order_book(&self, symbol: &str, depth: usize) -> Result<OrderBookSnapshot, AcquisitionError> {
        self.count("order_book");
        let mid = series(300).last().map(|c| c.close).unwrap_or(100.0);
        let levels = depth.min(50);
        Ok(OrderBookSnapshot {
            symbol: symbol.to_string(),
            bids: (1..=levels)
                .map(|i| Level::new(mid - 0.05 * i as f64, self.bid_size))
                .collect(),
            asks: (1..=levels)
                .map(|i| Level::new(mid + 0.05 * i as f64, 150.0))
                .collect(),
            captured_at: Utc::now(),
        })
    }

    fn ticker(&self, symbol: &str) -> Result<Ticker24h, AcquisitionError> {
        self.count("ticker");
        Ok(Ticker24h {
            symbol: symbol.to_string(),
            last_price: 64_000.0,
            price_change_percent: -1.2,
            volume: 250_000.0,
            open_interest: 80_000.0,
        })
    }

    fn tradable_symbols(&self, quote: &str) -> Result<Vec<String>, AcquisitionError> {
        self.count("symbols");
        Ok(self
            .symbols
            .iter()
            .filter(|s| s.ends_with(quote))
            .cloned()
            .collect())
    }

    fn ping(&self) -> Result<(), AcquisitionError> {
        self.count("ping");
        if self.ping_fails {
            Err(AcquisitionError::Unavailable("connection refused".into()))
        } else {
            Ok(())
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

fn config(max_cycles: u64) -> ScanConfig {
    let mut config = ScanConfig::default();
    config.scan.max_cycles = Some(max_cycles);
    config.scan.seed = Some(7);
    config.scan.candle_limit = 300;
    config.exchange.market_cap_enabled = false;
    config
}

/// A config under which any two-sided book with a plan yields a signal.
fn permissive(max_cycles: u64) -> ScanConfig {
    let mut config = config(max_cycles);
    config.entry.force_gate = 0.0;
    config.entry.calm_threshold = f64::NEG_INFINITY;
    config.entry.volatile_threshold = f64::NEG_INFINITY;
    config.validator.level_tolerance = 0.0;
    config.validator.min_strength = 0.0;
    config.validator.min_risk_reward = 0.0;
    config
}

fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
    ))
}

fn scanner(config: ScanConfig, provider: &Arc<MockProvider>, clock: &Arc<ManualClock>) -> Scanner {
    Scanner::new(
        config,
        provider.clone(),
        clock.clone(),
        Box::new(MemoryStore::new()),
    )
}

// ── Startup ──────────────────────────────────────────────────────────

#[test]
fn unreachable_exchange_at_startup_is_fatal() {
    let provider = Arc::new(MockProvider {
        ping_fails: true,
        ..MockProvider::new(&["ETHUSDT"])
    });
    let clock = clock();
    let err = scanner(config(5), &provider, &clock).run(None).unwrap_err();

    assert!(matches!(
        err,
        ScanError::ExchangeUnreachable(AcquisitionError::Unavailable(_))
    ));
    assert_eq!(provider.calls("ping"), 3);
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(5); 2]);
    assert_eq!(provider.calls("symbols"), 0);
}

// ── Loop control ─────────────────────────────────────────────────────

#[test]
fn stops_after_max_cycles() {
    let provider = Arc::new(MockProvider::new(&[]));
    let clock = clock();
    let summary = scanner(config(3), &provider, &clock).run(None).unwrap();

    assert_eq!(summary.cycles, 3);
    assert_eq!(summary.evaluated, 0);
    assert!(!summary.cancelled);
    // Nothing evaluated, so only the 60 s cycle pause between cycles.
    assert_eq!(clock.total_slept(), Duration::from_secs(2 * 60));
    // Benchmark fetched on both default timeframes every cycle.
    assert_eq!(provider.calls("benchmark"), 6);
}

#[test]
fn cancellation_before_first_cycle() {
    let provider = Arc::new(MockProvider::new(&["ETHUSDT"]));
    let clock = clock();
    let flag = AtomicBool::new(true);
    let summary = scanner(config(10), &provider, &clock)
        .run(Some(&flag))
        .unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.cycles, 0);
    assert_eq!(provider.calls("symbols"), 0);
    assert!(flag.load(Ordering::Relaxed));
}

#[test]
fn memory_skips_seen_instruments_until_reset() {
    let provider = Arc::new(MockProvider {
        bid_size: 0.0,
        ..MockProvider::new(&["AUSDT", "BUSDT", "CUSDT", "DBTC"])
    });
    let clock = clock();
    let mut cfg = config(10);
    cfg.scan.sample_size = 2;
    let mut scan = scanner(cfg, &provider, &clock);

    let first = scan.run_cycle(None).selected;
    let second = scan.run_cycle(None).selected;
    let third = scan.run_cycle(None).selected;

    assert_eq!(first.len(), 2);
    assert_eq!(second.len(), 1);
    assert!(third.is_empty());
    assert!(!second.iter().any(|s| first.contains(s)));
    assert!(first.iter().chain(&second).all(|s| s.ends_with("USDT")));
    assert_eq!(scan.memory().len(), 3);
}

#[test]
fn memory_resets_every_k_cycles() {
    let provider = Arc::new(MockProvider {
        bid_size: 0.0,
        ..MockProvider::new(&["AUSDT"])
    });
    let clock = clock();
    let mut cfg = config(4);
    cfg.scan.memory_reset_cycles = 2;
    let summary = scanner(cfg, &provider, &clock).run(None).unwrap();

    assert_eq!(summary.cycles, 4);
    assert_eq!(summary.memory_resets, 2);
    // AUSDT is evaluated in cycles 1 and 3 only.
    assert_eq!(summary.evaluated, 2);
}

// ── Per-instrument failures ──────────────────────────────────────────

/// Zero resting bid size: the book is re-acquired until the budget is
/// exhausted and the instrument is abstained, not crashed.
#[test]
fn zero_volume_bids_abstain_after_reacquire() {
    let provider = Arc::new(MockProvider {
        bid_size: 0.0,
        ..MockProvider::new(&["ETHUSDT"])
    });
    let clock = clock();
    let cfg = config(1);
    let max_reacquire = cfg.order_book.max_reacquire as usize;
    let mut scan = scanner(cfg, &provider, &clock);

    let report = scan.run_cycle(None);

    assert_eq!(report.selected, vec!["ETHUSDT".to_string()]);
    assert_eq!(report.abstained, 1);
    assert!(report.signal.is_none());
    assert_eq!(provider.calls("order_book"), max_reacquire + 1);
    assert!(scan.store().latest().unwrap().is_none());
}

#[test]
fn invalid_symbol_is_not_retried() {
    let provider = Arc::new(
        MockProvider::new(&["BADUSDT"]).fail_candles(
            "BADUSDT",
            vec![AcquisitionError::InvalidSymbol {
                symbol: "BADUSDT".into(),
            }],
        ),
    );
    let clock = clock();
    let report = scanner(config(1), &provider, &clock).run_cycle(None);

    assert_eq!(report.abstained, 1);
    assert_eq!(provider.calls("candles"), 1);
    assert_eq!(provider.calls("order_book"), 0);
    assert!(clock.sleeps().is_empty());
}

#[test]
fn rate_limit_is_retried_after_hint() {
    let provider = Arc::new(
        MockProvider {
            bid_size: 0.0,
            ..MockProvider::new(&["ETHUSDT"])
        }
        .fail_candles(
            "ETHUSDT",
            vec![AcquisitionError::RateLimited {
                retry_after_secs: 7,
            }],
        ),
    );
    let clock = clock();
    scanner(config(1), &provider, &clock).run_cycle(None);

    assert_eq!(provider.calls("candles"), 2);
    assert_eq!(clock.sleeps().first(), Some(&Duration::from_secs(7)));
}

#[test]
fn abstain_sleep_scales_with_abstained_instruments() {
    let provider = Arc::new(MockProvider {
        bid_size: 0.0,
        ..MockProvider::new(&["AUSDT", "BUSDT", "CUSDT"])
    });
    let clock = clock();
    let mut cfg = config(2);
    cfg.order_book.max_reacquire = 0;
    let summary = scanner(cfg, &provider, &clock).run(None).unwrap();

    assert_eq!(summary.abstained, 3);
    assert_eq!(summary.signals, 0);
    // One second per abstained instrument after cycle 1; cycle 2 is the last.
    assert_eq!(clock.total_slept(), Duration::from_secs(3 + 60));
}

// ── Emission ─────────────────────────────────────────────────────────

#[test]
fn emits_at_most_one_signal_per_cycle() {
    let provider = Arc::new(MockProvider::new(&["AUSDT", "BUSDT", "CUSDT"]));
    let clock = clock();
    let mut scan = scanner(permissive(2), &provider, &clock);

    let summary = scan.run(None).unwrap();

    assert_eq!(summary.cycles, 2);
    assert_eq!(summary.evaluated, 3);
    assert_eq!(summary.signals, 1);
    assert_eq!(summary.abstained, 2);
    let latest = scan.store().latest().unwrap().expect("one published signal");
    assert!(["AUSDT", "BUSDT", "CUSDT"].contains(&latest.symbol.as_str()));
    assert_eq!(latest.created_at, Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());
    assert!(latest.sentiment.is_some());
    // Long pause after a signal, then the cycle pause.
    assert_eq!(clock.total_slept(), Duration::from_secs(900 + 60));
}

#[test]
fn last_cycle_returns_without_pausing() {
    let provider = Arc::new(MockProvider::new(&["ETHUSDT"]));
    let clock = clock();
    let mut cfg = permissive(1);
    cfg.scan.memory_reset_cycles = 1;

    let summary = scanner(cfg, &provider, &clock).run(None).unwrap();

    assert_eq!(summary.signals, 1);
    assert_eq!(summary.memory_resets, 1);
    assert!(clock.sleeps().is_empty());
}

#[test]
fn parallel_workers_match_inline_evaluation() {
    let symbols = ["AUSDT", "BUSDT", "CUSDT", "DUSDT"];
    let run = |workers: usize| {
        let provider = Arc::new(MockProvider::new(&symbols));
        let clock = clock();
        let mut cfg = permissive(1);
        cfg.scan.sample_size = 4;
        cfg.scan.workers = workers;
        let mut scan = scanner(cfg, &provider, &clock);
        scan.run_cycle(None).signal
    };
    assert_eq!(run(1), run(4));
}

#[test]
fn published_signal_reaches_json_document() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("latest.json");
    let store = JsonFileStore::new(&path);
    store.ensure_exists().unwrap();
    assert!(store.latest().unwrap().is_none());

    let provider = Arc::new(MockProvider::new(&["ETHUSDT"]));
    let clock = clock();
    let mut scan = Scanner::new(
        permissive(1),
        provider.clone(),
        clock.clone(),
        Box::new(store.clone()),
    );
    scan.run(None).unwrap();

    let latest = store.latest().unwrap().expect("signal written");
    assert_eq!(latest.symbol, "ETHUSDT");
    assert!(!dir.path().join("latest.json.tmp").exists());
    assert_eq!(clock.now(), latest.created_at);
}
