//! The scan loop.
//!
//! SELECT → FETCH → COMPUTE → EVALUATE → {EMIT | ABSTAIN} → SLEEP → SELECT
//!
//! Each cycle samples a handful of tradable instruments not yet seen in the
//! current super-cycle, evaluates them (optionally on a bounded rayon pool),
//! and publishes at most one signal: the strongest accepted candidate.
//! Per-instrument failures only ever abstain that instrument; the single
//! fatal condition is an exchange that cannot be reached at startup.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use sigscan_core::analysis::context::{sentiment, Sentiment, WaveOverlay};
use sigscan_core::analysis::order_book::check_significance;
use sigscan_core::analysis::{Evaluation, OrderBookConfig, Outcome, Pipeline};
use sigscan_core::data::{
    canonicalize_logged, AcquisitionError, BinanceProvider, CircuitBreaker, Interval,
    MarketDataProvider,
};
use sigscan_core::domain::{Candle, OrderBookSnapshot, Signal};
use sigscan_core::log_once::LogOnce;
use sigscan_core::market_cap::{CoinGeckoSource, MarketCapCache};
use sigscan_core::retry::RetryPolicy;
use sigscan_core::{Clock, DataError};

use crate::config::{ConfigError, ScanConfig, ScanSettings};
use crate::memory::ScanMemory;
use crate::store::{CsvHistoryStore, JsonFileStore, SignalStore, StoreError, TeeStore};

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("exchange unreachable: {0}")]
    ExchangeUnreachable(#[source] AcquisitionError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Why a single instrument was abstained.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InstrumentError {
    #[error("acquisition failed: {0}")]
    Acquisition(#[from] AcquisitionError),

    #[error(transparent)]
    Data(#[from] DataError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Select,
    Fetch,
    Compute,
    Evaluate,
    Emit,
    Abstain,
    Sleep,
}

/// Counters accumulated over a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub cycles: u64,
    pub evaluated: u64,
    pub abstained: u64,
    pub signals: u64,
    pub memory_resets: u64,
    pub cancelled: bool,
}

/// Result of one cycle.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub selected: Vec<String>,
    pub abstained: usize,
    pub signal: Option<Signal>,
}

/// Borrowed, `Sync` view of everything per-instrument work needs.
struct InstrumentContext<'a> {
    provider: &'a dyn MarketDataProvider,
    clock: &'a dyn Clock,
    pipeline: &'a Pipeline,
    retry: &'a RetryPolicy,
    scan: &'a ScanSettings,
    book: &'a OrderBookConfig,
}

impl InstrumentContext<'_> {
    fn evaluate(&self, symbol: &str) -> Result<Evaluation, InstrumentError> {
        debug!(symbol, phase = ?Phase::Fetch, "fetching instrument");
        let candles = self.retry.run(self.clock, symbol, |_| {
            self.provider
                .candles(symbol, self.scan.interval, self.scan.candle_limit)
        })?;
        let candles = canonicalize_logged(symbol, candles);
        let book = self.significant_book(symbol)?;

        debug!(symbol, phase = ?Phase::Compute, candles = candles.len(), "computing");
        Ok(self.pipeline.evaluate(symbol, &candles, &book)?)
    }

    /// Re-acquire the book until both sides clear the significance floor.
    fn significant_book(&self, symbol: &str) -> Result<OrderBookSnapshot, InstrumentError> {
        let mut attempt = 0;
        loop {
            let book = self
                .retry
                .run(self.clock, symbol, |_| self.provider.order_book(symbol, self.book.depth))?;
            match check_significance(&book, self.book.min_side_volume) {
                Ok(()) => return Ok(book),
                Err(e) if attempt >= self.book.max_reacquire => return Err(e.into()),
                Err(e) => {
                    attempt += 1;
                    debug!(symbol, attempt, error = %e, "re-acquiring order book");
                    self.clock.sleep(self.retry.delay_for(attempt));
                }
            }
        }
    }
}

pub struct Scanner {
    config: ScanConfig,
    pipeline: Pipeline,
    provider: Arc<dyn MarketDataProvider>,
    clock: Arc<dyn Clock>,
    market_cap: Option<MarketCapCache>,
    store: Box<dyn SignalStore>,
    memory: ScanMemory,
    log_once: LogOnce,
    rng: StdRng,
    pool: Option<rayon::ThreadPool>,
    phase: Phase,
    summary: ScanSummary,
}

impl Scanner {
    pub fn new(
        config: ScanConfig,
        provider: Arc<dyn MarketDataProvider>,
        clock: Arc<dyn Clock>,
        store: Box<dyn SignalStore>,
    ) -> Self {
        let rng = match config.scan.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let pool = if config.scan.workers > 1 {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(config.scan.workers)
                .build()
            {
                Ok(pool) => Some(pool),
                Err(e) => {
                    warn!(error = %e, "failed to build worker pool, evaluating inline");
                    None
                }
            }
        } else {
            None
        };
        Self {
            pipeline: Pipeline::new(config.pipeline()),
            memory: ScanMemory::new(config.scan.memory_reset_cycles),
            config,
            provider,
            clock,
            market_cap: None,
            store,
            log_once: LogOnce::new(),
            rng,
            pool,
            phase: Phase::Select,
            summary: ScanSummary::default(),
        }
    }

    /// Wire the Binance provider, the configured stores and (when enabled)
    /// the CoinGecko market-cap cache from a config.
    pub fn from_config(config: ScanConfig, clock: Arc<dyn Clock>) -> Result<Self, ScanError> {
        config.validate()?;
        let ex = &config.exchange;
        let timeout = Duration::from_secs(ex.timeout_secs);

        let breaker = Arc::new(CircuitBreaker::new(
            Duration::from_secs(ex.breaker_cooldown_secs),
            ex.breaker_failure_threshold,
            clock.clone(),
        ));
        let provider = BinanceProvider::new(&ex.base_url, timeout, breaker, clock.clone())
            .map_err(ScanError::ExchangeUnreachable)?;

        let latest = JsonFileStore::new(&config.store.latest_path);
        latest.ensure_exists()?;
        let store: Box<dyn SignalStore> = match &config.store.history_path {
            Some(path) => Box::new(TeeStore::new(
                Box::new(latest),
                Box::new(CsvHistoryStore::new(path)),
            )),
            None => Box::new(latest),
        };

        let market_cap = if ex.market_cap_enabled {
            match CoinGeckoSource::new(&ex.market_cap_base_url, timeout) {
                Ok(source) => Some(MarketCapCache::new(
                    Box::new(source),
                    clock.clone(),
                    Duration::from_secs(config.context.market_cap_ttl_secs),
                    config.retry.clone(),
                )),
                Err(e) => {
                    warn!(error = %e, "market cap source unavailable, using cap-free sentiment");
                    None
                }
            }
        } else {
            None
        };

        let mut scanner = Self::new(config, Arc::new(provider), clock, store);
        scanner.market_cap = market_cap;
        Ok(scanner)
    }

    pub fn with_market_cap(mut self, cache: MarketCapCache) -> Self {
        self.market_cap = Some(cache);
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn memory(&self) -> &ScanMemory {
        &self.memory
    }

    pub fn summary(&self) -> &ScanSummary {
        &self.summary
    }

    pub fn store(&self) -> &dyn SignalStore {
        self.store.as_ref()
    }

    /// Run until cancelled or `max_cycles` is reached.
    pub fn run(&mut self, cancel: Option<&AtomicBool>) -> Result<ScanSummary, ScanError> {
        let cancelled = || cancel.is_some_and(|f| f.load(Ordering::Relaxed));

        self.retry()
            .run(self.clock.as_ref(), "startup ping", |_| self.provider.ping())
            .map_err(|e| {
                error!(provider = self.provider.name(), error = %e, "exchange unreachable at startup");
                ScanError::ExchangeUnreachable(e)
            })?;
        info!(provider = self.provider.name(), "exchange reachable, scan starting");

        loop {
            if cancelled() {
                self.summary.cancelled = true;
                break;
            }
            if self.cycles_exhausted() {
                break;
            }

            let report = self.run_cycle(cancel);
            if cancelled() {
                self.summary.cancelled = true;
                break;
            }
            // No pause after the last allowed cycle.
            if self.cycles_exhausted() {
                self.close_cycle();
                break;
            }
            self.rest(&report, cancel);
        }

        info!(
            cycles = self.summary.cycles,
            evaluated = self.summary.evaluated,
            signals = self.summary.signals,
            "scan finished"
        );
        Ok(self.summary.clone())
    }

    /// One SELECT → EVALUATE → {EMIT | ABSTAIN} pass, without the sleeps.
    pub fn run_cycle(&mut self, cancel: Option<&AtomicBool>) -> CycleReport {
        self.summary.cycles += 1;
        let cycle = self.summary.cycles;

        self.phase = Phase::Select;
        let selected = self.select();
        info!(cycle, instruments = ?selected, "cycle started");

        self.phase = Phase::Fetch;
        let sentiment = self.benchmark_context();

        if cancel.is_some_and(|f| f.load(Ordering::Relaxed)) {
            return CycleReport {
                selected,
                ..CycleReport::default()
            };
        }

        let results = self.evaluate_all(&selected);

        self.phase = Phase::Evaluate;
        let mut abstained = 0;
        let mut best: Option<Evaluation> = None;
        for (symbol, result) in results {
            self.summary.evaluated += 1;
            match result {
                Ok(eval) => {
                    self.log_evaluation(&eval);
                    let strength = eval.accepted().map(|c| c.strength);
                    let best_strength = best
                        .as_ref()
                        .and_then(Evaluation::accepted)
                        .map(|c| c.strength);
                    match (strength, best_strength) {
                        (Some(s), Some(b)) if s > b => {
                            abstained += 1;
                            best = Some(eval);
                        }
                        (Some(_), None) => best = Some(eval),
                        _ => abstained += 1,
                    }
                }
                Err(InstrumentError::Data(e)) => {
                    abstained += 1;
                    self.log_once.info(&symbol, &format!("abstaining: {e}"));
                }
                Err(InstrumentError::Acquisition(e)) => {
                    abstained += 1;
                    self.log_once.warn(&symbol, &format!("acquisition failed: {e}"));
                }
            }
        }
        self.summary.abstained += abstained as u64;

        let signal = best.and_then(|eval| self.emit(eval, sentiment));
        if signal.is_none() {
            self.phase = Phase::Abstain;
            debug!(cycle, abstained, "no signal this cycle");
        }
        CycleReport {
            selected,
            abstained,
            signal,
        }
    }

    fn retry(&self) -> &RetryPolicy {
        &self.config.retry
    }

    fn select(&mut self) -> Vec<String> {
        let quote = &self.config.exchange.quote_asset;
        let listed = self
            .config
            .retry
            .run(self.clock.as_ref(), "tradable symbols", |_| {
                self.provider.tradable_symbols(quote)
            });
        match listed {
            Ok(symbols) => self
                .memory
                .sample(&symbols, self.config.scan.sample_size, &mut self.rng),
            Err(e) => {
                warn!(error = %e, "could not list tradable symbols");
                Vec::new()
            }
        }
    }

    /// Benchmark candles on each benchmark timeframe (advisory wave overlay)
    /// plus benchmark sentiment for signal annotation.
    fn benchmark_context(&self) -> Option<Sentiment> {
        let ctx = &self.config.context;
        let symbol = ctx.benchmark_symbol.as_str();

        for &interval in &self.config.scan.benchmark_intervals {
            match self.fetch_benchmark(symbol, interval) {
                Ok(candles) => match WaveOverlay::compute(&candles, ctx.cycle_length) {
                    Some(w) => debug!(
                        symbol,
                        %interval,
                        v_target = w.v_target,
                        e_target = w.e_target,
                        nt_target = w.nt_target,
                        "benchmark wave overlay"
                    ),
                    None => self
                        .log_once
                        .info(symbol, &format!("too few {interval} candles for wave overlay")),
                },
                Err(e) => warn!(symbol, %interval, error = %e, "benchmark candles unavailable"),
            }
        }

        let ticker = match self
            .retry()
            .run(self.clock.as_ref(), symbol, |_| self.provider.ticker(symbol))
        {
            Ok(t) => t,
            Err(e) => {
                warn!(symbol, error = %e, "benchmark ticker unavailable, signals carry no sentiment");
                return None;
            }
        };
        let cap = if self.config.exchange.market_cap_enabled {
            self.market_cap.as_ref().and_then(|c| c.get(&ctx.market_cap_id))
        } else {
            None
        };
        let s = sentiment(&ticker, cap);
        info!(symbol, label = %s.label, score = s.score, "benchmark sentiment");
        Some(s)
    }

    fn fetch_benchmark(
        &self,
        symbol: &str,
        interval: Interval,
    ) -> Result<Vec<Candle>, AcquisitionError> {
        let candles = self.retry().run(self.clock.as_ref(), symbol, |_| {
            self.provider
                .candles(symbol, interval, self.config.scan.candle_limit)
        })?;
        Ok(canonicalize_logged(symbol, candles))
    }

    fn evaluate_all(&self, symbols: &[String]) -> Vec<(String, Result<Evaluation, InstrumentError>)> {
        let ctx = InstrumentContext {
            provider: self.provider.as_ref(),
            clock: self.clock.as_ref(),
            pipeline: &self.pipeline,
            retry: &self.config.retry,
            scan: &self.config.scan,
            book: &self.config.order_book,
        };
        let run = |symbol: &String| (symbol.clone(), ctx.evaluate(symbol));
        match &self.pool {
            Some(tp) => tp.install(|| symbols.par_iter().map(run).collect()),
            None => symbols.iter().map(run).collect(),
        }
    }

    fn log_evaluation(&self, eval: &Evaluation) {
        let symbol = eval.symbol.as_str();
        if eval.unusual_volume {
            info!(symbol, "unusual volume");
        }
        match &eval.outcome {
            Outcome::Accepted(c) => info!(
                symbol,
                direction = %c.direction,
                strength = c.strength,
                bias = %eval.bias,
                "candidate accepted"
            ),
            Outcome::Rejected { candidate, reason } => self.log_once.info(
                symbol,
                &format!("{} candidate rejected: {reason}", candidate.direction),
            ),
            Outcome::NoEntry => self.log_once.info(symbol, "no entry above threshold"),
        }
    }

    fn emit(&mut self, eval: Evaluation, sentiment: Option<Sentiment>) -> Option<Signal> {
        self.phase = Phase::Emit;
        let Outcome::Accepted(candidate) = eval.outcome else {
            return None;
        };
        let signal = Signal::from_candidate(
            candidate,
            eval.ema_cross,
            sentiment.map(|s| s.label),
            self.clock.now(),
        );
        match self.store.publish(&signal) {
            Ok(()) => {
                self.summary.signals += 1;
                info!(
                    id = %signal.id,
                    symbol = %signal.symbol,
                    direction = %signal.direction,
                    entry1 = signal.entry1,
                    stop_loss = signal.stop_loss,
                    strength = signal.strength,
                    "signal published"
                );
                Some(signal)
            }
            Err(e) => {
                error!(symbol = %signal.symbol, error = %e, "failed to publish signal");
                None
            }
        }
    }

    /// EMIT/ABSTAIN pause, then the cycle pause, then memory upkeep.
    fn rest(&mut self, report: &CycleReport, cancel: Option<&AtomicBool>) {
        self.phase = Phase::Sleep;
        let scan = &self.config.scan;
        let pause = if report.signal.is_some() {
            Duration::from_secs(scan.signal_sleep_secs)
        } else {
            Duration::from_secs(scan.abstain_sleep_secs * report.abstained as u64)
        };
        let cycle_pause = Duration::from_secs(scan.cycle_sleep_secs);
        if !sleep_cancellable(self.clock.as_ref(), pause, cancel)
            || !sleep_cancellable(self.clock.as_ref(), cycle_pause, cancel)
        {
            return;
        }
        self.close_cycle();
    }

    fn cycles_exhausted(&self) -> bool {
        self.config
            .scan
            .max_cycles
            .is_some_and(|max| self.summary.cycles >= max)
    }

    fn close_cycle(&mut self) {
        if self.memory.end_cycle() {
            self.summary.memory_resets += 1;
            self.log_once.clear();
            info!("scan memory reset");
        }
    }
}

/// Sleep in slices of at most one second. Returns false if cancelled.
pub fn sleep_cancellable(clock: &dyn Clock, total: Duration, cancel: Option<&AtomicBool>) -> bool {
    let slice = Duration::from_secs(1);
    let mut remaining = total;
    while !remaining.is_zero() {
        if cancel.is_some_and(|f| f.load(Ordering::Relaxed)) {
            return false;
        }
        let step = remaining.min(slice);
        clock.sleep(step);
        remaining -= step;
    }
    !cancel.is_some_and(|f| f.load(Ordering::Relaxed))
}
