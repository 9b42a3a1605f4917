//! Serializable scanner configuration.
//!
//! Every field has a default, so an empty TOML file is a valid config and
//! `sigscan config` prints the full set of knobs.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use sigscan_core::analysis::{
    ContextConfig, EntryConfig, OrderBookConfig, PipelineConfig, RiskConfig, ValidatorConfig,
    VolumeProfileConfig,
};
use sigscan_core::data::{Interval, DEFAULT_BASE_URL};
use sigscan_core::indicators::IndicatorConfig;
use sigscan_core::market_cap::COINGECKO_BASE_URL;
use sigscan_core::retry::RetryPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    pub base_url: String,
    /// Per-request deadline.
    pub timeout_secs: u64,
    /// Instruments are tradable when their symbol ends with this.
    pub quote_asset: String,
    pub breaker_cooldown_secs: u64,
    pub breaker_failure_threshold: u32,
    pub market_cap_base_url: String,
    /// Disable to skip market-cap lookups entirely.
    pub market_cap_enabled: bool,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            timeout_secs: 10,
            quote_asset: "USDT".into(),
            breaker_cooldown_secs: 30 * 60,
            breaker_failure_threshold: 3,
            market_cap_base_url: COINGECKO_BASE_URL.into(),
            market_cap_enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    /// Candle interval of scanned instruments.
    pub interval: Interval,
    pub candle_limit: usize,
    /// Benchmark timeframes fetched once per cycle.
    pub benchmark_intervals: Vec<Interval>,
    /// Instruments evaluated per cycle.
    pub sample_size: usize,
    pub signal_sleep_secs: u64,
    /// Pause per abstained instrument.
    pub abstain_sleep_secs: u64,
    pub cycle_sleep_secs: u64,
    /// Scan memory clears every this many cycles.
    pub memory_reset_cycles: u32,
    /// Worker threads for per-instrument evaluation; 1 runs inline.
    pub workers: usize,
    pub max_cycles: Option<u64>,
    /// Fixed seed for reproducible instrument sampling.
    pub seed: Option<u64>,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            interval: Interval::H1,
            candle_limit: 500,
            benchmark_intervals: vec![Interval::H1, Interval::D1],
            sample_size: 5,
            signal_sleep_secs: 900,
            abstain_sleep_secs: 1,
            cycle_sleep_secs: 60,
            memory_reset_cycles: 10,
            workers: 1,
            max_cycles: None,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Latest-signal JSON document.
    pub latest_path: PathBuf,
    /// Append-only CSV history; omitted to disable.
    pub history_path: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            latest_path: PathBuf::from("signals/latest.json"),
            history_path: Some(PathBuf::from("signals/history.csv")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub exchange: ExchangeConfig,
    pub scan: ScanSettings,
    pub retry: RetryPolicy,
    pub indicators: IndicatorConfig,
    pub order_book: OrderBookConfig,
    pub volume_profile: VolumeProfileConfig,
    pub entry: EntryConfig,
    pub risk: RiskConfig,
    pub validator: ValidatorConfig,
    pub context: ContextConfig,
    pub store: StoreConfig,
}

impl ScanConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));
        if self.scan.sample_size == 0 {
            return invalid("scan.sample_size must be at least 1".into());
        }
        if self.scan.workers == 0 {
            return invalid("scan.workers must be at least 1".into());
        }
        if self.scan.candle_limit < self.indicators.min_candles {
            return invalid(format!(
                "scan.candle_limit ({}) is below indicators.min_candles ({})",
                self.scan.candle_limit, self.indicators.min_candles
            ));
        }
        self.indicators.validate().map_err(ConfigError::Invalid)?;
        if self.retry.max_attempts == 0 {
            return invalid("retry.max_attempts must be at least 1".into());
        }
        if self.volume_profile.bins == 0 {
            return invalid("volume_profile.bins must be at least 1".into());
        }
        if self.exchange.quote_asset.is_empty() {
            return invalid("exchange.quote_asset must not be empty".into());
        }
        Ok(())
    }

    /// The computation-stage subset handed to the pipeline.
    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            indicators: self.indicators.clone(),
            order_book: self.order_book.clone(),
            volume_profile: self.volume_profile.clone(),
            entry: self.entry.clone(),
            risk: self.risk.clone(),
            validator: self.validator.clone(),
            context: self.context.clone(),
        }
    }
}
