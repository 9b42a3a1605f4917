//! SigScan CLI: scan, latest and config commands.
//!
//! Commands:
//! - `scan`: run the scan loop against the exchange from a TOML config
//! - `latest`: print the most recently published signal
//! - `config`: print the default configuration as TOML

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sigscan_core::SystemClock;
use sigscan_runner::{CsvHistoryStore, JsonFileStore, ScanConfig, Scanner, SignalStore};

#[derive(Parser)]
#[command(name = "sigscan", about = "SigScan: market-signal generation engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scan loop.
    Scan {
        /// Path to a TOML config file. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Stop after this many cycles (overrides the config).
        #[arg(long)]
        max_cycles: Option<u64>,

        /// Seed for reproducible instrument sampling (overrides the config).
        #[arg(long)]
        seed: Option<u64>,

        /// Worker threads for per-instrument evaluation (overrides the config).
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Print the latest published signal as JSON.
    Latest {
        /// Latest-signal JSON document, or a `.csv` history file.
        #[arg(long, default_value = "signals/latest.json")]
        store: PathBuf,
    },
    /// Print the default configuration as TOML.
    Config,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scan {
            config,
            max_cycles,
            seed,
            workers,
        } => run_scan(config.as_deref(), max_cycles, seed, workers),
        Commands::Latest { store } => run_latest(&store),
        Commands::Config => {
            print!("{}", ScanConfig::default().to_toml()?);
            Ok(())
        }
    }
}

fn run_scan(
    config_path: Option<&Path>,
    max_cycles: Option<u64>,
    seed: Option<u64>,
    workers: Option<usize>,
) -> Result<()> {
    let mut config = match config_path {
        Some(path) => ScanConfig::from_file(path)?,
        None => ScanConfig::default(),
    };
    if max_cycles.is_some() {
        config.scan.max_cycles = max_cycles;
    }
    if seed.is_some() {
        config.scan.seed = seed;
    }
    if let Some(n) = workers {
        config.scan.workers = n;
    }

    let mut scanner = Scanner::from_config(config, Arc::new(SystemClock))
        .context("failed to set up scanner")?;
    let summary = scanner.run(None)?;

    info!(
        cycles = summary.cycles,
        evaluated = summary.evaluated,
        abstained = summary.abstained,
        signals = summary.signals,
        "done"
    );
    Ok(())
}

fn run_latest(path: &Path) -> Result<()> {
    let latest = if path.extension().is_some_and(|ext| ext == "csv") {
        CsvHistoryStore::new(path).latest()
    } else {
        JsonFileStore::new(path).latest()
    }
    .with_context(|| format!("failed to read {}", path.display()))?;

    match latest {
        Some(signal) => println!("{}", serde_json::to_string_pretty(&signal)?),
        None => println!("No signal available yet"),
    }
    Ok(())
}
