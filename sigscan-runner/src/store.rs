//! Signal hand-off: `publish` from the orchestrator, `latest` for readers.
//!
//! - `JsonFileStore`: one latest-signal document, replaced atomically
//!   (write to .tmp, rename into place)
//! - `CsvHistoryStore`: append-only history, one row per signal
//! - `MemoryStore`: in-process, for tests and dry runs
//! - `TeeStore`: publish to two stores, read from the first

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use sigscan_core::domain::{CrossKind, Direction, SentimentLabel, Signal, SignalId};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed signal document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed signal history: {0}")]
    Csv(#[from] csv::Error),
}

pub trait SignalStore: Send {
    fn publish(&mut self, signal: &Signal) -> Result<(), StoreError>;

    /// `None` means no signal has been published yet.
    fn latest(&self) -> Result<Option<Signal>, StoreError>;
}

// ── Memory ───────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    signals: Vec<Signal>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> &[Signal] {
        &self.signals
    }
}

impl SignalStore for MemoryStore {
    fn publish(&mut self, signal: &Signal) -> Result<(), StoreError> {
        self.signals.push(signal.clone());
        Ok(())
    }

    fn latest(&self) -> Result<Option<Signal>, StoreError> {
        Ok(self.signals.last().cloned())
    }
}

// ── JSON document ────────────────────────────────────────────────────

#[derive(Serialize)]
struct Placeholder<'a> {
    signal: Option<()>,
    message: &'a str,
}

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the "no signal yet" placeholder, unless a document already exists.
    pub fn ensure_exists(&self) -> Result<(), StoreError> {
        if self.path.exists() {
            return Ok(());
        }
        let doc = serde_json::to_vec_pretty(&Placeholder {
            signal: None,
            message: "No signal available yet",
        })?;
        write_atomic(&self.path, &doc)
    }

    /// Parse a latest-signal document. Empty text and a `{"signal": null}`
    /// placeholder both mean no signal.
    pub fn parse(text: &str) -> Result<Option<Signal>, StoreError> {
        if text.trim().is_empty() {
            return Ok(None);
        }
        let value: serde_json::Value = serde_json::from_str(text)?;
        match value.get("signal") {
            Some(serde_json::Value::Null) => Ok(None),
            Some(inner) => Ok(Some(serde_json::from_value(inner.clone())?)),
            None => Ok(Some(serde_json::from_value(value)?)),
        }
    }
}

impl SignalStore for JsonFileStore {
    fn publish(&mut self, signal: &Signal) -> Result<(), StoreError> {
        let doc = serde_json::to_vec_pretty(signal)?;
        write_atomic(&self.path, &doc)
    }

    fn latest(&self) -> Result<Option<Signal>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Self::parse(&text),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Write to `<path>.tmp` then rename over `path`.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        StoreError::Io(e)
    })
}

// ── CSV history ──────────────────────────────────────────────────────

/// Flat CSV row form of a `Signal`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SignalRow {
    id: String,
    symbol: String,
    direction: Direction,
    entry1: f64,
    entry2: f64,
    stop_loss: f64,
    tp1: f64,
    tp2: f64,
    tp3: f64,
    tp4: f64,
    strength: f64,
    ema_cross: Option<CrossKind>,
    sentiment: Option<SentimentLabel>,
    created_at: DateTime<Utc>,
}

impl From<&Signal> for SignalRow {
    fn from(s: &Signal) -> Self {
        let [tp1, tp2, tp3, tp4] = s.take_profits;
        Self {
            id: s.id.0.clone(),
            symbol: s.symbol.clone(),
            direction: s.direction,
            entry1: s.entry1,
            entry2: s.entry2,
            stop_loss: s.stop_loss,
            tp1,
            tp2,
            tp3,
            tp4,
            strength: s.strength,
            ema_cross: s.ema_cross,
            sentiment: s.sentiment,
            created_at: s.created_at,
        }
    }
}

impl From<SignalRow> for Signal {
    fn from(r: SignalRow) -> Self {
        Signal {
            id: SignalId(r.id),
            symbol: r.symbol,
            direction: r.direction,
            entry1: r.entry1,
            entry2: r.entry2,
            stop_loss: r.stop_loss,
            take_profits: [r.tp1, r.tp2, r.tp3, r.tp4],
            strength: r.strength,
            ema_cross: r.ema_cross,
            sentiment: r.sentiment,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CsvHistoryStore {
    path: PathBuf,
}

impl CsvHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Every recorded signal, oldest first. A missing file is empty history.
    pub fn read_all(&self) -> Result<Vec<Signal>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(&self.path)?;
        reader
            .deserialize::<SignalRow>()
            .map(|row| Ok(Signal::from(row?)))
            .collect()
    }
}

impl SignalStore for CsvHistoryStore {
    /// Appends a row; a signal whose id matches the last row is skipped.
    fn publish(&mut self, signal: &Signal) -> Result<(), StoreError> {
        if self.latest()?.is_some_and(|last| last.id == signal.id) {
            return Ok(());
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let needs_header = fs::metadata(&self.path).map(|m| m.len() == 0).unwrap_or(true);
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        writer.serialize(SignalRow::from(signal))?;
        writer.flush()?;
        Ok(())
    }

    fn latest(&self) -> Result<Option<Signal>, StoreError> {
        Ok(self.read_all()?.pop())
    }
}

// ── Tee ──────────────────────────────────────────────────────────────

/// Publishes to both stores; `latest` reads the primary.
pub struct TeeStore {
    primary: Box<dyn SignalStore>,
    secondary: Box<dyn SignalStore>,
}

impl TeeStore {
    pub fn new(primary: Box<dyn SignalStore>, secondary: Box<dyn SignalStore>) -> Self {
        Self { primary, secondary }
    }
}

impl SignalStore for TeeStore {
    fn publish(&mut self, signal: &Signal) -> Result<(), StoreError> {
        self.primary.publish(signal)?;
        self.secondary.publish(signal)
    }

    fn latest(&self) -> Result<Option<Signal>, StoreError> {
        self.primary.latest()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sigscan_core::domain::SignalCandidate;

    fn signal(symbol: &str, minute: u32) -> Signal {
        let candidate = SignalCandidate {
            symbol: symbol.into(),
            direction: Direction::Long,
            entry1: 100.0,
            entry2: 98.0,
            stop_loss: 95.0,
            take_profits: [105.0, 110.0, 118.0, 124.0],
            strength: 82.0,
        };
        Signal::from_candidate(
            candidate,
            Some(CrossKind::Bullish),
            Some(SentimentLabel::Bearish),
            Utc.with_ymd_and_hms(2024, 6, 1, 12, minute, 0).unwrap(),
        )
    }

    #[test]
    fn memory_store_returns_last() {
        let mut store = MemoryStore::new();
        assert!(store.latest().unwrap().is_none());
        store.publish(&signal("A", 0)).unwrap();
        store.publish(&signal("B", 1)).unwrap();
        assert_eq!(store.latest().unwrap().unwrap().symbol, "B");
        assert_eq!(store.all().len(), 2);
    }

    #[test]
    fn placeholder_and_empty_mean_no_signal() {
        assert!(JsonFileStore::parse("").unwrap().is_none());
        assert!(JsonFileStore::parse("  \n").unwrap().is_none());
        assert!(JsonFileStore::parse(r#"{"signal": null}"#).unwrap().is_none());
        assert!(JsonFileStore::parse(r#"{"signal": null, "message": "No signal available yet"}"#)
            .unwrap()
            .is_none());
        assert!(JsonFileStore::parse("{not json").is_err());
    }

    #[test]
    fn wrapped_signal_document_is_accepted() {
        let s = signal("ETHUSDT", 0);
        let wrapped = format!(r#"{{"signal": {}}}"#, serde_json::to_string(&s).unwrap());
        assert_eq!(JsonFileStore::parse(&wrapped).unwrap(), Some(s));
    }
}
