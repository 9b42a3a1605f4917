//! Signal stores on disk.

use chrono::{TimeZone, Utc};
use sigscan_core::domain::{CrossKind, Direction, SentimentLabel, Signal, SignalCandidate};
use sigscan_runner::{CsvHistoryStore, JsonFileStore, MemoryStore, SignalStore, TeeStore};

fn signal(symbol: &str, minute: u32, direction: Direction) -> Signal {
    let (entry1, entry2, stop_loss, take_profits) = match direction {
        Direction::Long => (100.0, 98.0, 95.0, [105.0, 110.0, 118.0, 124.0]),
        Direction::Short => (100.0, 102.0, 105.0, [95.0, 90.0, 82.0, 76.0]),
    };
    Signal::from_candidate(
        SignalCandidate {
            symbol: symbol.into(),
            direction,
            entry1,
            entry2,
            stop_loss,
            take_profits,
            strength: 82.0,
        },
        if minute % 2 == 0 { Some(CrossKind::Bullish) } else { None },
        Some(SentimentLabel::Neutral),
        Utc.with_ymd_and_hms(2024, 6, 1, 9, minute, 0).unwrap(),
    )
}

// ── JSON document ────────────────────────────────────────────────────

#[test]
fn missing_file_means_no_signal() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path().join("absent.json"));
    assert!(store.latest().unwrap().is_none());
}

#[test]
fn placeholder_is_written_once_and_reads_as_none() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested/latest.json");
    let mut store = JsonFileStore::new(&path);

    store.ensure_exists().unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert!(doc["signal"].is_null());
    assert_eq!(doc["message"], "No signal available yet");
    assert!(store.latest().unwrap().is_none());

    let s = signal("ETHUSDT", 0, Direction::Long);
    store.publish(&s).unwrap();
    // An existing document is never replaced by the placeholder.
    store.ensure_exists().unwrap();
    assert_eq!(store.latest().unwrap(), Some(s));
}

#[test]
fn publish_replaces_previous_document() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("latest.json");
    let mut store = JsonFileStore::new(&path);

    store.publish(&signal("ETHUSDT", 0, Direction::Long)).unwrap();
    store.publish(&signal("SOLUSDT", 1, Direction::Short)).unwrap();

    let latest = store.latest().unwrap().unwrap();
    assert_eq!(latest.symbol, "SOLUSDT");
    assert_eq!(latest.direction, Direction::Short);
    assert!(!dir.path().join("latest.json.tmp").exists());
}

#[test]
fn empty_and_corrupt_documents() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("latest.json");

    std::fs::write(&path, "").unwrap();
    assert!(JsonFileStore::new(&path).latest().unwrap().is_none());

    std::fs::write(&path, "{\"signal\": ").unwrap();
    assert!(JsonFileStore::new(&path).latest().is_err());
}

// ── CSV history ──────────────────────────────────────────────────────

#[test]
fn history_appends_with_single_header() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.csv");
    let mut store = CsvHistoryStore::new(&path);

    let signals = [
        signal("ETHUSDT", 0, Direction::Long),
        signal("SOLUSDT", 1, Direction::Short),
        signal("XRPUSDT", 2, Direction::Long),
    ];
    for s in &signals {
        store.publish(s).unwrap();
    }

    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(text.lines().filter(|l| l.starts_with("id,")).count(), 1);
    assert_eq!(store.read_all().unwrap(), signals.to_vec());
    assert_eq!(store.latest().unwrap().unwrap().symbol, "XRPUSDT");

    // A fresh handle on the same file sees the same history.
    assert_eq!(CsvHistoryStore::new(&path).read_all().unwrap().len(), 3);
}

#[test]
fn history_skips_repeat_of_last_signal() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = CsvHistoryStore::new(dir.path().join("history.csv"));
    let s = signal("ETHUSDT", 0, Direction::Long);

    store.publish(&s).unwrap();
    store.publish(&s).unwrap();

    assert_eq!(store.read_all().unwrap().len(), 1);
}

#[test]
fn history_keeps_absent_cross() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = CsvHistoryStore::new(dir.path().join("history.csv"));
    let s = signal("ETHUSDT", 1, Direction::Long);
    assert!(s.ema_cross.is_none());

    store.publish(&s).unwrap();

    assert_eq!(store.latest().unwrap(), Some(s));
}

// ── Tee ──────────────────────────────────────────────────────────────

#[test]
fn tee_writes_both_and_reads_primary() {
    let dir = tempfile::tempdir().unwrap();
    let json = JsonFileStore::new(dir.path().join("latest.json"));
    let csv = CsvHistoryStore::new(dir.path().join("history.csv"));
    let mut tee = TeeStore::new(Box::new(json.clone()), Box::new(csv.clone()));

    tee.publish(&signal("ETHUSDT", 0, Direction::Long)).unwrap();
    tee.publish(&signal("SOLUSDT", 1, Direction::Short)).unwrap();

    assert_eq!(tee.latest().unwrap().unwrap().symbol, "SOLUSDT");
    assert_eq!(json.latest().unwrap().unwrap().symbol, "SOLUSDT");
    assert_eq!(csv.read_all().unwrap().len(), 2);
}

#[test]
fn memory_store_is_last_write_wins() {
    let mut store = MemoryStore::new();
    store.publish(&signal("ETHUSDT", 0, Direction::Long)).unwrap();
    store.publish(&signal("SOLUSDT", 1, Direction::Short)).unwrap();
    assert_eq!(store.latest().unwrap().unwrap().symbol, "SOLUSDT");
}
