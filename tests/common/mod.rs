#![allow(dead_code)]

use catalogue::{Database, PersistenceMode};
use chrono::{NaiveDate, NaiveDateTime};

/// Installs a test subscriber once; `RUST_LOG=debug` shows the generated SQL.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn database() -> Database {
    init_tracing();
    Database::new(PersistenceMode::InMemory).expect("in-memory database")
}

/// A timestamp on 2020-01-01 at the given hour.
pub fn at(hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2020, 1, 1)
        .and_then(|d| d.and_hms_opt(hour, 0, 0))
        .expect("valid timestamp")
}

pub fn uuids<'a>(events: impl IntoIterator<Item = &'a catalogue::Event>) -> Vec<String> {
    let mut uuids: Vec<String> = events.into_iter().map(|e| e.uuid().to_string()).collect();
    uuids.sort();
    uuids
}
