//! CSV journal store.
//!
//! Durable long-format records (`timestamp,twin_id,entity,value`), one
//! row per sensor per flushed timestep. The journal is append-only on
//! disk; upsert semantics live in the in-memory key map, and a replayed
//! (entity, timestamp) pair is appended again with last-write-wins
//! meaning on read-back. Duplicate timestamps therefore never fail.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::Deserialize;

use crate::tables::SensorRow;

use super::{PersistError, PersistenceSink};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub struct CsvStore {
    path: PathBuf,
    twin_id: String,
    keys: BTreeMap<(NaiveDateTime, String), f64>,
}

#[derive(Debug, Deserialize)]
struct JournalRecord {
    timestamp: String,
    #[expect(dead_code)]
    twin_id: String,
    entity: String,
    value: f64,
}

impl CsvStore {
    /// Opens (or creates) the journal at `path`. An existing journal is
    /// replayed into the key map so upserts keep working across restarts.
    pub fn open(path: &Path, twin_id: &str) -> Result<Self, PersistError> {
        let mut keys = BTreeMap::new();
        if path.exists() {
            let file = std::fs::File::open(path).map_err(|e| PersistError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;
            let mut reader = csv::Reader::from_reader(file);
            for record in reader.deserialize::<JournalRecord>() {
                let rec = record.map_err(|e| PersistError::Write(e.to_string()))?;
                if let Ok(ts) = NaiveDateTime::parse_from_str(&rec.timestamp, TIMESTAMP_FORMAT) {
                    // Later journal rows win, matching append order.
                    keys.insert((ts, rec.entity), rec.value);
                }
            }
        } else {
            let mut file = std::fs::File::create(path).map_err(|e| PersistError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;
            writeln!(file, "timestamp,twin_id,entity,value").map_err(|e| PersistError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;
        }
        Ok(Self {
            path: path.to_path_buf(),
            twin_id: twin_id.to_string(),
            keys,
        })
    }

    /// Number of distinct (timestamp, entity) keys stored.
    pub fn record_count(&self) -> usize {
        self.keys.len()
    }

    /// Stored value for one (timestamp, entity) key.
    pub fn get(&self, timestamp: NaiveDateTime, entity: &str) -> Option<f64> {
        self.keys.get(&(timestamp, entity.to_string())).copied()
    }
}

impl PersistenceSink for CsvStore {
    fn persist(&mut self, timestamp: NaiveDateTime, rows: &[SensorRow]) -> Result<(), PersistError> {
        let file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| PersistError::Io {
                path: self.path.clone(),
                source: e,
            })?;
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        for row in rows {
            writer
                .write_record(&[
                    timestamp.format(TIMESTAMP_FORMAT).to_string(),
                    self.twin_id.clone(),
                    row.persist_key.clone(),
                    row.value.to_string(),
                ])
                .map_err(|e| PersistError::Write(e.to_string()))?;
            self.keys
                .insert((timestamp, row.persist_key.clone()), row.value);
        }
        writer.flush().map_err(|e| PersistError::Io {
            path: self.path.clone(),
            source: e,
        })?;
        Ok(())
    }
}
