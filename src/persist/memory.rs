//! In-memory persistence sink, used by tests and dry runs.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::NaiveDateTime;

use crate::tables::SensorRow;

use super::{PersistError, PersistenceSink};

/// Map-backed store with true upsert semantics. The record map can be
/// shared so a test keeps a handle after boxing the store.
pub struct MemoryStore {
    records: Arc<Mutex<BTreeMap<(NaiveDateTime, String), f64>>>,
    fail_with: Option<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::shared(Arc::new(Mutex::new(BTreeMap::new())))
    }

    /// Builds a store over an externally held record map.
    pub fn shared(records: Arc<Mutex<BTreeMap<(NaiveDateTime, String), f64>>>) -> Self {
        Self {
            records,
            fail_with: None,
        }
    }

    /// Makes every subsequent persist call fail with `message`.
    pub fn fail_with(&mut self, message: &str) {
        self.fail_with = Some(message.to_string());
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stored value for one (timestamp, entity) key.
    pub fn get(&self, timestamp: NaiveDateTime, entity: &str) -> Option<f64> {
        self.records
            .lock()
            .ok()
            .and_then(|r| r.get(&(timestamp, entity.to_string())).copied())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PersistenceSink for MemoryStore {
    fn persist(&mut self, timestamp: NaiveDateTime, rows: &[SensorRow]) -> Result<(), PersistError> {
        if let Some(message) = &self.fail_with {
            return Err(PersistError::Write(message.clone()));
        }
        let mut records = self
            .records
            .lock()
            .map_err(|_| PersistError::Write("record map poisoned".into()))?;
        for row in rows {
            records.insert((timestamp, row.persist_key.clone()), row.value);
        }
        Ok(())
    }
}
