//! Durable persistence and live handoff of collected sensor values.
//!
//! [`PersistencePublisher::flush`] runs once per timestep at the terminal
//! hook. Nothing is stored or published for timestamps before the data
//! collection start: the engine runs warmup days the twin deliberately
//! discards. Downstream failures are logged and skipped; a dead store
//! never takes the simulation down with it.

pub mod csv_store;
pub mod memory;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDateTime;
use log::error;
use thiserror::Error;

use crate::publish::{SensorSnapshot, SnapshotBoard};
use crate::tables::SensorRow;

/// Errors from a durable store write.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("store I/O on \"{path}\": {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("store write failed: {0}")]
    Write(String),
}

/// A durable store of (entity, timestamp, value) records.
///
/// `persist` must upsert by (entity, timestamp): replaying a timestep the
/// store has already seen replaces the old record rather than failing.
pub trait PersistenceSink {
    fn persist(&mut self, timestamp: NaiveDateTime, rows: &[SensorRow]) -> Result<(), PersistError>;
}

/// Fans a timestep's sensor snapshot out to the durable store and the
/// live board, gated by the data-collection start date.
pub struct PersistencePublisher {
    data_start: NaiveDateTime,
    sink: Box<dyn PersistenceSink>,
    board: Option<Arc<SnapshotBoard>>,
}

impl PersistencePublisher {
    pub fn new(
        data_start: NaiveDateTime,
        sink: Box<dyn PersistenceSink>,
        board: Option<Arc<SnapshotBoard>>,
    ) -> Self {
        Self {
            data_start,
            sink,
            board,
        }
    }

    /// Persists and hands off one timestep's sensor values.
    ///
    /// A no-op for timestamps strictly before the data collection start.
    /// Store failures are logged and do not propagate; the live handoff
    /// still happens so the board is never starved by a dead store.
    pub fn flush(&mut self, timestamp: NaiveDateTime, sensors: &[SensorRow]) {
        if timestamp < self.data_start {
            return;
        }
        if let Err(e) = self.sink.persist(timestamp, sensors) {
            error!("persistence failed for {timestamp}: {e}");
        }
        if let Some(board) = &self.board {
            board.update(Arc::new(SensorSnapshot::from_rows(timestamp, sensors)));
        }
    }
}
