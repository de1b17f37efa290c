//! Live republication of collected sensor values.
//!
//! The engine callback thread never publishes directly. At each flushed
//! timestep it swaps a complete [`SensorSnapshot`] into the
//! [`SnapshotBoard`] and marks it dirty; an independent [`PublishLoop`]
//! thread wakes on a fixed interval and, when dirty, republishes the
//! whole snapshot through a [`LivePublisher`]. Readers therefore observe
//! either the previous table or the new one, never a half-updated mix.

#[cfg(feature = "api")]
pub mod http;

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::NaiveDateTime;
use crossbeam_channel::{Receiver, Sender, bounded, select, tick};
use log::{error, info, warn};
use thiserror::Error;

use crate::tables::SensorRow;

/// One published tag value.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorSample {
    pub tag: String,
    pub value: f64,
}

/// An immutable copy of the sensor table taken at one flushed timestep.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorSnapshot {
    /// Canonical simulated timestamp of the flush.
    pub taken_at: NaiveDateTime,
    pub samples: Vec<SensorSample>,
}

impl SensorSnapshot {
    /// Copies the publishable rows (those carrying a publish tag) out of
    /// the live sensor table.
    pub fn from_rows(taken_at: NaiveDateTime, rows: &[SensorRow]) -> Self {
        let samples = rows
            .iter()
            .filter_map(|r| {
                r.publish_tag.as_ref().map(|tag| SensorSample {
                    tag: tag.clone(),
                    value: r.value,
                })
            })
            .collect();
        Self { taken_at, samples }
    }
}

/// Handoff point between the callback thread and the publish loop.
///
/// The whole snapshot is swapped behind one lock; per-sample updates are
/// deliberately impossible.
#[derive(Debug, Default)]
pub struct SnapshotBoard {
    inner: Mutex<BoardInner>,
}

#[derive(Debug, Default)]
struct BoardInner {
    latest: Option<Arc<SensorSnapshot>>,
    dirty: bool,
}

impl SnapshotBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes a new snapshot reference and marks the board dirty.
    /// Non-blocking apart from the swap itself.
    pub fn update(&self, snapshot: Arc<SensorSnapshot>) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.latest = Some(snapshot);
            inner.dirty = true;
        }
    }

    /// Takes the latest snapshot if the board is dirty, clearing the flag.
    pub fn take_dirty(&self) -> Option<Arc<SensorSnapshot>> {
        let mut inner = self.inner.lock().ok()?;
        if !inner.dirty {
            return None;
        }
        inner.dirty = false;
        inner.latest.clone()
    }

    /// The most recently updated snapshot, dirty or not.
    pub fn latest(&self) -> Option<Arc<SensorSnapshot>> {
        self.inner.lock().ok().and_then(|inner| inner.latest.clone())
    }
}

/// Error from one publish attempt. Publish failures never abort the
/// simulation; the loop logs and waits for the next tick.
#[derive(Debug, Error)]
#[error("publish failed: {0}")]
pub struct PublishError(pub String);

/// Destination of republished snapshots.
pub trait LivePublisher: Send {
    fn publish(&mut self, snapshot: &SensorSnapshot) -> Result<(), PublishError>;
}

/// The live tag/value surface external clients read from and — for tags
/// declared writable — write to. This is the in-process analog of a
/// protocol server's address space.
#[derive(Debug, Default)]
pub struct TagBoard {
    values: Mutex<HashMap<String, f64>>,
}

impl TagBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of `tag`, if any side has written it.
    pub fn read(&self, tag: &str) -> Option<f64> {
        self.values.lock().ok().and_then(|v| v.get(tag).copied())
    }

    /// Writes a tag value. Used by the publish loop for twin-owned tags
    /// and by external clients for writable tags.
    pub fn write(&self, tag: &str, value: f64) {
        if let Ok(mut values) = self.values.lock() {
            values.insert(tag.to_string(), value);
        }
    }

    /// Snapshot of every tag currently on the board.
    pub fn all(&self) -> Vec<(String, f64)> {
        self.values
            .lock()
            .map(|v| v.iter().map(|(k, val)| (k.clone(), *val)).collect())
            .unwrap_or_default()
    }
}

/// Publishes snapshots onto a [`TagBoard`], skipping shadowed tags.
///
/// Shadowed tags are the externally-writable ones: operator-set values
/// must never be overwritten by twin data, even when a sensor row shares
/// the tag name.
pub struct TagBoardPublisher {
    board: Arc<TagBoard>,
    shadowed: HashSet<String>,
}

impl TagBoardPublisher {
    pub fn new(board: Arc<TagBoard>, writable_tags: &[String]) -> Self {
        Self {
            board,
            shadowed: writable_tags.iter().cloned().collect(),
        }
    }
}

impl LivePublisher for TagBoardPublisher {
    fn publish(&mut self, snapshot: &SensorSnapshot) -> Result<(), PublishError> {
        for sample in &snapshot.samples {
            if self.shadowed.contains(&sample.tag) {
                continue;
            }
            self.board.write(&sample.tag, sample.value);
        }
        Ok(())
    }
}

/// The independent periodic consumer of the snapshot board.
pub struct PublishLoop {
    handle: Option<JoinHandle<()>>,
    shutdown: Sender<()>,
}

impl PublishLoop {
    /// Spawns the loop thread. Each `interval`, if the board is dirty,
    /// the latest snapshot is republished; errors inside a tick are
    /// logged and the loop continues.
    pub fn spawn(
        board: Arc<SnapshotBoard>,
        mut publisher: Box<dyn LivePublisher>,
        interval: Duration,
    ) -> Self {
        let (shutdown_tx, shutdown_rx): (Sender<()>, Receiver<()>) = bounded(1);
        let handle = std::thread::spawn(move || {
            let ticker = tick(interval);
            info!("publish loop started, interval {interval:?}");
            loop {
                select! {
                    recv(shutdown_rx) -> _ => break,
                    recv(ticker) -> _ => {
                        if let Some(snapshot) = board.take_dirty()
                            && let Err(e) = publisher.publish(&snapshot)
                        {
                            error!("publish tick failed: {e}");
                        }
                    }
                }
            }
            info!("publish loop stopped");
        });
        Self {
            handle: Some(handle),
            shutdown: shutdown_tx,
        }
    }

    /// Signals the loop to exit and joins the thread.
    pub fn shutdown(mut self) {
        self.signal_and_join();
    }

    fn signal_and_join(&mut self) {
        let _ = self.shutdown.try_send(());
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            warn!("publish loop panicked before shutdown");
        }
    }
}

impl Drop for PublishLoop {
    fn drop(&mut self) {
        self.signal_and_join();
    }
}
