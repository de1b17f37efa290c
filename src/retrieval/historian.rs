//! Historian replay agent.
//!
//! Reads a long-format CSV export of a plant historian
//! (`timestamp,tag,value` rows) into memory and serves point-in-time
//! lookups against it. A lookup takes the latest sample at or before the
//! requested timepoint within a bounded age; a miss is retried once with
//! a widened window before the stale previous value is kept. A tag with
//! no samples at all is reported permanently invalid.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDateTime};
use log::{error, warn};
use serde::Deserialize;
use thiserror::Error;

use crate::tables::{SignalRow, SignalValue};

use super::RetrievalAgent;

/// Source kind served by this agent.
pub const SOURCE_KIND: &str = "historian";

/// Timestamp format of historian exports.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Samples no older than this count as fresh on the first attempt.
const FRESH_WINDOW_MINUTES: i64 = 15;

/// Widened window for the single retry.
const RETRY_WINDOW_MINUTES: i64 = 120;

/// Errors raised while loading the historian export.
#[derive(Debug, Error)]
pub enum HistorianError {
    #[error("cannot read historian file \"{path}\": {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("historian file \"{path}\": {source}")]
    Csv { path: PathBuf, source: csv::Error },
    #[error("historian file \"{path}\" row {row}: bad timestamp \"{value}\"")]
    Timestamp {
        path: PathBuf,
        row: usize,
        value: String,
    },
}

#[derive(Debug, Deserialize)]
struct HistorianRecord {
    timestamp: String,
    tag: String,
    value: f64,
}

/// In-memory time series per tag.
pub struct HistorianAgent {
    series: BTreeMap<String, BTreeMap<NaiveDateTime, f64>>,
}

impl HistorianAgent {
    /// Loads the historian export from `path`.
    pub fn from_csv(path: &Path) -> Result<Self, HistorianError> {
        let file = std::fs::File::open(path).map_err(|e| HistorianError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut reader = csv::Reader::from_reader(file);
        let mut series: BTreeMap<String, BTreeMap<NaiveDateTime, f64>> = BTreeMap::new();
        for (i, record) in reader.deserialize::<HistorianRecord>().enumerate() {
            let rec = record.map_err(|e| HistorianError::Csv {
                path: path.to_path_buf(),
                source: e,
            })?;
            let ts = NaiveDateTime::parse_from_str(&rec.timestamp, TIMESTAMP_FORMAT).map_err(
                |_| HistorianError::Timestamp {
                    path: path.to_path_buf(),
                    row: i + 1,
                    value: rec.timestamp.clone(),
                },
            )?;
            series.entry(rec.tag).or_default().insert(ts, rec.value);
        }
        Ok(Self { series })
    }

    /// Latest sample for `tag` at or before `timepoint`, no older than
    /// `window`.
    fn sample_before(&self, tag: &str, timepoint: NaiveDateTime, window: Duration) -> Option<f64> {
        let points = self.series.get(tag)?;
        let (ts, value) = points.range(..=timepoint).next_back()?;
        (timepoint - *ts <= window).then_some(*value)
    }
}

impl RetrievalAgent for HistorianAgent {
    fn kind(&self) -> &str {
        SOURCE_KIND
    }

    fn refresh(&mut self, signals: &mut [SignalRow], timepoint: NaiveDateTime) {
        for row in signals.iter_mut().filter(|r| r.source == SOURCE_KIND) {
            if !self.series.contains_key(&row.tag) {
                // The historian has never heard of this tag; it will not
                // appear later in a static export.
                error!("historian has no series for tag \"{}\"", row.tag);
                row.value = SignalValue::Invalid;
                continue;
            }
            if let Some(v) =
                self.sample_before(&row.tag, timepoint, Duration::minutes(FRESH_WINDOW_MINUTES))
            {
                row.value = SignalValue::Number(v);
                continue;
            }
            warn!(
                "no fresh sample for tag \"{}\" at {timepoint}, widening window",
                row.tag
            );
            if let Some(v) =
                self.sample_before(&row.tag, timepoint, Duration::minutes(RETRY_WINDOW_MINUTES))
            {
                row.value = SignalValue::Number(v);
            } else {
                warn!(
                    "tag \"{}\" has no usable sample at {timepoint}; keeping last value",
                    row.tag
                );
            }
        }
    }
}
