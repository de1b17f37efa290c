//! Row tables tying live-building signals to simulation variables.
//!
//! Three tables drive the run: signals (real-world values fed in),
//! sensors (simulated values read back out), and actuators (simulation
//! settings overridden from signals). A fourth table stages user
//! extensions. All are loaded once from CSV before the run and mutated in
//! place for its duration; the orchestrator is the only writer of `value`
//! and `handle` fields.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::config::TablesConfig;
use crate::sim::api::{Hook, UNRESOLVED_HANDLE};

/// Current value of a signal row.
///
/// `Unset` means no retrieval has succeeded yet; `Invalid` means a source
/// reported the tag as permanently unobtainable. Both are distinct from
/// any real reading, so a legitimate −1.0 from the building never collides
/// with a placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalValue {
    Unset,
    Number(f64),
    Text(String),
    Invalid,
}

impl SignalValue {
    /// The numeric reading, if this value carries one.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            SignalValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

/// A real-world signal retrieved from an external source.
#[derive(Debug, Clone)]
pub struct SignalRow {
    /// Unique tag name; actuators reference signals by this.
    pub tag: String,
    /// Source kind, e.g. `historian` or `board`; partitions rows between
    /// retrieval agents.
    pub source: String,
    /// Source-specific identifier (dataset id, node id, ...).
    pub source_id: String,
    /// Latest retrieved value.
    pub value: SignalValue,
}

/// Whether a sensor row reads an instantaneous variable or an
/// accumulating meter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    Sensor,
    Meter,
}

/// A simulated value collected as the twin's representation of the
/// building.
#[derive(Debug, Clone)]
pub struct SensorRow {
    pub name: String,
    pub instance: String,
    pub kind: SensorKind,
    /// Hook at which this row is sampled.
    pub read_stage: Hook,
    /// Engine handle; [`UNRESOLVED_HANDLE`] until resolution.
    pub handle: i32,
    /// Latest collected value.
    pub value: f64,
    /// Column/entity key in the durable store.
    pub persist_key: String,
    /// Tag on the live board, when this row is republished.
    pub publish_tag: Option<String>,
}

/// A simulation setting overridden from a real-world signal.
#[derive(Debug, Clone)]
pub struct ActuatorRow {
    pub category: String,
    pub name: String,
    pub instance: String,
    /// Hook at which this row is written into the engine.
    pub override_stage: Hook,
    /// Tag of the signal row providing the raw value.
    pub source_tag: String,
    /// Conversion registry name, or `"none"`.
    pub conversion: String,
    /// Engine handle; [`UNRESOLVED_HANDLE`] until resolution.
    pub handle: i32,
    /// Value written at the override stage, fixed per timestep.
    pub value: f64,
}

/// A user extension staged at a hook.
#[derive(Debug, Clone)]
pub struct ExtensionRow {
    pub stage: Hook,
    /// Extension registry name.
    pub function: String,
}

/// The mutable state shared by all orchestration phases.
#[derive(Debug, Clone, Default)]
pub struct TwinTables {
    pub signals: Vec<SignalRow>,
    pub sensors: Vec<SensorRow>,
    pub actuators: Vec<ActuatorRow>,
    pub extensions: Vec<ExtensionRow>,
}

/// Errors raised while loading or cross-checking the row tables.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("cannot read \"{path}\": {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("\"{path}\": {source}")]
    Csv { path: PathBuf, source: csv::Error },
    #[error("\"{path}\" row {row}: unknown stage \"{stage}\"")]
    UnknownStage {
        path: PathBuf,
        row: usize,
        stage: String,
    },
    #[error("duplicate signal tag \"{0}\"")]
    DuplicateTag(String),
    #[error("actuator \"{actuator}\" references unknown signal tag \"{tag}\"")]
    UnknownSourceTag { actuator: String, tag: String },
}

#[derive(Debug, Deserialize)]
struct SignalRecord {
    tag: String,
    source: String,
    #[serde(default)]
    source_id: String,
}

#[derive(Debug, Deserialize)]
struct SensorRecord {
    name: String,
    instance: String,
    kind: SensorKind,
    read_stage: String,
    persist_key: String,
    #[serde(default)]
    publish_tag: String,
}

#[derive(Debug, Deserialize)]
struct ActuatorRecord {
    category: String,
    name: String,
    instance: String,
    override_stage: String,
    source_tag: String,
    #[serde(default = "default_conversion")]
    conversion: String,
}

#[derive(Debug, Deserialize)]
struct ExtensionRecord {
    stage: String,
    function: String,
}

fn default_conversion() -> String {
    "none".to_string()
}

fn read_records<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Vec<T>, TableError> {
    let file = std::fs::File::open(path).map_err(|e| TableError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut reader = csv::Reader::from_reader(file);
    let mut rows = Vec::new();
    for record in reader.deserialize() {
        rows.push(record.map_err(|e| TableError::Csv {
            path: path.to_path_buf(),
            source: e,
        })?);
    }
    Ok(rows)
}

fn parse_stage(raw: &str, path: &Path, row: usize) -> Result<Hook, TableError> {
    Hook::from_name(raw.trim()).ok_or_else(|| TableError::UnknownStage {
        path: path.to_path_buf(),
        row,
        stage: raw.to_string(),
    })
}

impl TwinTables {
    /// Loads all four tables from the site directory and cross-checks
    /// references: unique signal tags, known stage names, and actuator
    /// source tags that exist in the signal table.
    ///
    /// # Errors
    ///
    /// Returns the first [`TableError`] encountered; table problems are
    /// fatal at startup, never at a timestep.
    pub fn load(site_dir: &Path, cfg: &TablesConfig) -> Result<Self, TableError> {
        let signals_path = site_dir.join(&cfg.signals_file);
        let sensors_path = site_dir.join(&cfg.sensors_file);
        let actuators_path = site_dir.join(&cfg.actuators_file);
        let extensions_path = site_dir.join(&cfg.extensions_file);

        let mut signals = Vec::new();
        for rec in read_records::<SignalRecord>(&signals_path)? {
            if signals.iter().any(|s: &SignalRow| s.tag == rec.tag) {
                return Err(TableError::DuplicateTag(rec.tag));
            }
            signals.push(SignalRow {
                tag: rec.tag,
                source: rec.source,
                source_id: rec.source_id,
                value: SignalValue::Unset,
            });
        }

        let mut sensors = Vec::new();
        for (i, rec) in read_records::<SensorRecord>(&sensors_path)?.into_iter().enumerate() {
            let read_stage = parse_stage(&rec.read_stage, &sensors_path, i + 1)?;
            sensors.push(SensorRow {
                name: rec.name,
                instance: rec.instance,
                kind: rec.kind,
                read_stage,
                handle: UNRESOLVED_HANDLE,
                value: 0.0,
                persist_key: rec.persist_key,
                publish_tag: (!rec.publish_tag.is_empty()).then_some(rec.publish_tag),
            });
        }

        let mut actuators = Vec::new();
        for (i, rec) in read_records::<ActuatorRecord>(&actuators_path)?.into_iter().enumerate() {
            let override_stage = parse_stage(&rec.override_stage, &actuators_path, i + 1)?;
            if !signals.iter().any(|s| s.tag == rec.source_tag) {
                return Err(TableError::UnknownSourceTag {
                    actuator: rec.name,
                    tag: rec.source_tag,
                });
            }
            actuators.push(ActuatorRow {
                category: rec.category,
                name: rec.name,
                instance: rec.instance,
                override_stage,
                source_tag: rec.source_tag,
                conversion: rec.conversion,
                handle: UNRESOLVED_HANDLE,
                value: 0.0,
            });
        }

        let mut extensions = Vec::new();
        for (i, rec) in read_records::<ExtensionRecord>(&extensions_path)?.into_iter().enumerate() {
            let stage = parse_stage(&rec.stage, &extensions_path, i + 1)?;
            extensions.push(ExtensionRow {
                stage,
                function: rec.function,
            });
        }

        Ok(Self {
            signals,
            sensors,
            actuators,
            extensions,
        })
    }
}
