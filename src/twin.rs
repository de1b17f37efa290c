//! Twin assembly: configuration, tables, dates, collaborators, run.
//!
//! [`TwinSetup::load`] turns a site directory and a requested start date
//! into a validated configuration, loaded row tables, and the three
//! derived dates (warmup-adjusted simulation start, data-collection
//! start, end). [`run_twin`] then wires the collaborators — retrieval
//! agents, durable store, live board and its publish loop, stub engine —
//! around the orchestrator and drives the run to completion, releasing
//! the publish loop on every exit path.

use std::path::{Path, PathBuf};

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use log::{info, warn};
use thiserror::Error;

use crate::config::TwinConfig;
use crate::model_file;
use crate::orchestrator::timesync::{TimeSynchronizer, WallClock};
use crate::orchestrator::{Orchestrator, SetupError};
use crate::persist::csv_store::CsvStore;
use crate::persist::{PersistError, PersistencePublisher};
use crate::publish::{PublishLoop, SnapshotBoard, TagBoard, TagBoardPublisher};
use crate::retrieval::historian::{HistorianAgent, HistorianError, SOURCE_KIND as HISTORIAN};
use crate::retrieval::board::{SOURCE_KIND as BOARD, TagBoardAgent};
use crate::retrieval::RetrievalAggregator;
use crate::sim::stub::{RunOutcome, StubSimulator};
use crate::tables::{SensorKind, TableError, TwinTables};

/// Accepted start-datetime formats, tried in order; a bare date falls
/// back to midnight.
const START_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"];

/// Default base value for stub variables; the synthetic building sits
/// near room temperature.
const STUB_VARIABLE_BASE: f64 = 21.0;
const STUB_VARIABLE_NOISE: f64 = 0.5;

/// Top-level error for twin assembly and runs.
#[derive(Debug, Error)]
pub enum TwinError {
    #[error("invalid start date \"{0}\" (expected e.g. 2026-08-06T00:00)")]
    InvalidStartDate(String),
    #[error("{0}")]
    Config(String),
    #[error(transparent)]
    Table(#[from] TableError),
    #[error(transparent)]
    Setup(#[from] SetupError),
    #[error(transparent)]
    Historian(#[from] HistorianError),
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error("cannot prepare model file: {0}")]
    Model(#[from] std::io::Error),
    #[error("simulation aborted: sensor/actuator handles could not be resolved")]
    HandleResolution,
}

/// Parses a user-supplied start date.
pub fn parse_start_date(arg: &str) -> Result<NaiveDateTime, TwinError> {
    for format in START_FORMATS {
        if let Ok(t) = NaiveDateTime::parse_from_str(arg, format) {
            return Ok(t);
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(arg, "%Y-%m-%d")
        && let Some(t) = d.and_hms_opt(0, 0, 0)
    {
        return Ok(t);
    }
    Err(TwinError::InvalidStartDate(arg.to_string()))
}

/// A validated site: configuration, tables, and derived dates.
pub struct TwinSetup {
    pub site_dir: PathBuf,
    pub config: TwinConfig,
    pub tables: TwinTables,
    /// First simulated timestep, `warmup_days` before the data start.
    pub sim_start: NaiveDateTime,
    /// First timestamp persisted and published.
    pub data_start: NaiveDateTime,
    /// End of the simulated window.
    pub end_date: NaiveDateTime,
}

impl TwinSetup {
    /// Loads and validates everything a run needs from `site_dir`.
    ///
    /// # Errors
    ///
    /// Any configuration, table, or date problem is fatal here — before
    /// the engine is ever invoked.
    pub fn load(site_dir: &Path, start_arg: &str) -> Result<Self, TwinError> {
        let config = TwinConfig::from_toml_file(&site_dir.join("twin.toml"))
            .map_err(|e| TwinError::Config(e.to_string()))?;
        let errors = config.validate();
        if !errors.is_empty() {
            let joined = errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(TwinError::Config(joined));
        }

        let data_start = parse_start_date(start_arg)?;
        let sim_start = data_start - Duration::days(config.run.warmup_days);
        let end_date = data_start + Duration::days(config.run.run_length_days);
        info!("requested data collection start: {data_start}");
        info!("simulation start (with warmup): {sim_start}");
        info!("simulation end: {end_date}");

        let tables = TwinTables::load(site_dir, &config.tables)?;

        Ok(Self {
            site_dir: site_dir.to_path_buf(),
            config,
            tables,
            sim_start,
            data_start,
            end_date,
        })
    }

    /// The run-period override map for the model rewrite.
    pub fn override_map(&self) -> Vec<(String, String)> {
        model_file::override_map(self.sim_start.date(), self.end_date.date())
    }

    /// Rewrites the template model for this run's window and returns the
    /// path of the rewritten file.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the template cannot be read or the output
    /// cannot be written.
    pub fn prepare_model(&self) -> Result<PathBuf, TwinError> {
        let template = self.site_dir.join(&self.config.model.template_file);
        let out_path = self.site_dir.join(&self.config.model.output_file);
        model_file::rewrite_file(&template, &out_path, &self.override_map())?;
        info!("model rewritten to {}", out_path.display());
        Ok(out_path)
    }

    /// Number of engine timesteps covering `[sim_start, end_date)`.
    pub fn total_steps(&self) -> usize {
        let minutes = (self.end_date - self.sim_start).num_minutes();
        (minutes / self.config.simulator.step_minutes).max(0) as usize
    }
}

/// Builds the stub engine registered with every configured row.
fn build_stub(setup: &TwinSetup) -> StubSimulator {
    let sim_cfg = &setup.config.simulator;
    let mut sim = StubSimulator::new(
        setup.sim_start,
        sim_cfg.step_minutes,
        sim_cfg.warmup_steps,
        sim_cfg.seed,
    );
    for row in &setup.tables.sensors {
        match row.kind {
            SensorKind::Sensor => {
                sim.add_variable(&row.name, &row.instance, STUB_VARIABLE_BASE, STUB_VARIABLE_NOISE)
            }
            SensorKind::Meter => sim.add_meter(&row.name),
        }
    }
    for act in &setup.tables.actuators {
        sim.add_actuator(&act.category, &act.name, &act.instance);
    }
    sim
}

/// Runs a loaded site end to end against the bundled stub engine.
///
/// # Errors
///
/// Returns [`TwinError::HandleResolution`] if the fatal abort path fired,
/// or any wiring error raised before the run started.
pub fn run_twin(setup: TwinSetup) -> Result<RunOutcome, TwinError> {
    setup.prepare_model()?;

    // Live side: board, publish loop, and the board-reading agent.
    let publish_cfg = &setup.config.publish;
    let mut snapshot_board = None;
    let mut tag_board = None;
    let mut publish_loop = None;
    if publish_cfg.enabled {
        let snapshots = std::sync::Arc::new(SnapshotBoard::new());
        let tags = std::sync::Arc::new(TagBoard::new());
        let publisher = TagBoardPublisher::new(tags.clone(), &publish_cfg.writable_tags);
        publish_loop = Some(PublishLoop::spawn(
            snapshots.clone(),
            Box::new(publisher),
            std::time::Duration::from_secs(publish_cfg.interval_seconds),
        ));
        snapshot_board = Some(snapshots);
        tag_board = Some(tags);
    }

    // Retrieval agents, partitioned by the source kinds the signal table
    // actually declares.
    let mut aggregator = RetrievalAggregator::new();
    if setup.tables.signals.iter().any(|s| s.source == HISTORIAN) {
        let path = setup.site_dir.join(&setup.config.tables.historian_file);
        aggregator.register(Box::new(HistorianAgent::from_csv(&path)?));
    }
    if setup.tables.signals.iter().any(|s| s.source == BOARD) {
        match &tag_board {
            Some(tags) => aggregator.register(Box::new(TagBoardAgent::new(tags.clone()))),
            None => warn!(
                "signals declare the \"{BOARD}\" source but publish is disabled; those signals will stay unset"
            ),
        }
    }
    if aggregator.is_empty() {
        warn!("no retrieval agents registered; actuator values will never refresh");
    }

    let journal = setup.site_dir.join(&setup.config.persistence.journal_file);
    let sink = CsvStore::open(&journal, &setup.config.run.twin_id)?;
    let publisher =
        PersistencePublisher::new(setup.data_start, Box::new(sink), snapshot_board.clone());

    let timesync = TimeSynchronizer::new(WallClock, setup.sim_start.year(), &setup.config.pacing);

    let mut sim = build_stub(&setup);
    let total_steps = setup.total_steps();
    let mut orchestrator = Orchestrator::new(
        setup.config,
        setup.tables,
        aggregator,
        timesync,
        publisher,
    )?;

    info!("starting twin run: {total_steps} engine timesteps");
    let outcome = sim.run(&mut orchestrator, total_steps);

    // Release the live side before reporting; the loop must also die on
    // the fatal path.
    if let Some(publish_loop) = publish_loop {
        publish_loop.shutdown();
    }

    if orchestrator.is_fatal() {
        return Err(TwinError::HandleResolution);
    }
    info!("twin run complete: {} timesteps", sim.steps_done());
    Ok(outcome)
}
