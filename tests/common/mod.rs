//! Shared test fixtures for integration tests.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, NaiveDateTime};

use twinsync::config::{PacingConfig, TwinConfig};
use twinsync::orchestrator::Orchestrator;
use twinsync::orchestrator::timesync::{FakeClock, TimeSynchronizer};
use twinsync::persist::PersistencePublisher;
use twinsync::persist::memory::MemoryStore;
use twinsync::publish::SnapshotBoard;
use twinsync::retrieval::{RetrievalAgent, RetrievalAggregator};
use twinsync::sim::api::{Hook, UNRESOLVED_HANDLE};
use twinsync::sim::stub::StubSimulator;
use twinsync::tables::{ActuatorRow, SensorKind, SensorRow, SignalRow, SignalValue, TwinTables};

pub type Records = Arc<Mutex<BTreeMap<(NaiveDateTime, String), f64>>>;

/// Local timestamp helper.
pub fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hour, minute, 0))
        .expect("valid date")
}

/// Retrieval agent double injecting one fixed value into one tag.
pub struct FixedAgent {
    pub tag: &'static str,
    pub value: f64,
}

impl RetrievalAgent for FixedAgent {
    fn kind(&self) -> &str {
        "historian"
    }
    fn refresh(&mut self, signals: &mut [SignalRow], _t: NaiveDateTime) {
        for row in signals.iter_mut().filter(|r| r.tag == self.tag) {
            row.value = SignalValue::Number(self.value);
        }
    }
}

/// Retrieval agent double that never produces a value.
pub struct SilentAgent;

impl RetrievalAgent for SilentAgent {
    fn kind(&self) -> &str {
        "historian"
    }
    fn refresh(&mut self, _signals: &mut [SignalRow], _t: NaiveDateTime) {}
}

/// The canonical one-sensor/one-actuator scenario tables: a sensor read
/// at the terminal hook, an actuator written at the gating hook from
/// signal "S" with no conversion.
pub fn scenario_tables() -> TwinTables {
    TwinTables {
        signals: vec![SignalRow {
            tag: "S".into(),
            source: "historian".into(),
            source_id: String::new(),
            value: SignalValue::Unset,
        }],
        sensors: vec![SensorRow {
            name: "Zone Mean Air Temperature".into(),
            instance: "CORE_ZN".into(),
            kind: SensorKind::Sensor,
            read_stage: Hook::TERMINAL,
            handle: UNRESOLVED_HANDLE,
            value: 0.0,
            persist_key: "core_zn_temp".into(),
            publish_tag: Some("CoreZnTemp".into()),
        }],
        actuators: vec![ActuatorRow {
            category: "Weather Data".into(),
            name: "Outdoor Dry Bulb".into(),
            instance: "Environment".into(),
            override_stage: Hook::GATING,
            source_tag: "S".into(),
            conversion: "none".into(),
            handle: UNRESOLVED_HANDLE,
            value: 0.0,
        }],
        extensions: Vec::new(),
    }
}

/// A stub engine registered with every row of `tables`; sensor variables
/// are noiseless so readings are exact.
pub fn stub_for(tables: &TwinTables, start: NaiveDateTime, step_minutes: i64) -> StubSimulator {
    let mut sim = StubSimulator::new(start, step_minutes, 0, 7);
    for row in &tables.sensors {
        match row.kind {
            SensorKind::Sensor => sim.add_variable(&row.name, &row.instance, 21.5, 0.0),
            SensorKind::Meter => sim.add_meter(&row.name),
        }
    }
    for act in &tables.actuators {
        sim.add_actuator(&act.category, &act.name, &act.instance);
    }
    sim
}

/// Builds an orchestrator over a fake clock and a shared in-memory store.
///
/// Returns the orchestrator plus the record map handle for assertions.
pub fn orchestrator_with(
    tables: TwinTables,
    aggregator: RetrievalAggregator,
    clock: FakeClock,
    pacing: PacingConfig,
    start_year: i32,
    data_start: NaiveDateTime,
    board: Option<Arc<SnapshotBoard>>,
) -> (Orchestrator<FakeClock>, Records) {
    let records: Records = Arc::new(Mutex::new(BTreeMap::new()));
    let publisher = PersistencePublisher::new(
        data_start,
        Box::new(MemoryStore::shared(records.clone())),
        board,
    );
    let timesync = TimeSynchronizer::new(clock, start_year, &pacing);
    let orchestrator = Orchestrator::new(
        TwinConfig::default_site(),
        tables,
        aggregator,
        timesync,
        publisher,
    )
    .expect("orchestrator setup should succeed");
    (orchestrator, records)
}

/// Pacing that never waits, for tests not exercising the pacing property.
pub fn no_wait_pacing() -> PacingConfig {
    PacingConfig {
        buffer_minutes: 0,
        poll_seconds: 1,
    }
}
