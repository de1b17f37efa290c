//! End-to-end timestep cycle against the stub engine.
//!
//! One sensor read at the terminal hook, one actuator written at the
//! gating hook from signal "S" (value 72.0 injected by a stub retrieval
//! agent, no conversion). The stub consumes its first timestep reaching
//! readiness and its second resolving handles, so the first active cycle
//! is the third engine timestep.

mod common;

use common::{FixedAgent, at, no_wait_pacing, orchestrator_with, scenario_tables, stub_for};
use twinsync::orchestrator::RunState;
use twinsync::orchestrator::timesync::FakeClock;
use twinsync::retrieval::RetrievalAggregator;
use twinsync::sim::api::UNRESOLVED_HANDLE;
use twinsync::sim::stub::RunOutcome;

#[test]
fn one_timestep_cycle_actuates_collects_and_flushes() {
    let tables = scenario_tables();
    let sim_start = at(2026, 4, 1, 0, 0);
    let mut sim = stub_for(&tables, sim_start, 15);

    let mut aggregator = RetrievalAggregator::new();
    aggregator.register(Box::new(FixedAgent {
        tag: "S",
        value: 72.0,
    }));

    let clock = FakeClock::at(at(2026, 6, 1, 0, 0));
    let (mut orchestrator, records) = orchestrator_with(
        tables,
        aggregator,
        clock,
        no_wait_pacing(),
        2026,
        at(2026, 1, 1, 0, 0),
        None,
    );

    // Three steps: readiness, resolution, one active cycle.
    let outcome = sim.run(&mut orchestrator, 3);
    assert_eq!(outcome, RunOutcome::Completed);

    // The actuator's current value became 72.0 and was written into the
    // engine at the gating hook.
    assert_eq!(orchestrator.tables().actuators[0].value, 72.0);
    assert_eq!(
        sim.actuator_value("Weather Data", "Outdoor Dry Bulb", "Environment"),
        Some(72.0)
    );

    // The sensor was read at the terminal hook (noiseless base 21.5).
    assert_eq!(orchestrator.tables().sensors[0].value, 21.5);

    // Exactly one flush, carrying the collected value at the canonical
    // timestamp of the active step (third interval, end-stamped 00:45).
    let records = records.lock().expect("records lock");
    assert_eq!(records.len(), 1);
    assert_eq!(
        records.get(&(at(2026, 4, 1, 0, 45), "core_zn_temp".into())),
        Some(&21.5)
    );
    drop(records);

    assert_eq!(orchestrator.state(), RunState::Gated);
}

#[test]
fn handles_resolve_once_then_every_step_flushes() {
    let tables = scenario_tables();
    let sim_start = at(2026, 4, 1, 0, 0);
    let mut sim = stub_for(&tables, sim_start, 15);

    let mut aggregator = RetrievalAggregator::new();
    aggregator.register(Box::new(FixedAgent {
        tag: "S",
        value: 72.0,
    }));

    let clock = FakeClock::at(at(2026, 6, 1, 0, 0));
    let (mut orchestrator, records) = orchestrator_with(
        tables,
        aggregator,
        clock,
        no_wait_pacing(),
        2026,
        at(2026, 1, 1, 0, 0),
        None,
    );

    let outcome = sim.run(&mut orchestrator, 6);
    assert_eq!(outcome, RunOutcome::Completed);

    assert_ne!(orchestrator.tables().sensors[0].handle, UNRESOLVED_HANDLE);
    assert_ne!(orchestrator.tables().actuators[0].handle, UNRESOLVED_HANDLE);

    // Steps 3..6 are active: one record per completed cycle, at distinct
    // timestamps.
    let records = records.lock().expect("records lock");
    assert_eq!(records.len(), 4);
}

#[test]
fn flush_is_gated_until_data_collection_start() {
    let tables = scenario_tables();
    let sim_start = at(2026, 4, 1, 0, 0);
    let mut sim = stub_for(&tables, sim_start, 15);

    let mut aggregator = RetrievalAggregator::new();
    aggregator.register(Box::new(FixedAgent {
        tag: "S",
        value: 72.0,
    }));

    // Data collection starts an hour into the run: the engine still
    // executes the earlier timesteps, but nothing lands in the store
    // before 01:00.
    let clock = FakeClock::at(at(2026, 6, 1, 0, 0));
    let (mut orchestrator, records) = orchestrator_with(
        tables,
        aggregator,
        clock,
        no_wait_pacing(),
        2026,
        at(2026, 4, 1, 1, 0),
        None,
    );

    let outcome = sim.run(&mut orchestrator, 8);
    assert_eq!(outcome, RunOutcome::Completed);

    let records = records.lock().expect("records lock");
    // Active steps stamp 00:45, 01:00, ..., 01:45; only 01:00 onward
    // qualify.
    assert_eq!(records.len(), 5);
    assert!(
        records.keys().all(|(ts, _)| *ts >= at(2026, 4, 1, 1, 0)),
        "no record may precede the data collection start"
    );
}

#[test]
fn conversion_is_applied_between_signal_and_actuator() {
    let mut tables = scenario_tables();
    tables.actuators[0].conversion = "fahrenheit_to_celsius".into();
    let sim_start = at(2026, 4, 1, 0, 0);
    let mut sim = stub_for(&tables, sim_start, 15);

    let mut aggregator = RetrievalAggregator::new();
    aggregator.register(Box::new(FixedAgent {
        tag: "S",
        value: 72.0,
    }));

    let clock = FakeClock::at(at(2026, 6, 1, 0, 0));
    let (mut orchestrator, _records) = orchestrator_with(
        tables,
        aggregator,
        clock,
        no_wait_pacing(),
        2026,
        at(2026, 1, 1, 0, 0),
        None,
    );

    sim.run(&mut orchestrator, 3);

    // 72 °F is 22.22 °C.
    let written = sim
        .actuator_value("Weather Data", "Outdoor Dry Bulb", "Environment")
        .expect("actuator registered");
    assert!((written - 22.222).abs() < 1e-2, "got {written}");
}
