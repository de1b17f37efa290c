//! Full site run: config + tables + historian + model rewrite + journal.

use std::fs;
use std::path::Path;

use twinsync::sim::stub::RunOutcome;
use twinsync::twin::{TwinSetup, run_twin};

const TWIN_TOML: &str = r#"
[run]
twin_id = "test_site"
run_length_days = 1
warmup_days = 0

[pacing]
buffer_minutes = 0
poll_seconds = 1

[simulator]
step_minutes = 60
warmup_steps = 0
seed = 9
"#;

const TEMPLATE: &str = "\
Version,
  24.1;                             !- Version Identifier

RunPeriod,
  Run Period 1,                     !- Name
  1,                                !- Begin Month
  1,                                !- Begin Day of Month
  2017,                             !- Begin Year
  12,                               !- End Month
  31,                               !- End Day of Month
  2017,                             !- End Year
  Sunday,                           !- Day of Week for Start Day
  No;                               !- Use Weather File Holidays and Special Days
";

/// Writes a complete site: one historian-sourced signal overriding one
/// actuator, one sensor and one meter collected at the terminal hook.
fn write_site(dir: &Path) {
    fs::write(dir.join("twin.toml"), TWIN_TOML).expect("write twin.toml");
    fs::write(dir.join("building.idf"), TEMPLATE).expect("write template");
    fs::write(
        dir.join("signals.csv"),
        "tag,source,source_id\nOAT_F,historian,ds1\n",
    )
    .expect("write signals");
    fs::write(
        dir.join("sensors.csv"),
        "name,instance,kind,read_stage,persist_key,publish_tag\n\
         Zone Mean Air Temperature,CORE_ZN,sensor,end_step_after_reporting,core_zn_temp,CoreZnTemp\n\
         Electricity:Facility,,meter,end_step_after_reporting,facility_kwh,\n",
    )
    .expect("write sensors");
    fs::write(
        dir.join("actuators.csv"),
        "category,name,instance,override_stage,source_tag,conversion\n\
         Weather Data,Outdoor Dry Bulb,Environment,begin_step_before_heat_balance,OAT_F,fahrenheit_to_celsius\n",
    )
    .expect("write actuators");
    fs::write(dir.join("extensions.csv"), "stage,function\n").expect("write extensions");

    // Hourly historian samples covering the whole simulated day.
    let mut historian = String::from("timestamp,tag,value\n");
    for hour in 0..=23 {
        historian.push_str(&format!("2026-01-05T{hour:02}:00:00,OAT_F,50.0\n"));
        historian.push_str(&format!("2026-01-06T{hour:02}:00:00,OAT_F,50.0\n"));
    }
    fs::write(dir.join("historian.csv"), historian).expect("write historian");
}

#[test]
fn historical_site_runs_to_completion() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_site(dir.path());

    // A start date in the past: the pacing wait is already satisfied and
    // the replay runs at full speed.
    let setup = TwinSetup::load(dir.path(), "2026-01-05").expect("load site");
    assert_eq!(setup.total_steps(), 24);

    let outcome = run_twin(setup).expect("run should complete");
    assert_eq!(outcome, RunOutcome::Completed);

    // Model rewritten for the requested window.
    let model = fs::read_to_string(dir.path().join("twin_in.idf")).expect("rewritten model");
    assert!(model.contains("2026,"), "run period year rewritten:\n{model}");
    assert!(model.contains("Monday,"), "2026-01-05 is a Monday");
    assert!(!model.contains("2017,"), "template years replaced");

    // Journal written: 22 active timesteps (the stub spends two becoming
    // ready and resolving handles) times two sensor rows.
    let journal = fs::read_to_string(dir.path().join("twin_journal.csv")).expect("journal");
    let mut lines = journal.lines();
    assert_eq!(lines.next(), Some("timestamp,twin_id,entity,value"));
    let rows: Vec<&str> = lines.collect();
    assert_eq!(rows.len(), 22 * 2);
    assert!(rows.iter().all(|r| r.contains("test_site")));
    assert!(rows.iter().any(|r| r.contains("core_zn_temp")));
    assert!(rows.iter().any(|r| r.contains("facility_kwh")));
}

#[test]
fn missing_table_fails_before_the_engine_starts() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_site(dir.path());
    fs::remove_file(dir.path().join("actuators.csv")).expect("remove actuators");

    let err = TwinSetup::load(dir.path(), "2026-01-05");
    assert!(err.is_err(), "missing table must fail at load");
}

#[test]
fn unknown_conversion_fails_before_the_engine_starts() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_site(dir.path());
    fs::write(
        dir.path().join("actuators.csv"),
        "category,name,instance,override_stage,source_tag,conversion\n\
         Weather Data,Outdoor Dry Bulb,Environment,begin_step_before_heat_balance,OAT_F,furlongs_per_fortnight\n",
    )
    .expect("write actuators");

    let setup = TwinSetup::load(dir.path(), "2026-01-05").expect("tables load fine");
    let err = run_twin(setup);
    assert!(err.is_err(), "unresolvable conversion name must be fatal");
}
