//! User extension registry.
//!
//! Extensions are site-specific routines staged at a hook via the
//! extensions table, running between the actuator writes and the sensor
//! collection of that hook. Like conversions, they are resolved by name
//! at startup so a misconfigured name never reaches a timestep.

use chrono::NaiveDateTime;
use log::info;

use crate::config::TwinConfig;
use crate::tables::{SignalValue, TwinTables};

/// Mutable view handed to an extension at its staged hook.
pub struct ExtensionCtx<'a> {
    pub config: &'a TwinConfig,
    /// Canonical simulated timestamp of the current timestep.
    pub time: NaiveDateTime,
    pub tables: &'a mut TwinTables,
}

/// A registered extension routine.
pub type ExtensionFn = fn(&mut ExtensionCtx<'_>);

const REGISTRY: &[(&str, ExtensionFn)] = &[
    ("log_actuator_state", log_actuator_state),
    ("zero_floor_signals", zero_floor_signals),
];

/// Resolves an extension name to its function.
pub fn lookup(name: &str) -> Option<ExtensionFn> {
    REGISTRY
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, f)| *f)
}

/// All registered extension names, for diagnostics.
pub fn names() -> Vec<&'static str> {
    REGISTRY.iter().map(|(n, _)| *n).collect()
}

/// Logs every actuator's current override value at info level.
fn log_actuator_state(ctx: &mut ExtensionCtx<'_>) {
    for act in &ctx.tables.actuators {
        info!(
            "actuator {}/{}/{} = {} at {}",
            act.category, act.name, act.instance, act.value, ctx.time
        );
    }
}

/// Clamps negative numeric signal values to zero. Useful for quantities
/// that are physically non-negative (irradiance, wind speed) when a
/// source interpolates below zero.
fn zero_floor_signals(ctx: &mut ExtensionCtx<'_>) {
    for sig in &mut ctx.tables.signals {
        if let SignalValue::Number(v) = sig.value
            && v < 0.0
        {
            sig.value = SignalValue::Number(0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::SignalRow;
    use chrono::NaiveDate;

    #[test]
    fn every_registered_name_resolves() {
        for name in names() {
            assert!(lookup(name).is_some(), "\"{name}\" should resolve");
        }
    }

    #[test]
    fn unknown_name_does_not_resolve() {
        assert!(lookup("recalibrate_chiller").is_none());
    }

    #[test]
    fn zero_floor_clamps_only_negative_numbers() {
        let config = TwinConfig::default_site();
        let mut tables = TwinTables {
            signals: vec![
                SignalRow {
                    tag: "A".into(),
                    source: "historian".into(),
                    source_id: String::new(),
                    value: SignalValue::Number(-3.0),
                },
                SignalRow {
                    tag: "B".into(),
                    source: "historian".into(),
                    source_id: String::new(),
                    value: SignalValue::Number(7.5),
                },
                SignalRow {
                    tag: "C".into(),
                    source: "historian".into(),
                    source_id: String::new(),
                    value: SignalValue::Unset,
                },
            ],
            ..TwinTables::default()
        };
        let time = NaiveDate::from_ymd_opt(2026, 3, 1)
            .and_then(|d| d.and_hms_opt(8, 0, 0))
            .expect("valid date");
        let mut ctx = ExtensionCtx {
            config: &config,
            time,
            tables: &mut tables,
        };
        zero_floor_signals(&mut ctx);
        assert_eq!(tables.signals[0].value, SignalValue::Number(0.0));
        assert_eq!(tables.signals[1].value, SignalValue::Number(7.5));
        assert_eq!(tables.signals[2].value, SignalValue::Unset);
    }
}
