//! Data-driven mapping from hook to the rows staged at it.

use std::collections::HashMap;

use crate::sim::api::Hook;
use crate::tables::TwinTables;

/// Precomputed, immutable index of which actuator/sensor/extension rows
/// act at each hook. Built once at startup from the row tables; lookups
/// preserve configuration row order.
#[derive(Debug, Default)]
pub struct StageTable {
    actuators: HashMap<Hook, Vec<usize>>,
    sensors: HashMap<Hook, Vec<usize>>,
    extensions: HashMap<Hook, Vec<usize>>,
}

impl StageTable {
    /// Builds the stage index from loaded tables.
    pub fn build(tables: &TwinTables) -> Self {
        let mut table = StageTable::default();
        for (i, act) in tables.actuators.iter().enumerate() {
            table.actuators.entry(act.override_stage).or_default().push(i);
        }
        for (i, sen) in tables.sensors.iter().enumerate() {
            table.sensors.entry(sen.read_stage).or_default().push(i);
        }
        for (i, ext) in tables.extensions.iter().enumerate() {
            table.extensions.entry(ext.stage).or_default().push(i);
        }
        table
    }

    /// Actuator row indices staged at `hook`, in table order.
    pub fn actuators_at(&self, hook: Hook) -> &[usize] {
        self.actuators.get(&hook).map_or(&[], Vec::as_slice)
    }

    /// Sensor row indices staged at `hook`, in table order.
    pub fn sensors_at(&self, hook: Hook) -> &[usize] {
        self.sensors.get(&hook).map_or(&[], Vec::as_slice)
    }

    /// Extension row indices staged at `hook`, in table order.
    pub fn extensions_at(&self, hook: Hook) -> &[usize] {
        self.extensions.get(&hook).map_or(&[], Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::api::UNRESOLVED_HANDLE;
    use crate::tables::{ActuatorRow, ExtensionRow, SensorKind, SensorRow};

    fn sensor(name: &str, stage: Hook) -> SensorRow {
        SensorRow {
            name: name.to_string(),
            instance: String::new(),
            kind: SensorKind::Sensor,
            read_stage: stage,
            handle: UNRESOLVED_HANDLE,
            value: 0.0,
            persist_key: name.to_lowercase(),
            publish_tag: None,
        }
    }

    fn actuator(name: &str, stage: Hook) -> ActuatorRow {
        ActuatorRow {
            category: "Weather Data".to_string(),
            name: name.to_string(),
            instance: "Environment".to_string(),
            override_stage: stage,
            source_tag: "S".to_string(),
            conversion: "none".to_string(),
            handle: UNRESOLVED_HANDLE,
            value: 0.0,
        }
    }

    #[test]
    fn rows_group_by_declared_stage_in_order() {
        let tables = TwinTables {
            signals: Vec::new(),
            sensors: vec![
                sensor("a", Hook::EndStepAfterReporting),
                sensor("b", Hook::BeginStepBeforeHeatBalance),
                sensor("c", Hook::EndStepAfterReporting),
            ],
            actuators: vec![
                actuator("x", Hook::BeginStepBeforeHeatBalance),
                actuator("y", Hook::AfterPredictorAfterHvac),
            ],
            extensions: vec![ExtensionRow {
                stage: Hook::BeforePredictor,
                function: "log_actuator_state".to_string(),
            }],
        };
        let stages = StageTable::build(&tables);

        assert_eq!(stages.sensors_at(Hook::EndStepAfterReporting), &[0, 2]);
        assert_eq!(stages.sensors_at(Hook::BeginStepBeforeHeatBalance), &[1]);
        assert_eq!(stages.actuators_at(Hook::BeginStepBeforeHeatBalance), &[0]);
        assert_eq!(stages.actuators_at(Hook::AfterPredictorAfterHvac), &[1]);
        assert_eq!(stages.extensions_at(Hook::BeforePredictor), &[0]);
    }

    #[test]
    fn unmatched_hooks_stage_nothing() {
        let tables = TwinTables::default();
        let stages = StageTable::build(&tables);
        for hook in Hook::ALL {
            assert!(stages.actuators_at(hook).is_empty());
            assert!(stages.sensors_at(hook).is_empty());
            assert!(stages.extensions_at(hook).is_empty());
        }
    }
}
