//! Readback of simulated sensor and meter values.

use crate::sim::api::{Hook, SimulatorApi};
use crate::tables::{SensorKind, SensorRow};

/// Reads the kind-appropriate engine value for every sensor row staged at
/// `hook` and overwrites the row's current value.
///
/// No transformation happens here; conversions belong to actuators only.
pub fn collect<S: SimulatorApi>(
    api: &S,
    hook: Hook,
    staged: &[usize],
    sensors: &mut [SensorRow],
) {
    for &i in staged {
        let row = &mut sensors[i];
        debug_assert_eq!(row.read_stage, hook);
        row.value = match row.kind {
            SensorKind::Sensor => api.variable_value(row.handle),
            SensorKind::Meter => api.meter_value(row.handle),
        };
    }
}
