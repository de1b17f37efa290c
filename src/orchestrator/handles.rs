//! One-time resolution of engine handles for every configured row.

use log::error;

use crate::sim::api::{SimulatorApi, UNRESOLVED_HANDLE};
use crate::tables::{ActuatorRow, SensorKind, SensorRow};

/// Requests a handle from the engine for every sensor/meter/actuator row
/// and writes it into the row. Returns false if any handle is still the
/// sentinel afterward.
///
/// A missing handle means the model and the configuration disagree; the
/// caller must treat a false return as fatal and abort the run. There is
/// no retry.
pub fn resolve<S: SimulatorApi>(
    api: &S,
    sensors: &mut [SensorRow],
    actuators: &mut [ActuatorRow],
) -> bool {
    let mut complete = true;

    for row in sensors.iter_mut() {
        row.handle = match row.kind {
            SensorKind::Sensor => api.variable_handle(&row.name, &row.instance),
            SensorKind::Meter => api.meter_handle(&row.name),
        };
        if row.handle == UNRESOLVED_HANDLE {
            error!(
                "no handle for {} \"{}\" (instance \"{}\")",
                match row.kind {
                    SensorKind::Sensor => "variable",
                    SensorKind::Meter => "meter",
                },
                row.name,
                row.instance
            );
            complete = false;
        }
    }

    for row in actuators.iter_mut() {
        row.handle = api.actuator_handle(&row.category, &row.name, &row.instance);
        if row.handle == UNRESOLVED_HANDLE {
            error!(
                "no handle for actuator {}/{}/{}",
                row.category, row.name, row.instance
            );
            complete = false;
        }
    }

    complete
}
