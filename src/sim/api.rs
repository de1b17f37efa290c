//! Boundary contract between the orchestrator and a simulation engine.
//!
//! The engine owns the run loop and fires a fixed set of named [`Hook`]s
//! once per relevant phase of each timestep. Everything the orchestrator
//! needs from the engine — handle lookup, data exchange, warmup/readiness
//! flags, the engine-reported clock, and the stop primitive — goes through
//! [`SimulatorApi`]. No payload beyond "hook fired now" is assumed.

/// Sentinel returned by handle lookups when the engine cannot resolve a
/// (kind, name, instance) triple. This is the engine's wire contract;
/// rows keep it in their `handle` field until resolution succeeds.
pub const UNRESOLVED_HANDLE: i32 = -1;

/// Named callback invocation points, fired once per timestep phase.
///
/// `BeginStepBeforeHeatBalance` is the gating hook: it precedes heat-balance
/// initialization and is where per-timestep step logic is armed.
/// `EndStepAfterReporting` is the terminal hook, after zone reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    BeginEnvironment,
    AfterComponentInput,
    WarmupComplete,
    BeginStepBeforeHeatBalance,
    BeginStepAfterHeatBalance,
    BeforePredictor,
    AfterPredictorBeforeHvac,
    AfterPredictorAfterHvac,
    InsideHvacIteration,
    BeforeHvacReporting,
    AfterHvacReporting,
    EndStepBeforeReporting,
    EndStepAfterReporting,
}

impl Hook {
    /// Every hook, in engine firing order within a timestep.
    pub const ALL: [Hook; 13] = [
        Hook::BeginEnvironment,
        Hook::AfterComponentInput,
        Hook::WarmupComplete,
        Hook::BeginStepBeforeHeatBalance,
        Hook::BeginStepAfterHeatBalance,
        Hook::BeforePredictor,
        Hook::AfterPredictorBeforeHvac,
        Hook::AfterPredictorAfterHvac,
        Hook::InsideHvacIteration,
        Hook::BeforeHvacReporting,
        Hook::AfterHvacReporting,
        Hook::EndStepBeforeReporting,
        Hook::EndStepAfterReporting,
    ];

    /// Hooks fired on every timestep, in order. The run-level hooks
    /// (`BeginEnvironment`, `AfterComponentInput`, `WarmupComplete`) are
    /// excluded; engines fire those at environment transitions.
    pub const STEP_SEQUENCE: [Hook; 10] = [
        Hook::BeginStepBeforeHeatBalance,
        Hook::BeginStepAfterHeatBalance,
        Hook::BeforePredictor,
        Hook::AfterPredictorBeforeHvac,
        Hook::AfterPredictorAfterHvac,
        Hook::InsideHvacIteration,
        Hook::BeforeHvacReporting,
        Hook::AfterHvacReporting,
        Hook::EndStepBeforeReporting,
        Hook::EndStepAfterReporting,
    ];

    /// The gating hook: first per-timestep hook, precedes heat-balance init.
    pub const GATING: Hook = Hook::BeginStepBeforeHeatBalance;

    /// The terminal hook: last per-timestep hook, after zone reporting.
    pub const TERMINAL: Hook = Hook::EndStepAfterReporting;

    /// Stable snake_case name, used by the stage columns of the row tables.
    pub fn name(self) -> &'static str {
        match self {
            Hook::BeginEnvironment => "begin_environment",
            Hook::AfterComponentInput => "after_component_input",
            Hook::WarmupComplete => "warmup_complete",
            Hook::BeginStepBeforeHeatBalance => "begin_step_before_heat_balance",
            Hook::BeginStepAfterHeatBalance => "begin_step_after_heat_balance",
            Hook::BeforePredictor => "before_predictor",
            Hook::AfterPredictorBeforeHvac => "after_predictor_before_hvac",
            Hook::AfterPredictorAfterHvac => "after_predictor_after_hvac",
            Hook::InsideHvacIteration => "inside_hvac_iteration",
            Hook::BeforeHvacReporting => "before_hvac_reporting",
            Hook::AfterHvacReporting => "after_hvac_reporting",
            Hook::EndStepBeforeReporting => "end_step_before_reporting",
            Hook::EndStepAfterReporting => "end_step_after_reporting",
        }
    }

    /// Parses a stage name as written in the configuration tables.
    pub fn from_name(name: &str) -> Option<Hook> {
        Hook::ALL.into_iter().find(|h| h.name() == name)
    }
}

/// Date/time fields as reported by the engine for the current callback.
///
/// There is deliberately no year field: engine-reported years carry
/// weather-file artifacts and are never trusted (the run's configured
/// start year is used instead).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineDate {
    pub month: u32,
    pub day: u32,
    /// May be 24 as an end-of-day marker.
    pub hour: u32,
    /// May be 60 as an end-of-hour marker.
    pub minute: u32,
}

/// Data-exchange surface of a simulation engine.
///
/// Handle lookups return [`UNRESOLVED_HANDLE`] on miss. `stop` asks the
/// engine to terminate its run loop at the next opportunity; it is the
/// abort path for fatal orchestration errors.
pub trait SimulatorApi {
    /// Handle for an output variable identified by (name, instance).
    fn variable_handle(&self, name: &str, instance: &str) -> i32;
    /// Handle for a meter identified by name.
    fn meter_handle(&self, name: &str) -> i32;
    /// Handle for an actuator identified by (category, name, instance).
    fn actuator_handle(&self, category: &str, name: &str, instance: &str) -> i32;

    /// Current value of a resolved variable handle.
    fn variable_value(&self, handle: i32) -> f64;
    /// Current value of a resolved meter handle.
    fn meter_value(&self, handle: i32) -> f64;
    /// Overrides the value behind a resolved actuator handle.
    fn set_actuator_value(&mut self, handle: i32, value: f64);

    /// True once the engine's data dictionary is fully populated and
    /// handle lookups can succeed.
    fn data_ready(&self) -> bool;
    /// True while the engine is in its warmup/convergence period.
    fn warmup(&self) -> bool;
    /// Engine-reported clock fields for the current callback.
    fn clock(&self) -> EngineDate;
    /// Requests that the engine stop its run loop.
    fn stop(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hook_names_round_trip() {
        for hook in Hook::ALL {
            assert_eq!(Hook::from_name(hook.name()), Some(hook));
        }
    }

    #[test]
    fn unknown_hook_name_is_none() {
        assert_eq!(Hook::from_name("begin_sizing"), None);
        assert_eq!(Hook::from_name(""), None);
    }

    #[test]
    fn gating_and_terminal_are_step_boundaries() {
        assert_eq!(Hook::STEP_SEQUENCE.first(), Some(&Hook::GATING));
        assert_eq!(Hook::STEP_SEQUENCE.last(), Some(&Hook::TERMINAL));
    }
}
