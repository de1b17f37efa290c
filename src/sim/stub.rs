//! Deterministic stub engine.
//!
//! Implements the [`SimulatorApi`] boundary with a synthetic building:
//! registered variables wander around a base value with seeded Gaussian
//! noise, meters accumulate, and actuator writes land in a plain store.
//! It exists to drive the orchestrator — from the binary and from tests —
//! not to model physics. Like a real engine it owns the run loop,
//! reports readiness only after its first timestep, flags configured
//! warmup timesteps, and stamps the end of each interval (so the last
//! step of a day reports hour 24).

use chrono::{Datelike, Duration, NaiveDateTime, Timelike};
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::orchestrator::Orchestrator;
use crate::orchestrator::timesync::Clock;
use crate::sim::api::{EngineDate, Hook, SimulatorApi, UNRESOLVED_HANDLE};

/// How a stub run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// All requested timesteps ran.
    Completed,
    /// `stop` was called mid-run (the fatal orchestration path).
    Stopped,
}

/// Handle namespaces keep the three row kinds distinguishable in tests.
const METER_HANDLE_BASE: i32 = 1000;
const ACTUATOR_HANDLE_BASE: i32 = 2000;

struct StubVariable {
    name: String,
    instance: String,
    base: f64,
    noise_std: f64,
}

pub struct StubSimulator {
    variables: Vec<StubVariable>,
    variable_values: Vec<f64>,
    meters: Vec<String>,
    meter_totals: Vec<f64>,
    actuators: Vec<(String, String, String)>,
    actuator_values: Vec<f64>,
    step: Duration,
    current: NaiveDateTime,
    warmup_steps: usize,
    steps_done: usize,
    warmup_complete_fired: bool,
    stopped: bool,
    rng: StdRng,
}

impl StubSimulator {
    /// Creates a stub starting its first timestep at `start`.
    pub fn new(start: NaiveDateTime, step_minutes: i64, warmup_steps: usize, seed: u64) -> Self {
        Self {
            variables: Vec::new(),
            variable_values: Vec::new(),
            meters: Vec::new(),
            meter_totals: Vec::new(),
            actuators: Vec::new(),
            actuator_values: Vec::new(),
            step: Duration::minutes(step_minutes),
            current: start,
            warmup_steps,
            steps_done: 0,
            warmup_complete_fired: false,
            stopped: false,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Registers an output variable with a base value and noise level.
    pub fn add_variable(&mut self, name: &str, instance: &str, base: f64, noise_std: f64) {
        self.variables.push(StubVariable {
            name: name.to_string(),
            instance: instance.to_string(),
            base,
            noise_std,
        });
        self.variable_values.push(base);
    }

    /// Registers an accumulating meter.
    pub fn add_meter(&mut self, name: &str) {
        self.meters.push(name.to_string());
        self.meter_totals.push(0.0);
    }

    /// Registers an actuator slot.
    pub fn add_actuator(&mut self, category: &str, name: &str, instance: &str) {
        self.actuators
            .push((category.to_string(), name.to_string(), instance.to_string()));
        self.actuator_values.push(0.0);
    }

    /// Last value written to an actuator, for test introspection.
    pub fn actuator_value(&self, category: &str, name: &str, instance: &str) -> Option<f64> {
        self.actuators
            .iter()
            .position(|(c, n, i)| c == category && n == name && i == instance)
            .map(|i| self.actuator_values[i])
    }

    /// Timesteps executed so far.
    pub fn steps_done(&self) -> usize {
        self.steps_done
    }

    /// Gaussian noise via the Box-Muller transform.
    fn gaussian(&mut self, std_dev: f64) -> f64 {
        if std_dev <= 0.0 {
            return 0.0;
        }
        let u1: f64 = self.rng.random::<f64>().clamp(1e-12, 1.0);
        let u2: f64 = self.rng.random::<f64>();
        let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        z0 * std_dev
    }

    /// Advances the synthetic building by one timestep.
    fn advance(&mut self) {
        let dt_hours = self.step.num_minutes() as f64 / 60.0;
        for i in 0..self.variables.len() {
            let noise = self.gaussian(self.variables[i].noise_std);
            self.variable_values[i] = self.variables[i].base + noise;
        }
        let activity: f64 = self.variable_values.iter().map(|v| v.abs()).sum();
        for total in &mut self.meter_totals {
            *total += activity * dt_hours;
        }
    }

    /// Runs `total_steps` timesteps, firing the hook sequence into the
    /// orchestrator. The engine owns this loop; the orchestrator only
    /// reacts to hooks.
    pub fn run<C: Clock>(
        &mut self,
        orchestrator: &mut Orchestrator<C>,
        total_steps: usize,
    ) -> RunOutcome {
        orchestrator.on_hook(self, Hook::BeginEnvironment);
        orchestrator.on_hook(self, Hook::AfterComponentInput);

        for _ in 0..total_steps {
            if self.stopped {
                return RunOutcome::Stopped;
            }
            self.advance();
            for hook in Hook::STEP_SEQUENCE {
                orchestrator.on_hook(self, hook);
                if self.stopped {
                    return RunOutcome::Stopped;
                }
            }
            self.current += self.step;
            self.steps_done += 1;

            if !self.warmup_complete_fired && self.data_ready() && !self.warmup() {
                self.warmup_complete_fired = true;
                orchestrator.on_hook(self, Hook::WarmupComplete);
            }
        }
        RunOutcome::Completed
    }
}

impl SimulatorApi for StubSimulator {
    fn variable_handle(&self, name: &str, instance: &str) -> i32 {
        self.variables
            .iter()
            .position(|v| v.name == name && v.instance == instance)
            .map_or(UNRESOLVED_HANDLE, |i| i as i32)
    }

    fn meter_handle(&self, name: &str) -> i32 {
        self.meters
            .iter()
            .position(|m| m == name)
            .map_or(UNRESOLVED_HANDLE, |i| METER_HANDLE_BASE + i as i32)
    }

    fn actuator_handle(&self, category: &str, name: &str, instance: &str) -> i32 {
        self.actuators
            .iter()
            .position(|(c, n, i)| c == category && n == name && i == instance)
            .map_or(UNRESOLVED_HANDLE, |i| ACTUATOR_HANDLE_BASE + i as i32)
    }

    fn variable_value(&self, handle: i32) -> f64 {
        self.variable_values
            .get(handle as usize)
            .copied()
            .unwrap_or(0.0)
    }

    fn meter_value(&self, handle: i32) -> f64 {
        self.meter_totals
            .get((handle - METER_HANDLE_BASE) as usize)
            .copied()
            .unwrap_or(0.0)
    }

    fn set_actuator_value(&mut self, handle: i32, value: f64) {
        let idx = (handle - ACTUATOR_HANDLE_BASE) as usize;
        if let Some(slot) = self.actuator_values.get_mut(idx) {
            *slot = value;
        }
    }

    fn data_ready(&self) -> bool {
        self.steps_done >= 1
    }

    fn warmup(&self) -> bool {
        self.steps_done >= 1 && self.steps_done <= self.warmup_steps
    }

    fn clock(&self) -> EngineDate {
        // Engines stamp the end of the interval: the step ending at
        // midnight is reported as hour 24 of the old day.
        let end = self.current + self.step;
        if end.date() > self.current.date() {
            EngineDate {
                month: self.current.month(),
                day: self.current.day(),
                hour: 24,
                minute: 0,
            }
        } else {
            EngineDate {
                month: end.month(),
                day: end.day(),
                hour: end.hour(),
                minute: end.minute(),
            }
        }
    }

    fn stop(&mut self) {
        self.stopped = true;
    }
}
