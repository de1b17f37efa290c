//! The co-simulation orchestrator.
//!
//! The engine owns the run loop; this module owns what happens when its
//! hooks fire. Per timestep the gating hook resolves handles exactly once
//! (first timestep only), skips warmup, paces simulated time against wall
//! clock, fixes the actuator values for the step, and then every hook —
//! gating included — runs the same three-phase sequence for the rows
//! staged at it: write actuators, run extensions, collect sensors. The
//! terminal hook additionally flushes the collected values downstream.

pub mod collector;
pub mod handles;
pub mod stages;
pub mod timesync;

use chrono::NaiveDateTime;
use log::{error, info, warn};
use thiserror::Error;

use crate::config::TwinConfig;
use crate::convert::{self, ConvertFn, NO_CONVERSION};
use crate::custom::{self, ExtensionCtx, ExtensionFn};
use crate::persist::PersistencePublisher;
use crate::retrieval::RetrievalAggregator;
use crate::sim::api::{Hook, SimulatorApi};
use crate::tables::{TwinTables, SignalValue};

use self::stages::StageTable;
use self::timesync::{Clock, TimeSynchronizer};

/// Errors raised while wiring the orchestrator, before the run starts.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("unknown conversion \"{name}\" for actuator \"{actuator}\" (known: {known:?})")]
    UnknownConversion {
        name: String,
        actuator: String,
        known: Vec<&'static str>,
    },
    #[error("unknown extension function \"{name}\" (known: {known:?})")]
    UnknownExtension {
        name: String,
        known: Vec<&'static str>,
    },
}

/// Explicit run state. Every (state, hook) pair has defined behavior;
/// "ignore" is a decision, not an accident.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Engine data not ready or handles not yet resolved; all hooks
    /// no-op except the gating hook, which attempts resolution.
    AwaitingHandles,
    /// Handle resolution failed; every hook is a no-op while the engine
    /// winds down after `stop`.
    Fatal,
    /// Handles resolved, between timesteps or inside warmup; waiting for
    /// the next gating hook.
    Gated,
    /// Mid-timestep: staged phases execute at each hook until the
    /// terminal hook completes the step.
    Active,
}

/// The stateful dispatcher between engine callbacks and the row tables.
pub struct Orchestrator<C: Clock> {
    config: TwinConfig,
    tables: TwinTables,
    stages: StageTable,
    aggregator: RetrievalAggregator,
    /// Resolved per-actuator conversion, parallel to `tables.actuators`.
    conversions: Vec<Option<ConvertFn>>,
    /// Resolved extension functions, parallel to `tables.extensions`.
    extensions: Vec<ExtensionFn>,
    timesync: TimeSynchronizer<C>,
    publisher: PersistencePublisher,
    state: RunState,
    /// Canonical timestamp of the step in flight; `None` outside Active.
    sim_time: Option<NaiveDateTime>,
}

impl<C: Clock> Orchestrator<C> {
    /// Wires an orchestrator, resolving every configured conversion and
    /// extension name against the registries.
    ///
    /// # Errors
    ///
    /// Returns a [`SetupError`] for any name with no registered
    /// implementation — a configuration error caught before the run,
    /// never at a timestep.
    pub fn new(
        config: TwinConfig,
        tables: TwinTables,
        aggregator: RetrievalAggregator,
        timesync: TimeSynchronizer<C>,
        publisher: PersistencePublisher,
    ) -> Result<Self, SetupError> {
        let mut conversions = Vec::with_capacity(tables.actuators.len());
        for act in &tables.actuators {
            if act.conversion == NO_CONVERSION {
                conversions.push(None);
            } else {
                let f = convert::lookup(&act.conversion).ok_or_else(|| {
                    SetupError::UnknownConversion {
                        name: act.conversion.clone(),
                        actuator: act.name.clone(),
                        known: convert::names(),
                    }
                })?;
                conversions.push(Some(f));
            }
        }

        let mut extensions = Vec::with_capacity(tables.extensions.len());
        for ext in &tables.extensions {
            let f = custom::lookup(&ext.function).ok_or_else(|| SetupError::UnknownExtension {
                name: ext.function.clone(),
                known: custom::names(),
            })?;
            extensions.push(f);
        }

        let stages = StageTable::build(&tables);
        Ok(Self {
            config,
            tables,
            stages,
            aggregator,
            conversions,
            extensions,
            timesync,
            publisher,
            state: RunState::AwaitingHandles,
            sim_time: None,
        })
    }

    /// Current run state.
    pub fn state(&self) -> RunState {
        self.state
    }

    /// True once the run has hit the fatal abort path.
    pub fn is_fatal(&self) -> bool {
        self.state == RunState::Fatal
    }

    /// Read access to the row tables.
    pub fn tables(&self) -> &TwinTables {
        &self.tables
    }

    /// Canonical timestamp of the timestep in flight, if any.
    pub fn sim_time(&self) -> Option<NaiveDateTime> {
        self.sim_time
    }

    /// Entry point for every engine callback.
    pub fn on_hook<S: SimulatorApi>(&mut self, api: &mut S, hook: Hook) {
        match self.state {
            RunState::Fatal => {}
            RunState::AwaitingHandles => {
                if hook == Hook::GATING {
                    self.try_resolve(api);
                }
                // All other hooks are silent until handles exist.
            }
            RunState::Gated | RunState::Active if hook == Hook::GATING => {
                self.begin_timestep(api);
            }
            RunState::Gated => {
                // Between timesteps (or warmup): staged logic stays off.
            }
            RunState::Active => {
                self.run_stage(api, hook);
                if hook == Hook::TERMINAL {
                    self.complete_timestep();
                }
            }
        }
    }

    /// One-time handle resolution at the gating hook. Failure stops the
    /// engine and latches the fatal state; there is no retry because a
    /// missing handle means model and configuration disagree.
    fn try_resolve<S: SimulatorApi>(&mut self, api: &mut S) {
        if !api.data_ready() {
            return;
        }
        if handles::resolve(api, &mut self.tables.sensors, &mut self.tables.actuators) {
            info!(
                "resolved {} sensor and {} actuator handles",
                self.tables.sensors.len(),
                self.tables.actuators.len()
            );
            self.state = RunState::Gated;
        } else {
            error!("unable to resolve all sensor/actuator handles; stopping simulation");
            api.stop();
            self.state = RunState::Fatal;
        }
        // Step logic begins at the next timestep's gating hook.
    }

    /// Arms one timestep: warmup skip, canonical time, pacing, actuator
    /// value refresh, then the gating hook's own staged phases.
    fn begin_timestep<S: SimulatorApi>(&mut self, api: &mut S) {
        if api.warmup() {
            self.state = RunState::Gated;
            return;
        }

        let date = api.clock();
        let Some(time) = self.timesync.canonical_time(date) else {
            error!(
                "engine reported impossible date {}/{} {}:{}; stopping simulation",
                date.month, date.day, date.hour, date.minute
            );
            api.stop();
            self.state = RunState::Fatal;
            return;
        };

        // Hold the whole simulation until this timepoint has actually
        // happened in the real building.
        self.timesync.wait_until_ready(time);

        self.sim_time = Some(time);
        self.state = RunState::Active;

        // Actuator values are fixed here for the entire timestep; later
        // hooks write these same values even if the live source moves.
        self.refresh_actuator_values(time);

        self.run_stage(api, Hook::GATING);
    }

    /// Pulls fresh signals and recomputes every actuator's value through
    /// its conversion.
    fn refresh_actuator_values(&mut self, time: NaiveDateTime) {
        self.aggregator.refresh(&mut self.tables.signals, time);

        let TwinTables {
            signals, actuators, ..
        } = &mut self.tables;
        for (i, act) in actuators.iter_mut().enumerate() {
            let Some(sig) = signals.iter().find(|s| s.tag == act.source_tag) else {
                // Source tags are validated at load; an orphan here means
                // a programming error, not a configuration one.
                continue;
            };
            match sig.value {
                SignalValue::Number(raw) => {
                    act.value = match self.conversions[i] {
                        Some(f) => f(&self.config.site, time, raw),
                        None => raw,
                    };
                }
                _ => warn!(
                    "signal \"{}\" has no numeric value at {time}; actuator \"{}\" keeps {}",
                    sig.tag, act.name, act.value
                ),
            }
        }
    }

    /// The three-phase sequence for one hook: staged actuator writes,
    /// staged extensions, staged sensor collection.
    fn run_stage<S: SimulatorApi>(&mut self, api: &mut S, hook: Hook) {
        for &i in self.stages.actuators_at(hook) {
            let row = &self.tables.actuators[i];
            api.set_actuator_value(row.handle, row.value);
        }

        let Some(time) = self.sim_time else {
            return;
        };
        for &i in self.stages.extensions_at(hook) {
            let f = self.extensions[i];
            f(&mut ExtensionCtx {
                config: &self.config,
                time,
                tables: &mut self.tables,
            });
        }

        collector::collect(api, hook, self.stages.sensors_at(hook), &mut self.tables.sensors);
    }

    /// Terminal-hook bookkeeping: hand the collected snapshot downstream
    /// and disarm step logic until the next gating hook.
    fn complete_timestep(&mut self) {
        if let Some(time) = self.sim_time.take() {
            self.publisher.flush(time, &self.tables.sensors);
        }
        self.state = RunState::Gated;
    }
}
