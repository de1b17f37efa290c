//! Retrieval of live-building signal values.
//!
//! The aggregator fans a "fetch values at timepoint" request out to every
//! registered agent in registration order. Each agent owns the signal
//! rows of its declared source kind and leaves all others alone. Failure
//! policy is stale-on-failure: an agent that cannot obtain a fresh value
//! keeps the row's previous value and logs a warning rather than writing
//! a placeholder.

pub mod board;
pub mod historian;

use chrono::NaiveDateTime;

use crate::tables::SignalRow;

/// A pluggable source of live signal values.
///
/// `refresh` may be slow or blocking; it runs on the engine callback
/// thread and stalls the simulation by design. Implementations must only
/// mutate rows whose `source` equals their [`kind`](RetrievalAgent::kind),
/// must keep a row's previous value when no fresh value is available, and
/// may write [`SignalValue::Invalid`](crate::tables::SignalValue) only
/// for tags the source reports as permanently unobtainable.
pub trait RetrievalAgent {
    /// Source kind owned by this agent, matched against
    /// [`SignalRow::source`].
    fn kind(&self) -> &str;

    /// Refreshes the owned subset of `signals` for `timepoint`.
    fn refresh(&mut self, signals: &mut [SignalRow], timepoint: NaiveDateTime);
}

/// Fans retrieval out to every registered agent in registration order.
#[derive(Default)]
pub struct RetrievalAggregator {
    agents: Vec<Box<dyn RetrievalAgent>>,
}

impl RetrievalAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an agent; agents run in registration order.
    pub fn register(&mut self, agent: Box<dyn RetrievalAgent>) {
        self.agents.push(agent);
    }

    /// True when no agents are registered.
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Refreshes all signal rows for `timepoint`.
    pub fn refresh(&mut self, signals: &mut [SignalRow], timepoint: NaiveDateTime) {
        for agent in &mut self.agents {
            agent.refresh(signals, timepoint);
        }
    }
}
