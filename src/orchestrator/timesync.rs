//! Canonical simulation timestamps and real-time pacing.

use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use chrono::{Duration, NaiveDate, NaiveDateTime};

use crate::config::PacingConfig;
use crate::sim::api::EngineDate;

/// Wall-clock source, injectable so pacing is testable with a
/// deterministic clock.
pub trait Clock {
    fn now(&self) -> NaiveDateTime;
    fn sleep(&self, duration: StdDuration);
}

/// The real wall clock; sleeps block the calling (engine callback) thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct WallClock;

impl Clock for WallClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }

    fn sleep(&self, duration: StdDuration) {
        std::thread::sleep(duration);
    }
}

/// Deterministic clock for tests: `sleep` advances simulated time instead
/// of blocking, and each call is counted.
#[derive(Debug, Clone)]
pub struct FakeClock {
    inner: Arc<Mutex<FakeClockState>>,
}

#[derive(Debug)]
struct FakeClockState {
    now: NaiveDateTime,
    sleeps: usize,
}

impl FakeClock {
    pub fn at(now: NaiveDateTime) -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeClockState { now, sleeps: 0 })),
        }
    }

    /// Number of sleep calls observed so far.
    pub fn sleep_count(&self) -> usize {
        self.inner.lock().map(|s| s.sleeps).unwrap_or(0)
    }
}

impl Clock for FakeClock {
    fn now(&self) -> NaiveDateTime {
        self.inner.lock().map(|s| s.now).unwrap_or_default()
    }

    fn sleep(&self, duration: StdDuration) {
        if let Ok(mut state) = self.inner.lock() {
            state.sleeps += 1;
            state.now += Duration::from_std(duration).unwrap_or(Duration::zero());
        }
    }
}

/// Converts engine-reported date fields into canonical timestamps and
/// holds the simulation back until wall clock catches up.
#[derive(Debug, Clone)]
pub struct TimeSynchronizer<C: Clock> {
    clock: C,
    /// Year applied to every canonical timestamp. Engine-reported years
    /// carry weather-file artifacts and are never used.
    start_year: i32,
    buffer: Duration,
    poll: StdDuration,
}

impl<C: Clock> TimeSynchronizer<C> {
    pub fn new(clock: C, start_year: i32, pacing: &PacingConfig) -> Self {
        Self {
            clock,
            start_year,
            buffer: Duration::minutes(pacing.buffer_minutes),
            poll: StdDuration::from_secs(pacing.poll_seconds),
        }
    }

    /// Builds the canonical timestamp for an engine-reported date.
    ///
    /// Engines occasionally report `hour == 24` or `minute == 60` as
    /// end-of-period markers; each is clamped to its maximum and the
    /// excess carried forward after the timestamp is constructed.
    /// Returns `None` for fields no calendar can hold (bad month/day),
    /// which callers treat as fatal.
    // TODO: handle a run crossing 12/31 -> 1/1; the pinned start year
    // makes January timestamps land in the starting year.
    pub fn canonical_time(&self, date: EngineDate) -> Option<NaiveDateTime> {
        let mut carry = Duration::zero();

        let hour = if date.hour >= 24 {
            carry += Duration::hours(1);
            23
        } else {
            date.hour
        };
        let minute = if date.minute >= 60 {
            carry += Duration::minutes(1);
            59
        } else {
            date.minute
        };

        let timestamp = NaiveDate::from_ymd_opt(self.start_year, date.month, date.day)?
            .and_hms_opt(hour, minute, 0)?;
        Some(timestamp + carry)
    }

    /// Blocks until wall clock is at or past `sim_time + buffer`.
    ///
    /// This intentionally stalls the entire simulation: a timestep must
    /// not consume a live timepoint before that timepoint has occurred.
    /// For historical replays the threshold is already in the past and
    /// the call returns immediately.
    pub fn wait_until_ready(&self, sim_time: NaiveDateTime) {
        let threshold = sim_time + self.buffer;
        while self.clock.now() < threshold {
            self.clock.sleep(self.poll);
        }
    }
}
