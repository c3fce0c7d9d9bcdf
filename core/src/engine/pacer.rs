//! Dispatch pacing for rate plans

use std::time::Duration;
use tokio::time::Instant;

use crate::config::DispatchPlan;

/// Computes ideal dispatch instants anchored at the start of a run
///
/// Instant `n` is always `began + n * interval`, never derived from the
/// previous dispatch, so a late dispatch shortens the following wait instead
/// of shifting every later instant.
#[derive(Debug, Clone, Copy)]
pub struct Pacer {
    began: Instant,
    interval: Duration,
    total: u64,
}

impl Pacer {
    /// Create a pacer for `total` instants spaced `interval` apart
    pub fn new(began: Instant, interval: Duration, total: u64) -> Self {
        Self {
            began,
            interval,
            total,
        }
    }

    /// Create a pacer for a rate plan; count plans are not paced
    pub fn for_plan(began: Instant, plan: &DispatchPlan) -> Option<Self> {
        plan.interval()
            .map(|interval| Self::new(began, interval, plan.total_instants()))
    }

    /// Number of instants to dispatch
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Spacing between ideal instants
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Ideal instant of the `done`-th dispatch
    pub fn ideal(&self, done: u64) -> Instant {
        let offset = (self.interval.as_nanos() as u64).saturating_mul(done);
        self.began + Duration::from_nanos(offset)
    }

    /// Time left until the `done`-th dispatch is due, zero when behind
    pub fn wait(&self, done: u64, now: Instant) -> Duration {
        self.ideal(done).saturating_duration_since(now)
    }

    /// How far `now` trails the `done`-th ideal instant
    pub fn lag(&self, done: u64, now: Instant) -> Duration {
        now.saturating_duration_since(self.ideal(done))
    }
}
