//! Simulated time.
//!
//! All game logic reads time from a [`Clock`]; nothing in the core consults the
//! wall clock. Time is kept as whole milliseconds so repeated ticks never drift.
use serde::{Deserialize, Serialize};
use std::ops::Add;
use std::time::Duration;

use crate::numbers::{round_f64_to_u64, u64_to_f64};

const MS_PER_SECOND: f64 = 1_000.0;
const MS_PER_MINUTE: f64 = 60_000.0;

/// Instant on the simulated timeline, in milliseconds since the session began.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SimTime(u64);

impl SimTime {
    pub const ZERO: Self = Self(0);

    #[must_use]
    pub const fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    #[must_use]
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs.saturating_mul(1_000))
    }

    #[must_use]
    pub fn from_minutes(minutes: f64) -> Self {
        Self(round_f64_to_u64(minutes * MS_PER_MINUTE))
    }

    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.0
    }

    #[must_use]
    pub fn as_secs_f64(self) -> f64 {
        u64_to_f64(self.0) / MS_PER_SECOND
    }

    #[must_use]
    pub fn as_minutes(self) -> f64 {
        u64_to_f64(self.0) / MS_PER_MINUTE
    }

    /// Elapsed time since `earlier`, zero when `earlier` lies in the future.
    #[must_use]
    pub fn saturating_since(self, earlier: Self) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }

    #[must_use]
    pub fn saturating_sub(self, span: Duration) -> Self {
        Self(self.0.saturating_sub(duration_millis(span)))
    }
}

impl Add<Duration> for SimTime {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        Self(self.0.saturating_add(duration_millis(rhs)))
    }
}

fn duration_millis(span: Duration) -> u64 {
    u64::try_from(span.as_millis()).unwrap_or(u64::MAX)
}

/// Source of simulated time consumed by the travel simulator and scheduler.
pub trait Clock {
    fn now(&self) -> SimTime;

    /// Current time in simulated minutes.
    fn current_minutes(&self) -> f64 {
        self.now().as_minutes()
    }
}

/// Manually advanced clock owned by the host application.
///
/// While paused, `advance` is ignored, which freezes every timer that reads
/// from this clock.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimClock {
    now: SimTime,
    paused: bool,
}

impl SimClock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn starting_at(now: SimTime) -> Self {
        Self { now, paused: false }
    }

    /// Move the clock forward. Returns the new time.
    pub fn advance(&mut self, span: Duration) -> SimTime {
        if !self.paused {
            self.now = self.now + span;
        }
        self.now
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.paused
    }
}

impl Clock for SimClock {
    fn now(&self) -> SimTime {
        self.now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_conversions_are_consistent() {
        let t = SimTime::from_minutes(1.5);
        assert_eq!(t.as_millis(), 90_000);
        assert!((t.as_secs_f64() - 90.0).abs() < f64::EPSILON);
        assert!((t.as_minutes() - 1.5).abs() < f64::EPSILON);
        assert_eq!(SimTime::from_secs(2), SimTime::from_millis(2_000));
    }

    #[test]
    fn saturating_since_never_goes_negative() {
        let early = SimTime::from_secs(5);
        let late = SimTime::from_secs(8);
        assert_eq!(late.saturating_since(early), Duration::from_secs(3));
        assert_eq!(early.saturating_since(late), Duration::ZERO);
    }

    #[test]
    fn paused_clock_ignores_advance() {
        let mut clock = SimClock::new();
        clock.advance(Duration::from_millis(100));
        clock.pause();
        clock.advance(Duration::from_secs(60));
        assert_eq!(clock.now(), SimTime::from_millis(100));
        clock.resume();
        clock.advance(Duration::from_millis(100));
        assert_eq!(clock.now(), SimTime::from_millis(200));
    }
}
