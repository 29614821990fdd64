//! Timed stat buffs, at most one per stat.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::clock::SimTime;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Buff {
    pub source: String,
    pub stat: String,
    pub magnitude: f64,
    pub duration: Duration,
    pub started_at: SimTime,
}

impl Buff {
    #[must_use]
    pub fn is_expired(&self, now: SimTime) -> bool {
        now.saturating_since(self.started_at) > self.duration
    }

    #[must_use]
    pub fn remaining(&self, now: SimTime) -> Duration {
        self.duration
            .saturating_sub(now.saturating_since(self.started_at))
    }
}

/// Active buffs keyed by stat.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuffList {
    active: BTreeMap<String, Buff>,
}

impl BuffList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a buff, or refresh the one already on its stat.
    ///
    /// A refresh keeps the larger duration and magnitude and restarts the
    /// timer at `buff.started_at`. Returns true when it refreshed.
    pub fn apply(&mut self, buff: Buff) -> bool {
        match self.active.get_mut(&buff.stat) {
            Some(existing) => {
                existing.duration = existing.duration.max(buff.duration);
                existing.magnitude = existing.magnitude.max(buff.magnitude);
                existing.started_at = buff.started_at;
                existing.source = buff.source;
                true
            }
            None => {
                self.active.insert(buff.stat.clone(), buff);
                false
            }
        }
    }

    /// Remove and return every buff whose elapsed time exceeds its duration.
    pub fn prune(&mut self, now: SimTime) -> Vec<Buff> {
        let expired: Vec<String> = self
            .active
            .values()
            .filter(|buff| buff.is_expired(now))
            .map(|buff| buff.stat.clone())
            .collect();
        expired
            .iter()
            .filter_map(|stat| self.active.remove(stat))
            .collect()
    }

    #[must_use]
    pub fn get(&self, stat: &str) -> Option<&Buff> {
        self.active.get(stat)
    }

    /// Magnitude on `stat`, zero when none is active.
    #[must_use]
    pub fn total(&self, stat: &str) -> f64 {
        self.active.get(stat).map_or(0.0, |buff| buff.magnitude)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Buff> {
        self.active.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.active.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buff(stat: &str, magnitude: f64, secs: u64, at: u64) -> Buff {
        Buff {
            source: "stew".into(),
            stat: stat.into(),
            magnitude,
            duration: Duration::from_secs(secs),
            started_at: SimTime::from_secs(at),
        }
    }

    #[test]
    fn same_stat_refreshes_instead_of_stacking() {
        let mut list = BuffList::new();
        assert!(!list.apply(buff("gather_speed", 0.1, 60, 0)));
        assert!(list.apply(buff("gather_speed", 0.05, 30, 20)));
        assert_eq!(list.len(), 1);
        let active = list.get("gather_speed").unwrap();
        assert_eq!(active.duration, Duration::from_secs(60));
        assert_eq!(active.started_at, SimTime::from_secs(20));
        assert!((list.total("gather_speed") - 0.1).abs() < f64::EPSILON);
        assert!(list.total("strength").abs() < f64::EPSILON);
    }

    #[test]
    fn prune_removes_only_expired() {
        let mut list = BuffList::new();
        list.apply(buff("gather_speed", 0.1, 10, 0));
        list.apply(buff("craft_speed", 0.2, 60, 0));
        assert!(list.prune(SimTime::from_secs(10)).is_empty());
        let expired = list.prune(SimTime::from_millis(10_100));
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].stat, "gather_speed");
        assert_eq!(list.len(), 1);
    }
}
