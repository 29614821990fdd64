//! Random road encounters.
//!
//! Rolling and resolving are pure functions over an injected RNG; the
//! simulator applies the resolved effect to the journey and inventory.
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::TravelConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncounterKind {
    Merchant,
    Bandits,
    GuardPatrol,
    Weather,
}

impl EncounterKind {
    pub const ALL: [Self; 4] = [Self::Merchant, Self::Bandits, Self::GuardPatrol, Self::Weather];
}

/// What an encounter decided before it touches game state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution {
    MerchantMet,
    BanditsRepelled,
    /// Bandits demand this much gold.
    Robbery { demand: u32 },
    PatrolPassed,
    /// Remaining travel time grows by this fraction.
    Delay { ratio: f64 },
}

/// Applied effect, as reported to the event sink.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum EncounterOutcome {
    MerchantMet,
    BanditsRepelled,
    Robbed { demanded: u32, lost: u32 },
    PatrolPassed,
    Delayed { extra_minutes: f64 },
}

/// Decide whether an encounter fires and which one.
pub fn roll_encounter<R: Rng>(probability: f64, rng: &mut R) -> Option<EncounterKind> {
    if !rng.gen_bool(probability.clamp(0.0, 1.0)) {
        return None;
    }
    let idx = rng.gen_range(0..EncounterKind::ALL.len());
    EncounterKind::ALL.get(idx).copied()
}

/// Resolve the sub-rolls of an encounter.
pub fn resolve_encounter<R: Rng>(
    kind: EncounterKind,
    cfg: &TravelConfig,
    rng: &mut R,
) -> Resolution {
    match kind {
        EncounterKind::Merchant => Resolution::MerchantMet,
        EncounterKind::Bandits => resolve_bandits(cfg, rng),
        EncounterKind::GuardPatrol => Resolution::PatrolPassed,
        EncounterKind::Weather => Resolution::Delay {
            ratio: cfg.weather_delay_ratio,
        },
    }
}

fn resolve_bandits<R: Rng>(cfg: &TravelConfig, rng: &mut R) -> Resolution {
    if rng.gen_bool(cfg.bandit_escape_chance.clamp(0.0, 1.0)) {
        return Resolution::BanditsRepelled;
    }
    let demand = rng.gen_range(cfg.bandit_gold_min..cfg.bandit_gold_max);
    Resolution::Robbery { demand }
}
