//! Simulation configuration.
//!
//! Every field has a serde default so partial JSON overlays work; `validate`
//! rejects values outside documented bounds before a session is built.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{
    ABUNDANCE_DEPLETION_FACTOR, BANDIT_ESCAPE_CHANCE, BANDIT_GOLD_MAX_EXCLUSIVE, BANDIT_GOLD_MIN,
    DEFAULT_PATH_SAFETY, ENCOUNTER_CHANCE_PER_TICK, MIN_GATHER_SECS, SCHEDULER_TICK_INTERVAL_MS,
    SPEED_CARRIAGE_MPH, SPEED_CART_MPH, SPEED_FOOT_MPH, SPEED_HORSE_MPH,
    TOOL_WEAR_PER_GATHER, TRAVEL_TICK_INTERVAL_MINUTES, WEATHER_DELAY_RATIO, WORLD_TO_MILES,
};

/// Errors raised when configuration invariants are violated.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("config JSON parse error: {0}")]
    Parse(String),
    #[error("{field} must be at least {min:.3} (got {value:.3})")]
    MinViolation {
        field: &'static str,
        min: f64,
        value: f64,
    },
    #[error("{field} must be between {min:.3} and {max:.3} (got {value:.3})")]
    RangeViolation {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },
    #[error("bandit gold range invalid (min {min} >= max {max})")]
    BanditGoldRange { min: u32, max: u32 },
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::RangeViolation {
            field,
            min,
            max,
            value,
        })
    }
}

fn check_positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::MinViolation {
            field,
            min: f64::MIN_POSITIVE,
            value,
        })
    }
}

/// How the random-encounter probability is applied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum EncounterRoll {
    /// Flat chance per travel tick; frequency follows tick cadence.
    PerTick { chance: f64 },
    /// Chance per simulated minute, compounded over the minutes a tick spans.
    PerMinute { chance: f64 },
}

impl EncounterRoll {
    /// Probability that at least one encounter fires over `elapsed_minutes`.
    #[must_use]
    pub fn probability(self, elapsed_minutes: f64) -> f64 {
        match self {
            Self::PerTick { chance } => chance,
            Self::PerMinute { chance } => {
                if elapsed_minutes <= 0.0 {
                    0.0
                } else {
                    1.0 - (1.0 - chance).powf(elapsed_minutes)
                }
            }
        }
    }

    #[must_use]
    pub const fn chance(self) -> f64 {
        match self {
            Self::PerTick { chance } | Self::PerMinute { chance } => chance,
        }
    }
}

impl Default for EncounterRoll {
    fn default() -> Self {
        Self::PerTick {
            chance: ENCOUNTER_CHANCE_PER_TICK,
        }
    }
}

/// Travel speeds by transport mode, in miles per hour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportSpeeds {
    #[serde(default = "TransportSpeeds::default_foot")]
    pub foot: f64,
    #[serde(default = "TransportSpeeds::default_horse")]
    pub horse: f64,
    #[serde(default = "TransportSpeeds::default_cart")]
    pub cart: f64,
    #[serde(default = "TransportSpeeds::default_carriage")]
    pub carriage: f64,
}

impl TransportSpeeds {
    const fn default_foot() -> f64 {
        SPEED_FOOT_MPH
    }

    const fn default_horse() -> f64 {
        SPEED_HORSE_MPH
    }

    const fn default_cart() -> f64 {
        SPEED_CART_MPH
    }

    const fn default_carriage() -> f64 {
        SPEED_CARRIAGE_MPH
    }

    fn validate(&self) -> Result<(), ConfigError> {
        check_positive("travel.speeds.foot", self.foot)?;
        check_positive("travel.speeds.horse", self.horse)?;
        check_positive("travel.speeds.cart", self.cart)?;
        check_positive("travel.speeds.carriage", self.carriage)
    }
}

impl Default for TransportSpeeds {
    fn default() -> Self {
        Self {
            foot: Self::default_foot(),
            horse: Self::default_horse(),
            cart: Self::default_cart(),
            carriage: Self::default_carriage(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TravelConfig {
    #[serde(default = "TravelConfig::default_world_to_miles")]
    pub world_to_miles: f64,
    #[serde(default)]
    pub speeds: TransportSpeeds,
    #[serde(default = "TravelConfig::default_safety")]
    pub default_safety: f64,
    #[serde(default)]
    pub encounter: EncounterRoll,
    #[serde(default = "TravelConfig::default_bandit_escape_chance")]
    pub bandit_escape_chance: f64,
    #[serde(default = "TravelConfig::default_bandit_gold_min")]
    pub bandit_gold_min: u32,
    /// Exclusive upper bound.
    #[serde(default = "TravelConfig::default_bandit_gold_max")]
    pub bandit_gold_max: u32,
    #[serde(default = "TravelConfig::default_weather_delay_ratio")]
    pub weather_delay_ratio: f64,
    #[serde(default = "TravelConfig::default_tick_interval_minutes")]
    pub tick_interval_minutes: f64,
}

impl TravelConfig {
    const fn default_world_to_miles() -> f64 {
        WORLD_TO_MILES
    }

    const fn default_safety() -> f64 {
        DEFAULT_PATH_SAFETY
    }

    const fn default_bandit_escape_chance() -> f64 {
        BANDIT_ESCAPE_CHANCE
    }

    const fn default_bandit_gold_min() -> u32 {
        BANDIT_GOLD_MIN
    }

    const fn default_bandit_gold_max() -> u32 {
        BANDIT_GOLD_MAX_EXCLUSIVE
    }

    const fn default_weather_delay_ratio() -> f64 {
        WEATHER_DELAY_RATIO
    }

    const fn default_tick_interval_minutes() -> f64 {
        TRAVEL_TICK_INTERVAL_MINUTES
    }

    /// Configuration with random encounters switched off.
    #[must_use]
    pub fn without_encounters() -> Self {
        Self {
            encounter: EncounterRoll::PerTick { chance: 0.0 },
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        check_positive("travel.world_to_miles", self.world_to_miles)?;
        self.speeds.validate()?;
        check_range("travel.default_safety", self.default_safety, 0.0, 1.0)?;
        check_range("travel.encounter.chance", self.encounter.chance(), 0.0, 1.0)?;
        check_range(
            "travel.bandit_escape_chance",
            self.bandit_escape_chance,
            0.0,
            1.0,
        )?;
        if self.bandit_gold_min >= self.bandit_gold_max {
            return Err(ConfigError::BanditGoldRange {
                min: self.bandit_gold_min,
                max: self.bandit_gold_max,
            });
        }
        check_range(
            "travel.weather_delay_ratio",
            self.weather_delay_ratio,
            0.0,
            5.0,
        )?;
        check_positive("travel.tick_interval_minutes", self.tick_interval_minutes)
    }
}

impl Default for TravelConfig {
    fn default() -> Self {
        Self {
            world_to_miles: Self::default_world_to_miles(),
            speeds: TransportSpeeds::default(),
            default_safety: Self::default_safety(),
            encounter: EncounterRoll::default(),
            bandit_escape_chance: Self::default_bandit_escape_chance(),
            bandit_gold_min: Self::default_bandit_gold_min(),
            bandit_gold_max: Self::default_bandit_gold_max(),
            weather_delay_ratio: Self::default_weather_delay_ratio(),
            tick_interval_minutes: Self::default_tick_interval_minutes(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "SchedulerConfig::default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "SchedulerConfig::default_tool_wear")]
    pub tool_wear_per_gather: u32,
    #[serde(default = "SchedulerConfig::default_depletion_factor")]
    pub depletion_factor: f64,
    #[serde(default = "SchedulerConfig::default_min_gather_secs")]
    pub min_gather_secs: f64,
}

impl SchedulerConfig {
    const fn default_tick_interval_ms() -> u64 {
        SCHEDULER_TICK_INTERVAL_MS
    }

    const fn default_tool_wear() -> u32 {
        TOOL_WEAR_PER_GATHER
    }

    const fn default_depletion_factor() -> f64 {
        ABUNDANCE_DEPLETION_FACTOR
    }

    const fn default_min_gather_secs() -> f64 {
        MIN_GATHER_SECS
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::MinViolation {
                field: "scheduler.tick_interval_ms",
                min: 1.0,
                value: 0.0,
            });
        }
        check_range(
            "scheduler.depletion_factor",
            self.depletion_factor,
            0.0,
            1.0,
        )?;
        check_positive("scheduler.min_gather_secs", self.min_gather_secs)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: Self::default_tick_interval_ms(),
            tool_wear_per_gather: Self::default_tool_wear(),
            depletion_factor: Self::default_depletion_factor(),
            min_gather_secs: Self::default_min_gather_secs(),
        }
    }
}

/// Top-level simulation configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    #[serde(default)]
    pub travel: TravelConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl SimConfig {
    /// Parse and validate configuration from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or a value is out of range.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let cfg: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when any field violates the documented bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.travel.validate()?;
        self.scheduler.validate()
    }
}
