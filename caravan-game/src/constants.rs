//! Centralized balance and tuning constants for Caravan simulation logic.
//!
//! These values define the deterministic math for the core simulation.
//! Configurable knobs in [`crate::config`] default to these; everything else
//! can only be adjusted via reviewed code changes.

// Travel -------------------------------------------------------------------
/// Map coordinate units per mile.
pub const WORLD_TO_MILES: f64 = 0.1;
pub const SPEED_FOOT_MPH: f64 = 3.0;
pub const SPEED_HORSE_MPH: f64 = 8.0;
pub const SPEED_CART_MPH: f64 = 4.0;
pub const SPEED_CARRIAGE_MPH: f64 = 6.0;
/// Safety assigned to synthetic straight-line paths.
pub const DEFAULT_PATH_SAFETY: f64 = 0.5;
pub const SAFETY_FLOOR: f64 = 0.1;
pub const SAFETY_CEILING: f64 = 1.0;
/// Fraction of the trip shaved off per unit of safety.
pub const SAFETY_DURATION_FACTOR: f64 = 0.1;
pub const MINUTES_PER_HOUR: f64 = 60.0;
pub const TRAVEL_TICK_INTERVAL_MINUTES: f64 = 1.0;

// Encounters ---------------------------------------------------------------
pub const ENCOUNTER_CHANCE_PER_TICK: f64 = 0.01;
pub const BANDIT_ESCAPE_CHANCE: f64 = 0.5;
pub const BANDIT_GOLD_MIN: u32 = 10;
/// Exclusive upper bound of the bandit gold penalty.
pub const BANDIT_GOLD_MAX_EXCLUSIVE: u32 = 60;
pub const WEATHER_DELAY_RATIO: f64 = 0.2;

// Scheduler ----------------------------------------------------------------
pub const SCHEDULER_TICK_INTERVAL_MS: u64 = 100;
pub const TOOL_WEAR_PER_GATHER: u32 = 1;
pub const ABUNDANCE_DEPLETION_FACTOR: f64 = 0.9;
pub const MIN_GATHER_SECS: f64 = 1.0;
pub const SKILL_BONUS_PER_LEVEL: f64 = 0.1;
/// Buff stat that shortens gather time.
pub const GATHER_SPEED_STAT: &str = "gather_speed";

// Skills -------------------------------------------------------------------
pub const MAX_SKILL_LEVEL: u8 = 10;
/// Cumulative experience required to reach each level (index = level).
pub const SKILL_XP_TABLE: [u32; 11] = [0, 50, 150, 300, 500, 800, 1_200, 1_700, 2_300, 3_000, 4_000];

// Events -------------------------------------------------------------------
/// Events kept for [`crate::events::EventBus::drain`] before the oldest are dropped.
pub const EVENT_JOURNAL_CAPACITY: usize = 256;

// Logging keys -------------------------------------------------------------
pub(crate) const LOG_TARGET_TRAVEL: &str = "caravan::travel";
pub(crate) const LOG_TARGET_SCHEDULER: &str = "caravan::scheduler";
pub(crate) const LOG_TARGET_EVENTS: &str = "caravan::events";
