//! Journeys between map entities.
//!
//! The simulator owns a single [`TravelState`]. Progress is derived from the
//! simulated clock against an anchor that is rebased whenever the remaining
//! time changes, so delays never move progress backwards.
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::clock::SimTime;
use crate::config::{TransportSpeeds, TravelConfig};
use crate::constants::{
    LOG_TARGET_TRAVEL, MINUTES_PER_HOUR, SAFETY_CEILING, SAFETY_DURATION_FACTOR, SAFETY_FLOOR,
};
use crate::context::{Collaborators, SharedInventory};
use crate::error::{ActionError, ActionResult};
use crate::events::{EventBus, GameEvent};
use crate::rng::StreamRng;
use crate::world::{Coord, MapEntity, Path, World};

pub mod encounter;

pub use encounter::{EncounterKind, EncounterOutcome, Resolution};

/// How the party moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportMode {
    #[default]
    Foot,
    Horse,
    Cart,
    Carriage,
}

impl TransportMode {
    pub const ALL: [Self; 4] = [Self::Foot, Self::Horse, Self::Cart, Self::Carriage];

    /// Speed in miles per hour.
    #[must_use]
    pub const fn speed_mph(self, speeds: &TransportSpeeds) -> f64 {
        match self {
            Self::Foot => speeds.foot,
            Self::Horse => speeds.horse,
            Self::Cart => speeds.cart,
            Self::Carriage => speeds.carriage,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Foot => "on foot",
            Self::Horse => "on horseback",
            Self::Cart => "by cart",
            Self::Carriage => "by carriage",
        }
    }
}

/// Cost of a trip, computed before it starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TravelPlan {
    pub origin: String,
    pub destination: String,
    pub origin_position: Coord,
    pub destination_position: Coord,
    pub distance_miles: f64,
    pub path: Path,
    /// Path safety clamped to the usable range.
    pub safety: f64,
    pub duration_minutes: f64,
    pub transport: TransportMode,
}

/// Compute distance, road and duration between two entities.
///
/// Safer roads are modestly faster: duration scales by `1 - safety * 0.1`.
/// `Path::speed_multiplier` is carried on the plan but does not enter the
/// duration.
///
/// # Errors
///
/// `InvalidDestination` when either id is unknown or both are the same place.
pub fn compute_travel_plan(
    world: &World,
    origin: &str,
    destination: &str,
    transport: TransportMode,
    cfg: &TravelConfig,
) -> ActionResult<TravelPlan> {
    let Some(from) = world.entity(origin) else {
        return Err(ActionError::InvalidDestination(origin.to_string()));
    };
    let Some(to) = world.entity(destination) else {
        return Err(ActionError::InvalidDestination(destination.to_string()));
    };
    if from.id() == to.id() {
        return Err(ActionError::InvalidDestination(destination.to_string()));
    }
    Ok(plan_between(world, from, to, transport, cfg))
}

fn plan_between(
    world: &World,
    from: &MapEntity,
    to: &MapEntity,
    transport: TransportMode,
    cfg: &TravelConfig,
) -> TravelPlan {
    let distance_miles = from.position().distance_to(to.position()) * cfg.world_to_miles;
    let path = world
        .direct_path(from.id(), to.id())
        .cloned()
        .unwrap_or_else(|| Path::synthetic(from, to, cfg.default_safety));
    let safety = path.safety.clamp(SAFETY_FLOOR, SAFETY_CEILING);
    let hours = distance_miles / transport.speed_mph(&cfg.speeds);
    let duration_minutes = hours * SAFETY_DURATION_FACTOR.mul_add(-safety, 1.0) * MINUTES_PER_HOUR;
    TravelPlan {
        origin: from.id().to_string(),
        destination: to.id().to_string(),
        origin_position: from.position(),
        destination_position: to.position(),
        distance_miles,
        path,
        safety,
        duration_minutes,
        transport,
    }
}

const SECS_PER_MINUTE: f64 = 60.0;

fn as_minutes(span: Duration) -> f64 {
    span.as_secs_f64() / SECS_PER_MINUTE
}

/// An active trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Journey {
    pub plan: TravelPlan,
    pub started_at: SimTime,
    /// Planned duration plus every delay applied so far.
    pub duration_minutes: f64,
    pub progress: f64,
    anchor_at: SimTime,
    anchor_progress: f64,
    remaining_at_anchor: Duration,
    last_tick: SimTime,
}

impl Journey {
    fn new(plan: TravelPlan, now: SimTime) -> Self {
        let remaining_at_anchor = SimTime::from_minutes(plan.duration_minutes)
            .saturating_since(SimTime::ZERO);
        Self {
            duration_minutes: plan.duration_minutes,
            plan,
            started_at: now,
            progress: 0.0,
            anchor_at: now,
            anchor_progress: 0.0,
            remaining_at_anchor,
            last_tick: now,
        }
    }

    fn remaining_at(&self, now: SimTime) -> Duration {
        self.remaining_at_anchor
            .saturating_sub(now.saturating_since(self.anchor_at))
    }

    fn progress_at(&self, now: SimTime) -> f64 {
        let total = self.remaining_at_anchor.as_secs_f64();
        if total <= 0.0 || self.remaining_at(now).is_zero() {
            return 1.0;
        }
        let fraction = now.saturating_since(self.anchor_at).as_secs_f64() / total;
        let progress = (1.0 - self.anchor_progress).mul_add(fraction, self.anchor_progress);
        progress.clamp(self.progress, 1.0)
    }

    /// Stretch the time left by `ratio`, keeping progress where it is.
    fn extend_remaining(&mut self, now: SimTime, ratio: f64) -> f64 {
        let remaining = self.remaining_at(now);
        let extra = remaining.mul_f64(ratio.max(0.0));
        self.anchor_progress = self.progress;
        self.anchor_at = now;
        self.remaining_at_anchor = remaining + extra;
        let extra_minutes = as_minutes(extra);
        self.duration_minutes += extra_minutes;
        extra_minutes
    }
}

/// Where the party is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TravelState {
    Idle { location: String },
    Traveling(Box<Journey>),
}

impl TravelState {
    #[must_use]
    pub const fn is_traveling(&self) -> bool {
        matches!(self, Self::Traveling(_))
    }

    #[must_use]
    pub fn destination(&self) -> Option<&str> {
        match self {
            Self::Idle { .. } => None,
            Self::Traveling(journey) => Some(&journey.plan.destination),
        }
    }

    #[must_use]
    pub fn progress(&self) -> Option<f64> {
        match self {
            Self::Idle { .. } => None,
            Self::Traveling(journey) => Some(journey.progress),
        }
    }
}

/// Completed trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TravelRecord {
    pub from: String,
    pub to: String,
    pub duration_minutes: f64,
    pub timestamp: SimTime,
}

/// Encounter applied during a tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncounterReport {
    pub kind: EncounterKind,
    pub outcome: EncounterOutcome,
}

/// What one travel tick did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TravelTick {
    pub progress: Option<f64>,
    pub encounter: Option<EncounterReport>,
    pub arrived: Option<String>,
}

/// Advances a single journey over simulated time.
pub struct TravelSimulator<R: Rng = StreamRng> {
    cfg: TravelConfig,
    state: TravelState,
    transport: TransportMode,
    position: Coord,
    history: Vec<TravelRecord>,
    rng: R,
    inventory: SharedInventory,
    events: EventBus,
}

impl<R: Rng> fmt::Debug for TravelSimulator<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TravelSimulator")
            .field("state", &self.state)
            .field("transport", &self.transport)
            .field("position", &self.position)
            .field("history", &self.history.len())
            .finish_non_exhaustive()
    }
}

impl<R: Rng> TravelSimulator<R> {
    /// Start idle at `start`.
    pub fn new(start: &MapEntity, cfg: TravelConfig, rng: R, collab: &Collaborators) -> Self {
        Self {
            cfg,
            state: TravelState::Idle {
                location: start.id().to_string(),
            },
            transport: TransportMode::default(),
            position: start.position(),
            history: Vec::new(),
            rng,
            inventory: collab.inventory.clone(),
            events: collab.events.clone(),
        }
    }

    #[must_use]
    pub const fn state(&self) -> &TravelState {
        &self.state
    }

    #[must_use]
    pub const fn is_traveling(&self) -> bool {
        self.state.is_traveling()
    }

    /// Current location while idle.
    #[must_use]
    pub fn current_location(&self) -> Option<&str> {
        match &self.state {
            TravelState::Idle { location } => Some(location),
            TravelState::Traveling(_) => None,
        }
    }

    #[must_use]
    pub const fn transport(&self) -> TransportMode {
        self.transport
    }

    /// Change transport mode between journeys.
    ///
    /// # Errors
    ///
    /// `AlreadyTraveling` while a journey is in progress.
    pub fn set_transport(&mut self, mode: TransportMode) -> ActionResult {
        if self.is_traveling() {
            return Err(ActionError::AlreadyTraveling);
        }
        self.transport = mode;
        Ok(())
    }

    /// Interpolated map position.
    #[must_use]
    pub const fn position(&self) -> Coord {
        self.position
    }

    #[must_use]
    pub fn history(&self) -> &[TravelRecord] {
        &self.history
    }

    /// Simulated minutes left on the current journey.
    #[must_use]
    pub fn eta_minutes(&self, now: SimTime) -> Option<f64> {
        match &self.state {
            TravelState::Idle { .. } => None,
            TravelState::Traveling(journey) => {
                Some(as_minutes(journey.remaining_at(now)))
            }
        }
    }

    #[must_use]
    pub const fn config(&self) -> &TravelConfig {
        &self.cfg
    }

    /// Preview a trip from the current location with the current transport.
    ///
    /// # Errors
    ///
    /// `AlreadyTraveling` mid-journey, `InvalidDestination` for unknown or
    /// identical endpoints.
    pub fn plan_to(&self, world: &World, destination: &str) -> ActionResult<TravelPlan> {
        let Some(origin) = self.current_location() else {
            return Err(ActionError::AlreadyTraveling);
        };
        compute_travel_plan(world, origin, destination, self.transport, &self.cfg)
    }

    /// Begin a journey to `destination`.
    ///
    /// # Errors
    ///
    /// `AlreadyTraveling` when a journey is active; `InvalidDestination` when
    /// the destination does not resolve.
    pub fn start_travel(
        &mut self,
        world: &World,
        destination: &str,
        now: SimTime,
    ) -> ActionResult<TravelPlan> {
        let plan = self.plan_to(world, destination)?;
        log::info!(
            target: LOG_TARGET_TRAVEL,
            "travel {} -> {} {} ({:.1} mi, {:.1} min, safety {:.2})",
            plan.origin,
            plan.destination,
            plan.transport.label(),
            plan.distance_miles,
            plan.duration_minutes,
            plan.safety
        );
        self.events.emit(GameEvent::TravelStarted {
            from: plan.origin.clone(),
            to: plan.destination.clone(),
            duration_minutes: plan.duration_minutes,
            at: now,
        });
        self.state = TravelState::Traveling(Box::new(Journey::new(plan.clone(), now)));
        Ok(plan)
    }

    /// Advance the active journey to `now`.
    ///
    /// Encounters are rolled once per call on ticks that do not complete the
    /// journey. Arrival resolves on the tick where progress reaches 1.
    pub fn tick(&mut self, now: SimTime) -> TravelTick {
        let TravelState::Traveling(journey) = &mut self.state else {
            return TravelTick::default();
        };
        let elapsed_minutes = as_minutes(now.saturating_since(journey.last_tick));
        journey.last_tick = journey.last_tick.max(now);
        journey.progress = journey.progress_at(now);
        self.position = journey
            .plan
            .origin_position
            .lerp(journey.plan.destination_position, journey.progress);

        if journey.progress >= 1.0 {
            let arrived = self.arrive(now);
            return TravelTick {
                progress: Some(1.0),
                encounter: None,
                arrived,
            };
        }

        let probability = self.cfg.encounter.probability(elapsed_minutes);
        let encounter = encounter::roll_encounter(probability, &mut self.rng)
            .map(|kind| self.apply_encounter(kind, now));
        TravelTick {
            progress: self.state.progress(),
            encounter,
            arrived: None,
        }
    }

    fn apply_encounter(&mut self, kind: EncounterKind, now: SimTime) -> EncounterReport {
        let outcome = match encounter::resolve_encounter(kind, &self.cfg, &mut self.rng) {
            Resolution::MerchantMet => EncounterOutcome::MerchantMet,
            Resolution::BanditsRepelled => EncounterOutcome::BanditsRepelled,
            Resolution::PatrolPassed => EncounterOutcome::PatrolPassed,
            Resolution::Robbery { demand } => {
                let lost = self.inventory.borrow_mut().remove_gold(demand);
                log::warn!(target: LOG_TARGET_TRAVEL, "bandits demanded {demand} gold, took {lost}");
                EncounterOutcome::Robbed {
                    demanded: demand,
                    lost,
                }
            }
            Resolution::Delay { ratio } => {
                let extra_minutes = match &mut self.state {
                    TravelState::Traveling(journey) => journey.extend_remaining(now, ratio),
                    TravelState::Idle { .. } => 0.0,
                };
                log::info!(target: LOG_TARGET_TRAVEL, "weather delay adds {extra_minutes:.1} min");
                EncounterOutcome::Delayed { extra_minutes }
            }
        };
        log::debug!(target: LOG_TARGET_TRAVEL, "encounter {kind:?}: {outcome:?}");
        self.events.emit(GameEvent::EncounterTriggered { kind, outcome, at: now });
        EncounterReport { kind, outcome }
    }

    fn arrive(&mut self, now: SimTime) -> Option<String> {
        let TravelState::Traveling(journey) = &self.state else {
            return None;
        };
        let record = TravelRecord {
            from: journey.plan.origin.clone(),
            to: journey.plan.destination.clone(),
            duration_minutes: journey.duration_minutes,
            timestamp: now,
        };
        self.position = journey.plan.destination_position;
        self.state = TravelState::Idle {
            location: record.to.clone(),
        };
        log::info!(
            target: LOG_TARGET_TRAVEL,
            "arrived at {} after {:.1} min",
            record.to,
            record.duration_minutes
        );
        self.events.emit(GameEvent::Arrived {
            from: record.from.clone(),
            location: record.to.clone(),
            duration_minutes: record.duration_minutes,
            at: now,
        });
        let destination = record.to.clone();
        self.history.push(record);
        Some(destination)
    }
}
