//! A game session: world, clock, simulators and collaborators in one place.
//!
//! The session drives both simulators from its own [`SimClock`]. Scheduler
//! passes run every `scheduler.tick_interval_ms`; travel ticks run every
//! `travel.tick_interval_minutes` while a journey is active.
use serde::Serialize;
use std::hash::Hasher;
use std::time::Duration;
use thiserror::Error;
use twox_hash::XxHash64;

use crate::catalog::Catalog;
use crate::clock::{Clock, SimClock, SimTime};
use crate::config::{ConfigError, SimConfig};
use crate::context::{Collaborators, SharedInventory};
use crate::error::{ActionError, ActionResult, Requirement};
use crate::events::EventBus;
use crate::items::EquipSlot;
use crate::rng::RngBundle;
use crate::scheduler::{
    Buff, CraftedUnit, FacilityQueue, GatherTask, GatherYield, SchedulerReport, TaskScheduler,
};
use crate::skills::{LevelUp, SkillBook};
use crate::travel::{
    EncounterReport, TransportMode, TravelPlan, TravelRecord, TravelSimulator, TravelState,
};
use crate::world::{Coord, MapEntity, World};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("spawn location {0} is not in the world")]
    UnknownSpawn(String),
}

/// Everything that happened during one [`GameSession::advance`] call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdvanceReport {
    pub scheduler_ticks: u64,
    pub travel_ticks: u64,
    pub encounters: Vec<EncounterReport>,
    pub arrivals: Vec<String>,
    pub gathered: Vec<GatherYield>,
    pub crafted: Vec<CraftedUnit>,
    pub paused: Vec<u64>,
    /// Queue entries removed because they could not be processed.
    pub dropped: Vec<u64>,
    pub expired_buffs: Vec<String>,
    pub level_ups: Vec<LevelUp>,
}

impl AdvanceReport {
    fn absorb(&mut self, report: SchedulerReport) {
        self.gathered.extend(report.gathered);
        self.crafted.extend(report.crafted);
        self.paused.extend(report.paused);
        self.dropped.extend(report.dropped);
        self.expired_buffs.extend(report.expired_buffs);
        self.level_ups.extend(report.level_ups);
    }
}

#[derive(Serialize)]
struct Snapshot<'a> {
    now: SimTime,
    travel: &'a TravelState,
    position: Coord,
    history: &'a [TravelRecord],
    skills: &'a SkillBook,
    gathering: Option<&'a GatherTask>,
    queues: Vec<(&'a str, &'a FacilityQueue)>,
    buffs: Vec<&'a Buff>,
    gold: u32,
    items: Vec<(&'a str, u32)>,
    world: &'a World,
}

#[derive(Debug)]
pub struct GameSession {
    seed: u64,
    cfg: SimConfig,
    world: World,
    clock: SimClock,
    travel: TravelSimulator,
    scheduler: TaskScheduler,
    collab: Collaborators,
    next_travel_tick: Option<SimTime>,
}

impl GameSession {
    /// Build a session at the world's spawn point.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid configuration or a missing spawn entity.
    pub fn new(
        seed: u64,
        world: World,
        catalog: Catalog,
        cfg: SimConfig,
        collab: Collaborators,
    ) -> Result<Self, SessionError> {
        cfg.validate()?;
        let Some(spawn) = world.entity(world.spawn()) else {
            return Err(SessionError::UnknownSpawn(world.spawn().to_string()));
        };
        let RngBundle { encounter, gather } = RngBundle::from_user_seed(seed);
        let travel = TravelSimulator::new(spawn, cfg.travel.clone(), encounter, &collab);
        let scheduler = TaskScheduler::new(catalog, cfg.scheduler.clone(), gather, &collab);
        log::info!("session seeded {seed:#x} at {}", world.spawn());
        Ok(Self {
            seed,
            cfg,
            world,
            clock: SimClock::new(),
            travel,
            scheduler,
            collab,
            next_travel_tick: None,
        })
    }

    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    #[must_use]
    pub fn now(&self) -> SimTime {
        self.clock.now()
    }

    #[must_use]
    pub const fn config(&self) -> &SimConfig {
        &self.cfg
    }

    #[must_use]
    pub const fn world(&self) -> &World {
        &self.world
    }

    #[must_use]
    pub const fn travel(&self) -> &TravelSimulator {
        &self.travel
    }

    #[must_use]
    pub const fn scheduler(&self) -> &TaskScheduler {
        &self.scheduler
    }

    #[must_use]
    pub const fn events(&self) -> &EventBus {
        &self.collab.events
    }

    #[must_use]
    pub fn inventory(&self) -> SharedInventory {
        self.collab.inventory.clone()
    }

    pub fn pause(&mut self) {
        self.clock.pause();
    }

    pub fn resume(&mut self) {
        self.clock.resume();
    }

    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.clock.is_paused()
    }

    fn travel_interval(&self) -> Duration {
        SimTime::from_minutes(self.cfg.travel.tick_interval_minutes)
            .saturating_since(SimTime::ZERO)
            .max(Duration::from_millis(1))
    }

    fn current_site(&self) -> Option<&MapEntity> {
        self.travel
            .current_location()
            .and_then(|id| self.world.entity(id))
    }

    // Travel

    /// # Errors
    ///
    /// `AlreadyTraveling` mid-journey.
    pub fn set_transport(&mut self, mode: TransportMode) -> ActionResult {
        self.travel.set_transport(mode)
    }

    /// # Errors
    ///
    /// See [`TravelSimulator::plan_to`].
    pub fn plan_to(&self, destination: &str) -> ActionResult<TravelPlan> {
        self.travel.plan_to(&self.world, destination)
    }

    /// Set off for `destination`. Gathering must be finished or cancelled first.
    ///
    /// # Errors
    ///
    /// `AlreadyGathering`, `AlreadyTraveling` or `InvalidDestination`.
    pub fn start_travel(&mut self, destination: &str) -> ActionResult<TravelPlan> {
        if self.scheduler.gathering().is_some() {
            return Err(ActionError::AlreadyGathering);
        }
        let now = self.clock.now();
        let plan = self.travel.start_travel(&self.world, destination, now)?;
        self.next_travel_tick = Some(now + self.travel_interval());
        Ok(plan)
    }

    // Scheduler

    /// Start gathering at the current location.
    ///
    /// # Errors
    ///
    /// `RequirementsNotMet(NotWhileTraveling)` on the road, otherwise as
    /// [`TaskScheduler::start_gathering`].
    pub fn start_gathering(&mut self, action_id: &str) -> ActionResult<GatherTask> {
        if self.travel.is_traveling() {
            return Err(Requirement::NotWhileTraveling.into());
        }
        let now = self.clock.now();
        let site = self.current_site().cloned();
        self.scheduler.start_gathering(action_id, site.as_ref(), now)
    }

    /// # Errors
    ///
    /// `NotGathering` when idle.
    pub fn cancel_gathering(&mut self) -> ActionResult {
        self.scheduler.cancel_gathering()
    }

    /// Queue a recipe at a facility offered by the current location.
    ///
    /// # Errors
    ///
    /// `RequirementsNotMet` when the facility is not here, otherwise as
    /// [`TaskScheduler::add_to_queue`].
    pub fn add_to_queue(&mut self, recipe_id: &str, quantity: u32, facility: &str) -> ActionResult<u64> {
        if !self
            .current_site()
            .is_some_and(|site| site.has_facility(facility))
        {
            return Err(Requirement::Facility {
                required: facility.to_string(),
            }
            .into());
        }
        let now = self.clock.now();
        self.scheduler.add_to_queue(recipe_id, quantity, facility, now)
    }

    /// # Errors
    ///
    /// See [`TaskScheduler::can_craft`].
    pub fn can_craft(&self, recipe_id: &str, quantity: u32) -> ActionResult {
        self.scheduler.can_craft(recipe_id, quantity)
    }

    /// # Errors
    ///
    /// `EntryNotFound` for unknown entries.
    pub fn cancel_crafting(&mut self, entry_id: u64) -> ActionResult {
        let now = self.clock.now();
        self.scheduler.cancel_crafting(entry_id, now)
    }

    /// # Errors
    ///
    /// See [`TaskScheduler::pause_crafting`].
    pub fn pause_crafting(&mut self, entry_id: u64) -> ActionResult {
        let now = self.clock.now();
        self.scheduler.pause_crafting(entry_id, now)
    }

    /// # Errors
    ///
    /// See [`TaskScheduler::resume_crafting`].
    pub fn resume_crafting(&mut self, entry_id: u64) -> ActionResult {
        let now = self.clock.now();
        self.scheduler.resume_crafting(entry_id, now)
    }

    /// # Errors
    ///
    /// See [`TaskScheduler::use_consumable`].
    pub fn use_consumable(&mut self, item_id: &str) -> ActionResult {
        let now = self.clock.now();
        self.scheduler.use_consumable(item_id, now)
    }

    /// # Errors
    ///
    /// See [`TaskScheduler::equip_item`].
    pub fn equip_item(&mut self, item_id: &str) -> ActionResult<Option<String>> {
        self.scheduler.equip_item(item_id)
    }

    pub fn unequip_item(&mut self, slot: EquipSlot) -> Option<String> {
        self.scheduler.unequip_item(slot)
    }

    // Time

    /// Move simulated time forward by `span`, ticking both simulators.
    ///
    /// Nothing happens while the session is paused. When the scheduler has
    /// nothing to do, time skips straight to the next travel tick.
    pub fn advance(&mut self, span: Duration) -> AdvanceReport {
        let mut report = AdvanceReport::default();
        if self.clock.is_paused() {
            return report;
        }
        let end = self.clock.now() + span;
        let step = Duration::from_millis(self.cfg.scheduler.tick_interval_ms.max(1));
        let travel_interval = self.travel_interval();

        while self.clock.now() < end {
            let now = self.clock.now();
            let mut next = if self.scheduler.is_idle() { end } else { now + step };
            if let Some(travel_at) = self.next_travel_tick {
                next = next.min(travel_at);
            }
            let now = self.clock.advance(next.min(end).saturating_since(now));

            report.absorb(self.scheduler.tick(now, &mut self.world));
            report.scheduler_ticks += 1;

            let Some(travel_at) = self.next_travel_tick else {
                continue;
            };
            if now < travel_at {
                continue;
            }
            let tick = self.travel.tick(now);
            report.travel_ticks += 1;
            report.encounters.extend(tick.encounter);
            if let Some(arrived) = tick.arrived {
                report.arrivals.push(arrived);
                self.next_travel_tick = None;
            } else {
                let mut following = travel_at;
                while following <= now {
                    following = following + travel_interval;
                }
                self.next_travel_tick = Some(following);
            }
        }
        report
    }

    /// Hash of the observable session state, stable for a given seed and
    /// sequence of actions.
    #[must_use]
    pub fn state_digest(&self) -> u64 {
        let inventory = self.collab.inventory.borrow();
        let snapshot = Snapshot {
            now: self.clock.now(),
            travel: self.travel.state(),
            position: self.travel.position(),
            history: self.travel.history(),
            skills: self.scheduler.skills(),
            gathering: self.scheduler.gathering(),
            queues: self.scheduler.queues().collect(),
            buffs: self.scheduler.buffs().iter().collect(),
            gold: inventory.gold(),
            items: self
                .scheduler
                .catalog()
                .items()
                .map(|item| (item.id.as_str(), inventory.item_count(&item.id)))
                .collect(),
            world: &self.world,
        };
        let bytes = match serde_json::to_vec(&snapshot) {
            Ok(bytes) => bytes,
            Err(err) => {
                log::error!("state snapshot failed to serialize: {err}");
                Vec::new()
            }
        };
        let mut hasher = XxHash64::with_seed(self.seed);
        hasher.write(&bytes);
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventKind, GameEvent};
    use crate::inventory::ItemLedger;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn session(seed: u64, ledger: ItemLedger) -> GameSession {
        let cfg = SimConfig {
            travel: crate::config::TravelConfig::without_encounters(),
            ..SimConfig::default()
        };
        let collab = Collaborators::builder()
            .inventory(Rc::new(RefCell::new(ledger)))
            .build();
        GameSession::new(
            seed,
            World::default_world().unwrap(),
            Catalog::default_catalog().unwrap(),
            cfg,
            collab,
        )
        .unwrap()
    }

    #[test]
    fn travel_then_craft_at_destination() {
        let mut game = session(1, ItemLedger::new().stocked("iron_ore", 4));
        assert!(matches!(
            game.add_to_queue("smelt_iron_bar", 1, "smelter"),
            Err(ActionError::RequirementsNotMet(Requirement::Facility { .. }))
        ));
        let plan = game.start_travel("harrowgate").unwrap();
        let minutes = plan.duration_minutes;
        assert!(matches!(
            game.start_gathering("mine_iron"),
            Err(ActionError::RequirementsNotMet(Requirement::NotWhileTraveling))
        ));

        let report = game.advance(Duration::from_secs_f64(minutes.ceil() * 60.0));
        assert_eq!(report.arrivals, vec!["harrowgate".to_string()]);
        assert_eq!(game.travel().current_location(), Some("harrowgate"));

        game.add_to_queue("smelt_iron_bar", 2, "smelter").unwrap();
        let report = game.advance(Duration::from_secs(20));
        assert_eq!(report.crafted.len(), 2);
        assert_eq!(game.inventory().borrow().item_count("iron_bar"), 2);
    }

    #[test]
    fn paused_session_does_not_advance() {
        let mut game = session(2, ItemLedger::new().stocked("iron_ore", 2));
        game.start_travel("harrowgate").unwrap();
        game.pause();
        let report = game.advance(Duration::from_secs(3_600));
        assert_eq!(report, AdvanceReport::default());
        assert_eq!(game.now(), SimTime::ZERO);
        game.resume();
        game.advance(Duration::from_secs(60));
        assert_eq!(game.now(), SimTime::from_secs(60));
        assert!(game.travel().state().progress().unwrap() > 0.0);
    }

    #[test]
    fn gathering_blocks_departure() {
        let mut game = session(3, ItemLedger::new());
        let site = game.world().spawn().to_string();
        assert_eq!(site, "millbrook");
        // Nothing gatherable in a village.
        assert!(game.start_gathering("forage_herbs").is_err());
        game.start_travel("old_wood").unwrap();
        game.advance(Duration::from_secs(24 * 3_600));
        game.start_gathering("forage_herbs").unwrap();
        assert_eq!(game.start_travel("millbrook"), Err(ActionError::AlreadyGathering));
        let report = game.advance(Duration::from_secs(10));
        assert_eq!(report.gathered.len(), 1);
        let kinds: Vec<_> = game.events().drain().iter().map(GameEvent::kind).collect();
        assert!(kinds.contains(&EventKind::GatheringCompleted));
    }

    #[test]
    fn absorb_keeps_every_scheduler_outcome() {
        let mut report = AdvanceReport::default();
        report.absorb(SchedulerReport {
            paused: vec![3],
            dropped: vec![7],
            expired_buffs: vec!["gather_speed".into()],
            ..SchedulerReport::default()
        });
        report.absorb(SchedulerReport {
            dropped: vec![8],
            ..SchedulerReport::default()
        });
        assert_eq!(report.paused, vec![3]);
        assert_eq!(report.dropped, vec![7, 8]);
        assert_eq!(report.expired_buffs, vec!["gather_speed".to_string()]);
    }

    #[test]
    fn long_crafting_runs_keep_the_journal_bounded() {
        let mut game = session(4, ItemLedger::new().stocked("iron_ore", 800));
        let plan = game.start_travel("harrowgate").unwrap();
        game.advance(Duration::from_secs_f64(plan.duration_minutes.ceil() * 60.0));
        game.add_to_queue("smelt_iron_bar", 400, "smelter").unwrap();
        let mut crafted = 0;
        for _ in 0..40 {
            crafted += game.advance(Duration::from_secs(100)).crafted.len();
            assert!(game.events().journal_len() <= crate::constants::EVENT_JOURNAL_CAPACITY);
        }
        assert_eq!(crafted, 400);
        assert_eq!(game.events().journal_len(), crate::constants::EVENT_JOURNAL_CAPACITY);
    }

    #[test]
    fn digest_is_seed_stable() {
        let run = |seed| {
            let mut game = session(seed, ItemLedger::with_gold(100));
            game.start_travel("ashford").unwrap();
            game.advance(Duration::from_secs(3_600));
            game.state_digest()
        };
        assert_eq!(run(9), run(9));
        assert_ne!(run(9), run(10));
    }
}
