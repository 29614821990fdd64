//! Gathering, crafting queues, buffs and skills, advanced by polling.
//!
//! One gather task may run at a time. Every facility has its own queue and all
//! facilities advance independently on each tick. A fault in one facility's
//! head entry is logged and that entry dropped; other queues keep running.
use rand::Rng;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::catalog::Catalog;
use crate::clock::SimTime;
use crate::config::SchedulerConfig;
use crate::constants::{GATHER_SPEED_STAT, LOG_TARGET_SCHEDULER};
use crate::context::{Collaborators, SharedEquipment, SharedInventory};
use crate::error::{ActionError, ActionResult, Requirement};
use crate::events::{EventBus, GameEvent};
use crate::items::EquipSlot;
use crate::rng::StreamRng;
use crate::skills::{LevelUp, SkillBook, SkillType};
use crate::world::{MapEntity, World};

pub mod buffs;
pub mod craft;
pub mod gather;

pub use buffs::{Buff, BuffList};
pub use craft::{CraftQueueEntry, CraftStatus, FacilityQueue, Recipe, RecipeInput};
pub use gather::{
    GatherAction, GatherTask, NoPerks, PerkHook, ToolBonus, YieldRange, calculate_gather_time,
    calculate_gather_yield, can_gather,
};

/// Why a queue head could not be processed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CraftFault {
    #[error("entry {entry_id} references unknown recipe {recipe}")]
    UnknownRecipe { entry_id: u64, recipe: String },
    #[error("recipe {0} has no usable duration")]
    InvalidTiming(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatherYield {
    pub action: String,
    pub item: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CraftedUnit {
    pub facility: String,
    pub entry_id: u64,
    pub recipe: String,
    pub completed: u32,
    pub quantity: u32,
}

/// Everything one scheduler tick changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerReport {
    pub gathered: Option<GatherYield>,
    pub crafted: Vec<CraftedUnit>,
    pub paused: Vec<u64>,
    pub dropped: Vec<u64>,
    pub expired_buffs: Vec<String>,
    pub level_ups: Vec<LevelUp>,
}

impl SchedulerReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

enum HeadStep {
    Idle,
    Paused(u64),
    Finished {
        unit: CraftedUnit,
        skill: SkillType,
        skill_gain: u32,
    },
}

/// Runs the gather task, facility queues and buff list.
pub struct TaskScheduler<R: Rng = StreamRng> {
    cfg: SchedulerConfig,
    catalog: Catalog,
    skills: SkillBook,
    gathering: Option<GatherTask>,
    queues: BTreeMap<String, FacilityQueue>,
    buffs: BuffList,
    /// Results of catch-up work done outside `tick`, returned by the next one.
    carried: SchedulerReport,
    next_entry_id: u64,
    rng: R,
    perks: Box<dyn PerkHook>,
    inventory: SharedInventory,
    equipment: SharedEquipment,
    events: EventBus,
}

impl<R: Rng> fmt::Debug for TaskScheduler<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskScheduler")
            .field("skills", &self.skills)
            .field("gathering", &self.gathering)
            .field("queues", &self.queues)
            .field("buffs", &self.buffs)
            .finish_non_exhaustive()
    }
}

impl<R: Rng> TaskScheduler<R> {
    pub fn new(catalog: Catalog, cfg: SchedulerConfig, rng: R, collab: &Collaborators) -> Self {
        Self {
            cfg,
            catalog,
            skills: SkillBook::new(),
            gathering: None,
            queues: BTreeMap::new(),
            buffs: BuffList::new(),
            carried: SchedulerReport::default(),
            next_entry_id: 1,
            rng,
            perks: Box::new(NoPerks),
            inventory: collab.inventory.clone(),
            equipment: collab.equipment.clone(),
            events: collab.events.clone(),
        }
    }

    /// Replace the perk hook.
    #[must_use]
    pub fn with_perks(mut self, perks: Box<dyn PerkHook>) -> Self {
        self.perks = perks;
        self
    }

    /// Start from an existing skill ledger.
    #[must_use]
    pub fn with_skills(mut self, skills: SkillBook) -> Self {
        self.skills = skills;
        self
    }

    #[must_use]
    pub const fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    #[must_use]
    pub const fn config(&self) -> &SchedulerConfig {
        &self.cfg
    }

    #[must_use]
    pub const fn skills(&self) -> &SkillBook {
        &self.skills
    }

    /// Grant experience, announcing a level-up when a boundary is crossed.
    pub fn add_skill_xp(&mut self, skill: SkillType, amount: u32) -> Option<LevelUp> {
        let level_up = self.skills.add_xp(skill, amount)?;
        log::info!(
            target: LOG_TARGET_SCHEDULER,
            "{} reached level {}",
            skill.label(),
            level_up.to
        );
        self.events.emit(GameEvent::SkillLevelUp {
            skill,
            from: level_up.from,
            to: level_up.to,
        });
        Some(level_up)
    }

    // Gathering

    #[must_use]
    pub const fn gathering(&self) -> Option<&GatherTask> {
        self.gathering.as_ref()
    }

    #[must_use]
    pub fn gather_progress(&self) -> Option<f64> {
        self.gathering.as_ref().map(|task| task.progress)
    }

    /// True when no gather task, queue entry or buff needs ticking.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.gathering.is_none() && self.queues.is_empty() && self.buffs.is_empty()
    }

    /// Begin gathering at `site`; `None` means the party is on the road.
    ///
    /// # Errors
    ///
    /// `AlreadyGathering`, `ActionNotFound` or `RequirementsNotMet`.
    pub fn start_gathering(
        &mut self,
        action_id: &str,
        site: Option<&MapEntity>,
        now: SimTime,
    ) -> ActionResult<GatherTask> {
        if self.gathering.is_some() {
            return Err(ActionError::AlreadyGathering);
        }
        let Some(action) = self.catalog.action(action_id) else {
            return Err(ActionError::ActionNotFound(action_id.to_string()));
        };
        let tool = self.equipment.borrow().tool().map(str::to_string);
        can_gather(action, tool.as_deref(), &self.skills, site)?;

        let level = self.skills.level(action.skill);
        let mut yield_range =
            calculate_gather_yield(action, tool.as_deref(), level, self.perks.as_ref());
        let node = match (site, action.resource.as_deref()) {
            (Some(MapEntity::ResourceNode(node)), Some(resource)) => {
                yield_range = yield_range.scaled_by(node.abundance(resource).unwrap_or(1.0));
                Some(node.id.clone())
            }
            _ => None,
        };
        let secs = calculate_gather_time(
            action,
            tool.as_deref(),
            level,
            self.perks.as_ref(),
            self.cfg.min_gather_secs,
        );
        let secs = (secs / (1.0 + self.buffs.total(GATHER_SPEED_STAT).max(0.0)))
            .max(self.cfg.min_gather_secs);
        let task = GatherTask {
            action_id: action.id.clone(),
            started_at: now,
            duration: Duration::try_from_secs_f64(secs).unwrap_or_default(),
            progress: 0.0,
            yield_range,
            node,
        };
        log::info!(
            target: LOG_TARGET_SCHEDULER,
            "gathering {} for {secs:.1}s, yield {}..={}",
            action.id,
            yield_range.min,
            yield_range.max
        );
        self.events.emit(GameEvent::GatheringStarted {
            action: action.id.clone(),
            duration_secs: secs,
        });
        self.gathering = Some(task.clone());
        Ok(task)
    }

    /// Abandon the active gather task without reward.
    ///
    /// # Errors
    ///
    /// `NotGathering` when idle.
    pub fn cancel_gathering(&mut self) -> ActionResult {
        let Some(task) = self.gathering.take() else {
            return Err(ActionError::NotGathering);
        };
        log::info!(target: LOG_TARGET_SCHEDULER, "gathering {} cancelled", task.action_id);
        self.events.emit(GameEvent::GatheringCancelled {
            action: task.action_id,
        });
        Ok(())
    }

    fn tick_gathering(&mut self, now: SimTime, world: &mut World, report: &mut SchedulerReport) {
        let Some(task) = self.gathering.as_mut() else {
            return;
        };
        task.progress = task.progress_at(now);
        if now.saturating_since(task.started_at) < task.duration {
            return;
        }
        let Some(task) = self.gathering.take() else {
            return;
        };
        let Some(action) = self.catalog.action(&task.action_id).cloned() else {
            log::error!(
                target: LOG_TARGET_SCHEDULER,
                "gather task references unknown action {}; dropped",
                task.action_id
            );
            return;
        };

        let quantity = self
            .rng
            .gen_range(task.yield_range.min..=task.yield_range.max);
        if let (Some(node), Some(resource)) = (task.node.as_deref(), action.resource.as_deref()) {
            if let Some(remaining) = world.deplete(node, resource, self.cfg.depletion_factor) {
                log::debug!(
                    target: LOG_TARGET_SCHEDULER,
                    "{node} {resource} abundance now {remaining:.3}"
                );
            }
        }
        if quantity > 0 {
            self.inventory.borrow_mut().add_item(&action.item, quantity);
        }
        if self.cfg.tool_wear_per_gather > 0 {
            let _ = self.equipment.borrow_mut().wear(
                EquipSlot::Tool,
                self.cfg.tool_wear_per_gather,
                &self.events,
            );
        }
        log::info!(
            target: LOG_TARGET_SCHEDULER,
            "gathered {quantity} {} from {}",
            action.item,
            action.id
        );
        self.events.emit(GameEvent::GatheringCompleted {
            action: action.id.clone(),
            item: action.item.clone(),
            quantity,
        });
        report.level_ups.extend(self.add_skill_xp(action.skill, action.skill_gain));
        report.gathered = Some(GatherYield {
            action: action.id,
            item: action.item,
            quantity,
        });
    }

    // Crafting

    /// Pre-check skill and inputs for `quantity` units of a recipe.
    ///
    /// # Errors
    ///
    /// `RecipeNotFound`, `RequirementsNotMet` or `InsufficientInventory`.
    pub fn can_craft(&self, recipe_id: &str, quantity: u32) -> ActionResult {
        let Some(recipe) = self.catalog.recipe(recipe_id) else {
            return Err(ActionError::RecipeNotFound(recipe_id.to_string()));
        };
        craft::can_craft(recipe, quantity, &*self.inventory.borrow(), &self.skills)
    }

    #[must_use]
    pub fn queue(&self, facility: &str) -> Option<&FacilityQueue> {
        self.queues.get(facility)
    }

    pub fn queues(&self) -> impl Iterator<Item = (&str, &FacilityQueue)> {
        self.queues
            .iter()
            .map(|(facility, queue)| (facility.as_str(), queue))
    }

    /// Append a craft order to `facility`'s queue. Returns the entry id.
    ///
    /// Inputs are not reserved; they are withdrawn as each unit completes.
    ///
    /// # Errors
    ///
    /// `InvalidQuantity`, `RecipeNotFound`, or `RequirementsNotMet` when the
    /// recipe belongs to another facility.
    pub fn add_to_queue(
        &mut self,
        recipe_id: &str,
        quantity: u32,
        facility: &str,
        now: SimTime,
    ) -> ActionResult<u64> {
        if quantity == 0 {
            return Err(ActionError::InvalidQuantity);
        }
        let Some(recipe) = self.catalog.recipe(recipe_id) else {
            return Err(ActionError::RecipeNotFound(recipe_id.to_string()));
        };
        if recipe.facility != facility {
            return Err(Requirement::Facility {
                required: recipe.facility.clone(),
            }
            .into());
        }
        let entry_id = self.next_entry_id;
        self.next_entry_id += 1;
        let queue = self.queues.entry(facility.to_string()).or_default();
        let is_head = queue.push(CraftQueueEntry::new(entry_id, recipe_id, quantity));
        log::debug!(
            target: LOG_TARGET_SCHEDULER,
            "queued {quantity}x {recipe_id} at {facility} as #{entry_id}"
        );
        if is_head {
            self.promote(facility, now);
        }
        Ok(entry_id)
    }

    fn promote(&mut self, facility: &str, at: SimTime) {
        let Some(queue) = self.queues.get_mut(facility) else {
            return;
        };
        if let Some(head) = queue.promote(at) {
            self.events.emit(GameEvent::CraftingStarted {
                facility: facility.to_string(),
                entry_id: head.id,
                recipe: head.recipe_id.clone(),
            });
        }
    }

    fn facility_of(&self, entry_id: u64) -> Option<String> {
        self.queues
            .iter()
            .find(|(_, queue)| queue.get(entry_id).is_some())
            .map(|(facility, _)| facility.clone())
    }

    /// Remove an entry from its queue, discarding unit progress.
    ///
    /// # Errors
    ///
    /// `EntryNotFound` when no queue holds the entry.
    pub fn cancel_crafting(&mut self, entry_id: u64, now: SimTime) -> ActionResult {
        let Some(facility) = self.facility_of(entry_id) else {
            return Err(ActionError::EntryNotFound(entry_id));
        };
        let Some((_, was_head)) = self
            .queues
            .get_mut(&facility)
            .and_then(|queue| queue.remove(entry_id))
        else {
            return Err(ActionError::EntryNotFound(entry_id));
        };
        log::info!(target: LOG_TARGET_SCHEDULER, "crafting #{entry_id} at {facility} cancelled");
        self.events.emit(GameEvent::CraftingCancelled {
            facility: facility.clone(),
            entry_id,
        });
        if was_head {
            self.promote(&facility, now);
        }
        self.queues.retain(|_, queue| !queue.is_empty());
        Ok(())
    }

    /// Freeze the running head entry, keeping its unit progress.
    ///
    /// # Errors
    ///
    /// `EntryNotFound`, or `EntryStateConflict` unless the entry is running.
    pub fn pause_crafting(&mut self, entry_id: u64, now: SimTime) -> ActionResult {
        let Some(facility) = self.facility_of(entry_id) else {
            return Err(ActionError::EntryNotFound(entry_id));
        };
        let mut carried = std::mem::take(&mut self.carried);
        self.advance_facility(&facility, now, &mut carried);
        self.carried = carried;
        let Some(head) = self
            .queues
            .get_mut(&facility)
            .and_then(FacilityQueue::head_mut)
            .filter(|head| head.id == entry_id && head.status == CraftStatus::InProgress)
        else {
            return Err(ActionError::EntryStateConflict(entry_id));
        };
        head.pause();
        self.events.emit(GameEvent::CraftingPaused {
            facility,
            entry_id,
            reason: "paused".to_string(),
        });
        Ok(())
    }

    /// Restart a paused entry from where it stopped.
    ///
    /// # Errors
    ///
    /// `EntryNotFound`, or `EntryStateConflict` unless the entry is paused.
    pub fn resume_crafting(&mut self, entry_id: u64, now: SimTime) -> ActionResult {
        let Some(facility) = self.facility_of(entry_id) else {
            return Err(ActionError::EntryNotFound(entry_id));
        };
        let Some(queue) = self.queues.get_mut(&facility) else {
            return Err(ActionError::EntryNotFound(entry_id));
        };
        let Some(head) = queue
            .head_mut()
            .filter(|head| head.id == entry_id && head.status == CraftStatus::Paused)
        else {
            return Err(ActionError::EntryStateConflict(entry_id));
        };
        let Some(unit) = self
            .catalog
            .recipe(&head.recipe_id)
            .and_then(Recipe::unit_duration)
        else {
            return Err(ActionError::RecipeNotFound(head.recipe_id.clone()));
        };
        head.resume(now, unit);
        log::debug!(target: LOG_TARGET_SCHEDULER, "crafting #{entry_id} resumed");
        Ok(())
    }

    /// Advance one facility's head until it is waiting on time or paused.
    fn advance_facility(&mut self, facility: &str, now: SimTime, report: &mut SchedulerReport) {
        loop {
            match self.advance_head(facility, now) {
                Ok(HeadStep::Idle) => return,
                Ok(HeadStep::Paused(entry_id)) => {
                    report.paused.push(entry_id);
                    return;
                }
                Ok(HeadStep::Finished {
                    unit,
                    skill,
                    skill_gain,
                }) => {
                    report.level_ups.extend(self.add_skill_xp(skill, skill_gain));
                    report.crafted.push(unit);
                }
                Err(fault) => {
                    log::error!(target: LOG_TARGET_SCHEDULER, "{facility}: {fault}; entry dropped");
                    if let Some(dropped) = self.queues.get_mut(facility).and_then(FacilityQueue::pop_head) {
                        report.dropped.push(dropped.id);
                        self.events.emit(GameEvent::CraftingCancelled {
                            facility: facility.to_string(),
                            entry_id: dropped.id,
                        });
                    }
                    self.promote(facility, now);
                }
            }
        }
    }

    fn advance_head(&mut self, facility: &str, now: SimTime) -> Result<HeadStep, CraftFault> {
        let Some(queue) = self.queues.get_mut(facility) else {
            return Ok(HeadStep::Idle);
        };
        let Some(head) = queue.head_mut() else {
            return Ok(HeadStep::Idle);
        };
        if head.status != CraftStatus::InProgress {
            return Ok(HeadStep::Idle);
        }
        let Some(recipe) = self.catalog.recipe(&head.recipe_id) else {
            return Err(CraftFault::UnknownRecipe {
                entry_id: head.id,
                recipe: head.recipe_id.clone(),
            });
        };
        let Some(unit) = recipe.unit_duration() else {
            return Err(CraftFault::InvalidTiming(recipe.id.clone()));
        };
        let started = *head.unit_started_at.get_or_insert(now);
        let unit_end = started + unit;
        if now < unit_end {
            let elapsed = now.saturating_since(started).as_secs_f64();
            head.progress = (elapsed / unit.as_secs_f64()).clamp(0.0, 1.0);
            return Ok(HeadStep::Idle);
        }

        let consumed = craft::consume_inputs(recipe, &mut *self.inventory.borrow_mut());
        if let Err(err) = consumed {
            head.progress = 1.0;
            head.pause();
            log::warn!(
                target: LOG_TARGET_SCHEDULER,
                "crafting #{} at {facility} paused: {err}",
                head.id
            );
            self.events.emit(GameEvent::CraftingPaused {
                facility: facility.to_string(),
                entry_id: head.id,
                reason: err.reason(),
            });
            return Ok(HeadStep::Paused(head.id));
        }
        self.inventory
            .borrow_mut()
            .add_item(&recipe.output, recipe.output_qty);
        head.completed += 1;
        head.progress = 0.0;
        let unit_done = CraftedUnit {
            facility: facility.to_string(),
            entry_id: head.id,
            recipe: recipe.id.clone(),
            completed: head.completed,
            quantity: head.quantity,
        };
        let (skill, skill_gain) = (recipe.skill, recipe.skill_gain);
        log::info!(
            target: LOG_TARGET_SCHEDULER,
            "crafted {} ({}/{}) at {facility}",
            recipe.output,
            unit_done.completed,
            unit_done.quantity
        );
        self.events.emit(GameEvent::CraftingCompleted {
            facility: unit_done.facility.clone(),
            entry_id: unit_done.entry_id,
            recipe: unit_done.recipe.clone(),
            completed: unit_done.completed,
            quantity: unit_done.quantity,
        });

        if head.remaining() == 0 {
            head.status = CraftStatus::Completed;
            queue.pop_head();
            self.promote(facility, unit_end);
        } else {
            head.unit_started_at = Some(unit_end);
        }
        Ok(HeadStep::Finished {
            unit: unit_done,
            skill,
            skill_gain,
        })
    }

    // Buffs and items

    #[must_use]
    pub const fn buffs(&self) -> &BuffList {
        &self.buffs
    }

    #[must_use]
    pub fn buff_total(&self, stat: &str) -> f64 {
        self.buffs.total(stat)
    }

    /// Apply a buff, refreshing any buff already on the same stat.
    pub fn add_buff(&mut self, buff: Buff) {
        let (stat, source, magnitude) = (buff.stat.clone(), buff.source.clone(), buff.magnitude);
        let refreshed = self.buffs.apply(buff);
        log::debug!(
            target: LOG_TARGET_SCHEDULER,
            "buff {stat} from {source} {}",
            if refreshed { "refreshed" } else { "applied" }
        );
        self.events.emit(GameEvent::BuffApplied {
            stat,
            source,
            magnitude,
        });
    }

    /// Consume one unit of an item and apply its buff.
    ///
    /// # Errors
    ///
    /// `UnknownItem`, `ItemNotConsumable` or `InsufficientInventory`.
    pub fn use_consumable(&mut self, item_id: &str, now: SimTime) -> ActionResult {
        let Some(item) = self.catalog.item(item_id) else {
            return Err(ActionError::UnknownItem(item_id.to_string()));
        };
        let Some(effect) = item.consumable.clone() else {
            return Err(ActionError::ItemNotConsumable(item_id.to_string()));
        };
        self.inventory.borrow_mut().remove_item(item_id, 1)?;
        self.add_buff(Buff {
            source: item_id.to_string(),
            stat: effect.stat,
            magnitude: effect.magnitude,
            duration: Duration::try_from_secs_f64(effect.duration_secs).unwrap_or_default(),
            started_at: now,
        });
        Ok(())
    }

    /// Equip an item held in the inventory. Returns the displaced item.
    ///
    /// # Errors
    ///
    /// `UnknownItem`, `ItemNotEquippable` or `InsufficientInventory`.
    pub fn equip_item(&mut self, item_id: &str) -> ActionResult<Option<String>> {
        let Some(item) = self.catalog.item(item_id) else {
            return Err(ActionError::UnknownItem(item_id.to_string()));
        };
        self.events.hold(|| {
            self.equipment
                .borrow_mut()
                .equip_item(item, &mut *self.inventory.borrow_mut(), &self.events)
        })
    }

    /// Return the item in `slot` to the inventory.
    pub fn unequip_item(&mut self, slot: EquipSlot) -> Option<String> {
        self.events.hold(|| {
            self.equipment
                .borrow_mut()
                .unequip_item(slot, &mut *self.inventory.borrow_mut(), &self.events)
        })
    }

    /// One scheduler pass: gathering, every facility queue, then buff expiry.
    ///
    /// Events raised during the pass reach subscribers once it completes.
    pub fn tick(&mut self, now: SimTime, world: &mut World) -> SchedulerReport {
        let events = self.events.clone();
        events.hold(|| self.run_tick(now, world))
    }

    fn run_tick(&mut self, now: SimTime, world: &mut World) -> SchedulerReport {
        let mut report = std::mem::take(&mut self.carried);
        self.tick_gathering(now, world, &mut report);

        let facilities: Vec<String> = self.queues.keys().cloned().collect();
        for facility in &facilities {
            self.advance_facility(facility, now, &mut report);
        }
        self.queues.retain(|_, queue| !queue.is_empty());

        for buff in self.buffs.prune(now) {
            log::debug!(target: LOG_TARGET_SCHEDULER, "buff {} expired", buff.stat);
            self.events.emit(GameEvent::BuffExpired {
                stat: buff.stat.clone(),
                source: buff.source,
            });
            report.expired_buffs.push(buff.stat);
        }
        report
    }
}
