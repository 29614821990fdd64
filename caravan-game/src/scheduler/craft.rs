//! Per-facility crafting queues.
//!
//! Each facility owns a FIFO. Only the head entry runs; a multi-unit entry
//! stays at the head until every unit is done. Unit timers carry over, so a
//! unit that finishes mid-tick starts the next one at its exact end time.
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::VecDeque;
use std::time::Duration;

use crate::clock::SimTime;
use crate::error::{ActionError, ActionResult, Requirement};
use crate::inventory::Inventory;
use crate::skills::{SkillBook, SkillType};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeInput {
    pub item: String,
    pub qty: u32,
}

pub type RecipeInputs = SmallVec<[RecipeInput; 4]>;

const fn one_unit() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: String,
    pub name: String,
    pub facility: String,
    #[serde(default)]
    pub inputs: RecipeInputs,
    pub output: String,
    #[serde(default = "one_unit")]
    pub output_qty: u32,
    pub time_secs: f64,
    pub skill: SkillType,
    #[serde(default)]
    pub required_level: u8,
    pub skill_gain: u32,
}

impl Recipe {
    /// Time to craft a single unit.
    #[must_use]
    pub fn unit_duration(&self) -> Option<Duration> {
        Duration::try_from_secs_f64(self.time_secs)
            .ok()
            .filter(|span| !span.is_zero())
    }
}

/// Pre-check the skill level and inputs for `quantity` units.
///
/// # Errors
///
/// `RequirementsNotMet` for a low skill, `InsufficientInventory` for the first
/// short input, `InvalidQuantity` for zero.
pub fn can_craft(
    recipe: &Recipe,
    quantity: u32,
    inventory: &dyn Inventory,
    skills: &SkillBook,
) -> ActionResult {
    if quantity == 0 {
        return Err(ActionError::InvalidQuantity);
    }
    let current = skills.level(recipe.skill);
    if current < recipe.required_level {
        return Err(Requirement::SkillLevel {
            skill: recipe.skill,
            required: recipe.required_level,
            current,
        }
        .into());
    }
    for input in &recipe.inputs {
        let required = input.qty.saturating_mul(quantity);
        let available = inventory.item_count(&input.item);
        if available < required {
            return Err(ActionError::InsufficientInventory {
                item: input.item.clone(),
                required,
                available,
            });
        }
    }
    Ok(())
}

/// Withdraw one unit's inputs, all or nothing.
pub(crate) fn consume_inputs(recipe: &Recipe, inventory: &mut dyn Inventory) -> ActionResult {
    for input in &recipe.inputs {
        let available = inventory.item_count(&input.item);
        if available < input.qty {
            return Err(ActionError::InsufficientInventory {
                item: input.item.clone(),
                required: input.qty,
                available,
            });
        }
    }
    for input in &recipe.inputs {
        inventory.remove_item(&input.item, input.qty)?;
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CraftStatus {
    Queued,
    InProgress,
    Paused,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CraftQueueEntry {
    pub id: u64,
    pub recipe_id: String,
    pub quantity: u32,
    pub completed: u32,
    /// Progress of the current unit in `[0, 1]`.
    pub progress: f64,
    pub status: CraftStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) unit_started_at: Option<SimTime>,
}

impl CraftQueueEntry {
    #[must_use]
    pub fn new(id: u64, recipe_id: &str, quantity: u32) -> Self {
        Self {
            id,
            recipe_id: recipe_id.to_string(),
            quantity,
            completed: 0,
            progress: 0.0,
            status: CraftStatus::Queued,
            unit_started_at: None,
        }
    }

    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.quantity.saturating_sub(self.completed)
    }

    pub(crate) fn start(&mut self, at: SimTime) {
        self.status = CraftStatus::InProgress;
        self.unit_started_at = Some(at);
    }

    pub(crate) fn pause(&mut self) {
        self.status = CraftStatus::Paused;
        self.unit_started_at = None;
    }

    /// Restart the unit timer so existing progress is kept.
    pub(crate) fn resume(&mut self, now: SimTime, unit: Duration) {
        self.status = CraftStatus::InProgress;
        self.unit_started_at = Some(now.saturating_sub(unit.mul_f64(self.progress.clamp(0.0, 1.0))));
    }
}

/// FIFO of crafting entries for one facility.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FacilityQueue {
    entries: VecDeque<CraftQueueEntry>,
}

impl FacilityQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> impl Iterator<Item = &CraftQueueEntry> {
        self.entries.iter()
    }

    #[must_use]
    pub fn head(&self) -> Option<&CraftQueueEntry> {
        self.entries.front()
    }

    pub(crate) fn head_mut(&mut self) -> Option<&mut CraftQueueEntry> {
        self.entries.front_mut()
    }

    #[must_use]
    pub fn get(&self, entry_id: u64) -> Option<&CraftQueueEntry> {
        self.entries.iter().find(|entry| entry.id == entry_id)
    }

    /// Append an entry. Returns true when it became the head.
    pub(crate) fn push(&mut self, entry: CraftQueueEntry) -> bool {
        self.entries.push_back(entry);
        self.entries.len() == 1
    }

    pub(crate) fn pop_head(&mut self) -> Option<CraftQueueEntry> {
        self.entries.pop_front()
    }

    /// Remove an entry wherever it sits. Returns it and whether it was the head.
    pub(crate) fn remove(&mut self, entry_id: u64) -> Option<(CraftQueueEntry, bool)> {
        let idx = self.entries.iter().position(|entry| entry.id == entry_id)?;
        self.entries.remove(idx).map(|entry| (entry, idx == 0))
    }

    /// Start the head if it is waiting. Returns the started entry.
    pub(crate) fn promote(&mut self, at: SimTime) -> Option<&CraftQueueEntry> {
        let head = self.entries.front_mut()?;
        if head.status != CraftStatus::Queued {
            return None;
        }
        head.start(at);
        Some(head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::ItemLedger;
    use smallvec::smallvec;

    fn iron_bar() -> Recipe {
        Recipe {
            id: "iron_bar".into(),
            name: "Iron Bar".into(),
            facility: "smelter".into(),
            inputs: smallvec![RecipeInput {
                item: "iron_ore".into(),
                qty: 2,
            }],
            output: "iron_bar".into(),
            output_qty: 1,
            time_secs: 10.0,
            skill: SkillType::Smelting,
            required_level: 0,
            skill_gain: 15,
        }
    }

    #[test]
    fn can_craft_checks_inputs_for_full_quantity() {
        let inv = ItemLedger::new().stocked("iron_ore", 5);
        let skills = SkillBook::new();
        assert_eq!(can_craft(&iron_bar(), 2, &inv, &skills), Ok(()));
        assert_eq!(
            can_craft(&iron_bar(), 3, &inv, &skills),
            Err(ActionError::InsufficientInventory {
                item: "iron_ore".into(),
                required: 6,
                available: 5
            })
        );
        assert_eq!(can_craft(&iron_bar(), 0, &inv, &skills), Err(ActionError::InvalidQuantity));
    }

    #[test]
    fn consume_inputs_is_all_or_nothing() {
        let mut recipe = iron_bar();
        recipe.inputs.push(RecipeInput {
            item: "coal".into(),
            qty: 1,
        });
        let mut inv = ItemLedger::new().stocked("iron_ore", 2);
        assert!(consume_inputs(&recipe, &mut inv).is_err());
        assert_eq!(inv.item_count("iron_ore"), 2);
        inv.add_item("coal", 1);
        consume_inputs(&recipe, &mut inv).unwrap();
        assert_eq!(inv.item_count("iron_ore"), 0);
        assert_eq!(inv.item_count("coal"), 0);
    }

    #[test]
    fn queue_promotes_and_removes_anywhere() {
        let mut queue = FacilityQueue::new();
        assert!(queue.push(CraftQueueEntry::new(1, "iron_bar", 1)));
        assert!(!queue.push(CraftQueueEntry::new(2, "iron_bar", 1)));
        assert!(!queue.push(CraftQueueEntry::new(3, "iron_bar", 1)));
        assert_eq!(queue.promote(SimTime::ZERO).map(|e| e.id), Some(1));
        assert!(queue.promote(SimTime::ZERO).is_none());

        let (removed, was_head) = queue.remove(2).unwrap();
        assert_eq!(removed.id, 2);
        assert!(!was_head);
        let (_, was_head) = queue.remove(1).unwrap();
        assert!(was_head);
        assert_eq!(queue.promote(SimTime::from_secs(4)).map(|e| e.id), Some(3));
        assert!(queue.remove(9).is_none());
    }

    #[test]
    fn resume_keeps_unit_progress() {
        let mut entry = CraftQueueEntry::new(1, "iron_bar", 1);
        entry.start(SimTime::ZERO);
        entry.progress = 0.4;
        entry.pause();
        assert_eq!(entry.status, CraftStatus::Paused);
        entry.resume(SimTime::from_secs(100), Duration::from_secs(10));
        assert_eq!(entry.unit_started_at, Some(SimTime::from_secs(96)));
    }

    #[test]
    fn zero_time_recipes_have_no_unit_duration() {
        let recipe = Recipe {
            time_secs: 0.0,
            ..iron_bar()
        };
        assert!(recipe.unit_duration().is_none());
        assert_eq!(iron_bar().unit_duration(), Some(Duration::from_secs(10)));
    }
}
