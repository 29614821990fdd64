//! Equipped items by slot, including tool durability.
//!
//! Equipping moves one unit out of the inventory; unequipping returns it.
//! Inventory units carry no per-instance durability, so an unequipped tool
//! goes back as a fresh unit.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{ActionError, ActionResult};
use crate::events::{EventBus, GameEvent};
use crate::inventory::Inventory;
use crate::items::{EquipSlot, ItemDef};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquippedItem {
    pub item_id: String,
    #[serde(default)]
    pub durability: Option<u32>,
    #[serde(default)]
    pub max_durability: Option<u32>,
}

impl EquippedItem {
    #[must_use]
    pub fn is_worn(&self) -> bool {
        self.durability != self.max_durability
    }
}

/// Result of wearing down an equipped item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Wear {
    Remaining(u32),
    Indestructible,
    Broken(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Equipment {
    #[serde(default)]
    slots: BTreeMap<EquipSlot, EquippedItem>,
}

impl Equipment {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn equipped(&self, slot: EquipSlot) -> Option<&EquippedItem> {
        self.slots.get(&slot)
    }

    /// Id of the item in the tool slot.
    #[must_use]
    pub fn tool(&self) -> Option<&str> {
        self.slots
            .get(&EquipSlot::Tool)
            .map(|item| item.item_id.as_str())
    }

    /// Equip `item` from the inventory, returning whatever it displaced.
    ///
    /// # Errors
    ///
    /// `ItemNotEquippable` for items without a slot, `InsufficientInventory`
    /// when none are held.
    pub fn equip_item(
        &mut self,
        item: &ItemDef,
        inventory: &mut dyn Inventory,
        events: &EventBus,
    ) -> ActionResult<Option<String>> {
        let Some(slot) = item.slot else {
            return Err(ActionError::ItemNotEquippable(item.id.clone()));
        };
        inventory.remove_item(&item.id, 1)?;
        let previous = self.take_slot(slot, inventory, events);
        self.slots.insert(
            slot,
            EquippedItem {
                item_id: item.id.clone(),
                durability: item.durability,
                max_durability: item.durability,
            },
        );
        log::info!("equipped {} in {slot:?}", item.id);
        events.emit(GameEvent::ItemEquipped {
            slot,
            item: item.id.clone(),
        });
        Ok(previous)
    }

    /// Empty a slot, returning the item to the inventory.
    pub fn unequip_item(
        &mut self,
        slot: EquipSlot,
        inventory: &mut dyn Inventory,
        events: &EventBus,
    ) -> Option<String> {
        self.take_slot(slot, inventory, events)
    }

    fn take_slot(
        &mut self,
        slot: EquipSlot,
        inventory: &mut dyn Inventory,
        events: &EventBus,
    ) -> Option<String> {
        let removed = self.slots.remove(&slot)?;
        if removed.is_worn() {
            log::debug!("{} returned to inventory; wear reset", removed.item_id);
        }
        inventory.add_item(&removed.item_id, 1);
        events.emit(GameEvent::ItemUnequipped {
            slot,
            item: removed.item_id.clone(),
        });
        Some(removed.item_id)
    }

    /// Reduce durability of the item in `slot`; breaks and removes it at zero.
    pub fn wear(&mut self, slot: EquipSlot, amount: u32, events: &EventBus) -> Option<Wear> {
        let equipped = self.slots.get_mut(&slot)?;
        let Some(durability) = equipped.durability.as_mut() else {
            return Some(Wear::Indestructible);
        };
        *durability = durability.saturating_sub(amount);
        if *durability > 0 {
            return Some(Wear::Remaining(*durability));
        }
        let broken = self.slots.remove(&slot)?;
        log::warn!("{} broke", broken.item_id);
        events.emit(GameEvent::ToolBroken {
            slot,
            item: broken.item_id.clone(),
        });
        events.emit(GameEvent::ItemUnequipped {
            slot,
            item: broken.item_id.clone(),
        });
        Some(Wear::Broken(broken.item_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use crate::inventory::ItemLedger;

    fn pickaxe(durability: Option<u32>) -> ItemDef {
        ItemDef {
            id: "iron_pickaxe".into(),
            name: "Iron Pickaxe".into(),
            slot: Some(EquipSlot::Tool),
            durability,
            consumable: None,
        }
    }

    #[test]
    fn equip_moves_item_out_of_inventory_and_swaps() {
        let bus = EventBus::new();
        let mut inv = ItemLedger::new().stocked("iron_pickaxe", 1).stocked("bronze_pickaxe", 1);
        let mut eq = Equipment::new();

        assert_eq!(eq.equip_item(&pickaxe(Some(10)), &mut inv, &bus), Ok(None));
        assert_eq!(eq.tool(), Some("iron_pickaxe"));
        assert_eq!(inv.item_count("iron_pickaxe"), 0);

        let bronze = ItemDef {
            id: "bronze_pickaxe".into(),
            ..pickaxe(Some(5))
        };
        let displaced = eq.equip_item(&bronze, &mut inv, &bus).unwrap();
        assert_eq!(displaced.as_deref(), Some("iron_pickaxe"));
        assert_eq!(inv.item_count("iron_pickaxe"), 1);

        let kinds: Vec<_> = bus.drain().iter().map(GameEvent::kind).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::ItemEquipped,
                EventKind::ItemUnequipped,
                EventKind::ItemEquipped
            ]
        );
    }

    #[test]
    fn non_equippable_items_are_rejected() {
        let bus = EventBus::new();
        let mut inv = ItemLedger::new().stocked("bread", 1);
        let bread = ItemDef {
            id: "bread".into(),
            name: "Bread".into(),
            slot: None,
            durability: None,
            consumable: None,
        };
        let err = Equipment::new().equip_item(&bread, &mut inv, &bus).unwrap_err();
        assert_eq!(err, ActionError::ItemNotEquippable("bread".into()));
        assert_eq!(inv.item_count("bread"), 1);
    }

    #[test]
    fn wear_breaks_tool_at_zero() {
        let bus = EventBus::new();
        let mut inv = ItemLedger::new().stocked("iron_pickaxe", 1);
        let mut eq = Equipment::new();
        eq.equip_item(&pickaxe(Some(2)), &mut inv, &bus).unwrap();
        assert_eq!(eq.wear(EquipSlot::Tool, 1, &bus), Some(Wear::Remaining(1)));
        assert_eq!(
            eq.wear(EquipSlot::Tool, 1, &bus),
            Some(Wear::Broken("iron_pickaxe".into()))
        );
        assert_eq!(eq.tool(), None);
        assert_eq!(inv.item_count("iron_pickaxe"), 0);
        assert_eq!(eq.wear(EquipSlot::Tool, 1, &bus), None);
    }

    #[test]
    fn indestructible_items_never_break() {
        let bus = EventBus::new();
        let mut inv = ItemLedger::new().stocked("iron_pickaxe", 1);
        let mut eq = Equipment::new();
        eq.equip_item(&pickaxe(None), &mut inv, &bus).unwrap();
        assert_eq!(eq.wear(EquipSlot::Tool, 50, &bus), Some(Wear::Indestructible));
        assert_eq!(eq.unequip_item(EquipSlot::Tool, &mut inv, &bus).as_deref(), Some("iron_pickaxe"));
        assert_eq!(inv.item_count("iron_pickaxe"), 1);
    }
}
