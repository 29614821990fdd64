//! Item definitions relevant to the simulation: equip slots, tool durability
//! and consumable buffs. Pricing and flavour text live with the content tables.
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipSlot {
    Tool,
    Weapon,
    Head,
    Body,
    Hands,
    Feet,
    Accessory,
}

/// Timed stat boost granted by a consumable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumableEffect {
    pub stat: String,
    pub magnitude: f64,
    pub duration_secs: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDef {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<EquipSlot>,
    /// Uses before the item breaks; `None` means indestructible.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub durability: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumable: Option<ConsumableEffect>,
}

impl ItemDef {
    #[must_use]
    pub const fn is_equippable(&self) -> bool {
        self.slot.is_some()
    }
}
