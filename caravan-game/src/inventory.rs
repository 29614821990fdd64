//! Player inventory seam.
//!
//! The simulators only deposit and withdraw through [`Inventory`]; hosts can
//! plug in their own storage. [`ItemLedger`] is the in-memory default.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{ActionError, ActionResult};

pub trait Inventory {
    fn add_item(&mut self, item_id: &str, qty: u32);

    /// Remove `qty` of an item. Fails without side effects when short.
    ///
    /// # Errors
    ///
    /// Returns `InsufficientInventory` when fewer than `qty` are held.
    fn remove_item(&mut self, item_id: &str, qty: u32) -> ActionResult;

    fn item_count(&self, item_id: &str) -> u32;

    fn gold(&self) -> u32;

    fn add_gold(&mut self, amount: u32);

    /// Remove up to `amount` gold, returning how much was actually taken.
    fn remove_gold(&mut self, amount: u32) -> u32;

    fn has_item(&self, item_id: &str, qty: u32) -> bool {
        self.item_count(item_id) >= qty
    }
}

/// In-memory inventory keyed by item id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemLedger {
    #[serde(default)]
    items: BTreeMap<String, u32>,
    #[serde(default)]
    gold: u32,
}

impl ItemLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_gold(gold: u32) -> Self {
        Self {
            items: BTreeMap::new(),
            gold,
        }
    }

    /// Builder-style stock for tests and content setup.
    #[must_use]
    pub fn stocked(mut self, item_id: &str, qty: u32) -> Self {
        self.add_item(item_id, qty);
        self
    }

    pub fn items(&self) -> impl Iterator<Item = (&str, u32)> {
        self.items.iter().map(|(id, qty)| (id.as_str(), *qty))
    }
}

impl Inventory for ItemLedger {
    fn add_item(&mut self, item_id: &str, qty: u32) {
        if qty == 0 {
            return;
        }
        let entry = self.items.entry(item_id.to_string()).or_insert(0);
        *entry = entry.saturating_add(qty);
    }

    fn remove_item(&mut self, item_id: &str, qty: u32) -> ActionResult {
        let available = self.item_count(item_id);
        if available < qty {
            return Err(ActionError::InsufficientInventory {
                item: item_id.to_string(),
                required: qty,
                available,
            });
        }
        let remaining = available - qty;
        if remaining == 0 {
            self.items.remove(item_id);
        } else {
            self.items.insert(item_id.to_string(), remaining);
        }
        Ok(())
    }

    fn item_count(&self, item_id: &str) -> u32 {
        self.items.get(item_id).copied().unwrap_or(0)
    }

    fn gold(&self) -> u32 {
        self.gold
    }

    fn add_gold(&mut self, amount: u32) {
        self.gold = self.gold.saturating_add(amount);
    }

    fn remove_gold(&mut self, amount: u32) -> u32 {
        let taken = amount.min(self.gold);
        self.gold -= taken;
        taken
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remove_is_all_or_nothing() {
        let mut inv = ItemLedger::new().stocked("logs", 3);
        let err = inv.remove_item("logs", 5).unwrap_err();
        assert_eq!(
            err,
            ActionError::InsufficientInventory {
                item: "logs".into(),
                required: 5,
                available: 3
            }
        );
        assert_eq!(inv.item_count("logs"), 3);
        inv.remove_item("logs", 3).unwrap();
        assert_eq!(inv.item_count("logs"), 0);
        assert_eq!(inv.items().count(), 0);
    }

    #[test]
    fn gold_removal_never_underflows() {
        let mut inv = ItemLedger::with_gold(25);
        assert_eq!(inv.remove_gold(40), 25);
        assert_eq!(inv.gold(), 0);
        inv.add_gold(7);
        assert!(inv.has_item("anything", 0));
        assert_eq!(inv.gold(), 7);
    }
}
