//! Collaborators shared by the simulators.
//!
//! Hosts may supply their own inventory, equipment or event bus. Anything left
//! out is replaced by an in-memory default when the set is built, so the
//! simulators never branch on a missing collaborator.
use std::cell::RefCell;
use std::rc::Rc;

use crate::equipment::Equipment;
use crate::events::EventBus;
use crate::inventory::{Inventory, ItemLedger};

pub type SharedInventory = Rc<RefCell<dyn Inventory>>;
pub type SharedEquipment = Rc<RefCell<Equipment>>;

/// Resolved collaborator handles; cloning shares the same underlying state.
#[derive(Clone)]
pub struct Collaborators {
    pub inventory: SharedInventory,
    pub equipment: SharedEquipment,
    pub events: EventBus,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("equipment", &self.equipment)
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

impl Collaborators {
    #[must_use]
    pub fn builder() -> CollaboratorsBuilder {
        CollaboratorsBuilder::default()
    }
}

impl Default for Collaborators {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[derive(Default)]
pub struct CollaboratorsBuilder {
    inventory: Option<SharedInventory>,
    equipment: Option<SharedEquipment>,
    events: Option<EventBus>,
}

impl CollaboratorsBuilder {
    #[must_use]
    pub fn inventory(mut self, inventory: SharedInventory) -> Self {
        self.inventory = Some(inventory);
        self
    }

    #[must_use]
    pub fn equipment(mut self, equipment: SharedEquipment) -> Self {
        self.equipment = Some(equipment);
        self
    }

    #[must_use]
    pub fn events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    #[must_use]
    pub fn build(self) -> Collaborators {
        let inventory = self.inventory.unwrap_or_else(|| {
            log::debug!("no inventory supplied; using in-memory ledger");
            Rc::new(RefCell::new(ItemLedger::new()))
        });
        Collaborators {
            inventory,
            equipment: self.equipment.unwrap_or_default(),
            events: self.events.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supplied_inventory_is_shared() {
        let ledger = Rc::new(RefCell::new(ItemLedger::with_gold(30)));
        let collab = Collaborators::builder().inventory(ledger.clone()).build();
        collab.inventory.borrow_mut().add_gold(5);
        assert_eq!(ledger.borrow().gold(), 35);
    }

    #[test]
    fn missing_collaborators_get_defaults() {
        let collab = Collaborators::default();
        assert_eq!(collab.inventory.borrow().gold(), 0);
        assert!(collab.equipment.borrow().tool().is_none());
        assert_eq!(collab.events.subscriber_count(), 0);
    }
}
