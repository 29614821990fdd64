//! Typed notifications fired by the simulators.
//!
//! The bus delivers each event to every matching subscriber and also keeps a
//! bounded journal the host can drain once per frame. When the journal is full
//! the oldest entry is dropped. Subscribers may emit further
//! events from inside a callback; those are queued and delivered after the
//! current one.
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use crate::clock::SimTime;
use crate::constants::{EVENT_JOURNAL_CAPACITY, LOG_TARGET_EVENTS};
use crate::items::EquipSlot;
use crate::skills::SkillType;
use crate::travel::encounter::{EncounterKind, EncounterOutcome};

/// Event name, used for subscription filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    TravelStarted,
    Arrived,
    EncounterTriggered,
    GatheringStarted,
    GatheringCompleted,
    GatheringCancelled,
    CraftingStarted,
    CraftingCompleted,
    CraftingCancelled,
    CraftingPaused,
    SkillLevelUp,
    BuffApplied,
    BuffExpired,
    ItemEquipped,
    ItemUnequipped,
    ToolBroken,
}

impl EventKind {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::TravelStarted => "travelStarted",
            Self::Arrived => "arrived",
            Self::EncounterTriggered => "encounterTriggered",
            Self::GatheringStarted => "gatheringStarted",
            Self::GatheringCompleted => "gatheringCompleted",
            Self::GatheringCancelled => "gatheringCancelled",
            Self::CraftingStarted => "craftingStarted",
            Self::CraftingCompleted => "craftingCompleted",
            Self::CraftingCancelled => "craftingCancelled",
            Self::CraftingPaused => "craftingPaused",
            Self::SkillLevelUp => "skillLevelUp",
            Self::BuffApplied => "buffApplied",
            Self::BuffExpired => "buffExpired",
            Self::ItemEquipped => "itemEquipped",
            Self::ItemUnequipped => "itemUnequipped",
            Self::ToolBroken => "toolBroken",
        }
    }
}

/// Event payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum GameEvent {
    TravelStarted {
        from: String,
        to: String,
        duration_minutes: f64,
        at: SimTime,
    },
    Arrived {
        from: String,
        location: String,
        duration_minutes: f64,
        at: SimTime,
    },
    EncounterTriggered {
        kind: EncounterKind,
        outcome: EncounterOutcome,
        at: SimTime,
    },
    GatheringStarted {
        action: String,
        duration_secs: f64,
    },
    GatheringCompleted {
        action: String,
        item: String,
        quantity: u32,
    },
    GatheringCancelled {
        action: String,
    },
    CraftingStarted {
        facility: String,
        entry_id: u64,
        recipe: String,
    },
    CraftingCompleted {
        facility: String,
        entry_id: u64,
        recipe: String,
        completed: u32,
        quantity: u32,
    },
    CraftingCancelled {
        facility: String,
        entry_id: u64,
    },
    CraftingPaused {
        facility: String,
        entry_id: u64,
        reason: String,
    },
    SkillLevelUp {
        skill: SkillType,
        from: u8,
        to: u8,
    },
    BuffApplied {
        stat: String,
        source: String,
        magnitude: f64,
    },
    BuffExpired {
        stat: String,
        source: String,
    },
    ItemEquipped {
        slot: EquipSlot,
        item: String,
    },
    ItemUnequipped {
        slot: EquipSlot,
        item: String,
    },
    ToolBroken {
        slot: EquipSlot,
        item: String,
    },
}

impl GameEvent {
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::TravelStarted { .. } => EventKind::TravelStarted,
            Self::Arrived { .. } => EventKind::Arrived,
            Self::EncounterTriggered { .. } => EventKind::EncounterTriggered,
            Self::GatheringStarted { .. } => EventKind::GatheringStarted,
            Self::GatheringCompleted { .. } => EventKind::GatheringCompleted,
            Self::GatheringCancelled { .. } => EventKind::GatheringCancelled,
            Self::CraftingStarted { .. } => EventKind::CraftingStarted,
            Self::CraftingCompleted { .. } => EventKind::CraftingCompleted,
            Self::CraftingCancelled { .. } => EventKind::CraftingCancelled,
            Self::CraftingPaused { .. } => EventKind::CraftingPaused,
            Self::SkillLevelUp { .. } => EventKind::SkillLevelUp,
            Self::BuffApplied { .. } => EventKind::BuffApplied,
            Self::BuffExpired { .. } => EventKind::BuffExpired,
            Self::ItemEquipped { .. } => EventKind::ItemEquipped,
            Self::ItemUnequipped { .. } => EventKind::ItemUnequipped,
            Self::ToolBroken { .. } => EventKind::ToolBroken,
        }
    }
}

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback = Box<dyn FnMut(&GameEvent)>;

struct Subscriber {
    id: SubscriptionId,
    filter: Option<EventKind>,
    callback: Callback,
}

struct BusInner {
    subscribers: Vec<Subscriber>,
    removed: Vec<SubscriptionId>,
    pending: VecDeque<GameEvent>,
    journal: VecDeque<GameEvent>,
    journal_capacity: usize,
    dispatching: bool,
    next_id: u64,
}

impl Default for BusInner {
    fn default() -> Self {
        Self {
            subscribers: Vec::new(),
            removed: Vec::new(),
            pending: VecDeque::new(),
            journal: VecDeque::new(),
            journal_capacity: EVENT_JOURNAL_CAPACITY,
            dispatching: false,
            next_id: 0,
        }
    }
}

impl BusInner {
    fn record(&mut self, event: &GameEvent) {
        if self.journal_capacity == 0 {
            return;
        }
        while self.journal.len() >= self.journal_capacity {
            self.journal.pop_front();
        }
        self.journal.push_back(event.clone());
    }
}

/// Shared, cloneable handle to one event bus.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Rc<RefCell<BusInner>>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("EventBus")
            .field("subscribers", &inner.subscribers.len())
            .field("journal", &inner.journal.len())
            .finish()
    }
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A bus whose journal keeps at most `capacity` events; zero turns it off.
    #[must_use]
    pub fn with_journal_capacity(capacity: usize) -> Self {
        let bus = Self::default();
        bus.inner.borrow_mut().journal_capacity = capacity;
        bus
    }

    /// Register a callback for one event kind, or for all events with `None`.
    pub fn subscribe(
        &self,
        filter: Option<EventKind>,
        callback: impl FnMut(&GameEvent) + 'static,
    ) -> SubscriptionId {
        let mut inner = self.inner.borrow_mut();
        inner.next_id += 1;
        let id = SubscriptionId(inner.next_id);
        inner.subscribers.push(Subscriber {
            id,
            filter,
            callback: Box::new(callback),
        });
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut inner = self.inner.borrow_mut();
        inner.subscribers.retain(|sub| sub.id != id);
        inner.removed.push(id);
    }

    /// Fire an event to every matching subscriber and record it in the journal.
    pub fn emit(&self, event: GameEvent) {
        log::debug!(target: LOG_TARGET_EVENTS, "emit {}", event.kind().name());
        {
            let mut inner = self.inner.borrow_mut();
            inner.record(&event);
            inner.pending.push_back(event);
            if inner.dispatching {
                return;
            }
        }
        self.flush();
    }

    /// Run `f` with delivery held back; events it emits are delivered after it
    /// returns, once collaborator borrows taken inside `f` are released.
    pub fn hold<T>(&self, f: impl FnOnce() -> T) -> T {
        let was_dispatching = std::mem::replace(&mut self.inner.borrow_mut().dispatching, true);
        let out = f();
        if !was_dispatching {
            self.flush();
        }
        out
    }

    fn flush(&self) {
        self.inner.borrow_mut().dispatching = true;
        loop {
            let (next, mut subscribers) = {
                let mut inner = self.inner.borrow_mut();
                let Some(next) = inner.pending.pop_front() else {
                    inner.dispatching = false;
                    break;
                };
                inner.removed.clear();
                (next, std::mem::take(&mut inner.subscribers))
            };
            let kind = next.kind();
            for sub in &mut subscribers {
                if sub.filter.is_none_or(|filter| filter == kind) {
                    (sub.callback)(&next);
                }
            }
            let mut inner = self.inner.borrow_mut();
            let removed = std::mem::take(&mut inner.removed);
            subscribers.retain(|sub| !removed.contains(&sub.id));
            // Keep subscriptions added during dispatch.
            let added = std::mem::take(&mut inner.subscribers);
            subscribers.extend(added);
            inner.subscribers = subscribers;
        }
    }

    /// Take the journaled events, oldest first.
    pub fn drain(&self) -> Vec<GameEvent> {
        self.inner.borrow_mut().journal.drain(..).collect()
    }

    #[must_use]
    pub fn journal_len(&self) -> usize {
        self.inner.borrow().journal.len()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arrived(location: &str) -> GameEvent {
        GameEvent::Arrived {
            from: "millbrook".into(),
            location: location.into(),
            duration_minutes: 10.0,
            at: SimTime::ZERO,
        }
    }

    #[test]
    fn subscribers_receive_matching_events() {
        let bus = EventBus::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let all = Rc::new(RefCell::new(0));
        {
            let seen = seen.clone();
            bus.subscribe(Some(EventKind::Arrived), move |event| {
                seen.borrow_mut().push(event.clone());
            });
        }
        {
            let all = all.clone();
            bus.subscribe(None, move |_| *all.borrow_mut() += 1);
        }
        bus.emit(arrived("harrowgate"));
        bus.emit(GameEvent::GatheringCancelled {
            action: "mine_iron".into(),
        });
        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(*all.borrow(), 2);
        assert_eq!(bus.drain().len(), 2);
        assert!(bus.drain().is_empty());
    }

    #[test]
    fn reentrant_emit_is_queued_not_recursive() {
        let bus = EventBus::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        {
            let bus_inner = bus.clone();
            let order = order.clone();
            bus.subscribe(None, move |event| {
                order.borrow_mut().push(event.kind());
                if event.kind() == EventKind::Arrived {
                    bus_inner.emit(GameEvent::GatheringCancelled {
                        action: "noop".into(),
                    });
                }
            });
        }
        bus.emit(arrived("ashford"));
        assert_eq!(
            *order.borrow(),
            vec![EventKind::Arrived, EventKind::GatheringCancelled]
        );
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let count = Rc::new(RefCell::new(0));
        let id = {
            let count = count.clone();
            bus.subscribe(None, move |_| *count.borrow_mut() += 1)
        };
        bus.emit(arrived("a"));
        bus.unsubscribe(id);
        bus.emit(arrived("b"));
        assert_eq!(*count.borrow(), 1);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn held_events_are_delivered_after_the_closure() {
        let bus = EventBus::new();
        let count = Rc::new(RefCell::new(0));
        {
            let count = count.clone();
            bus.subscribe(None, move |_| *count.borrow_mut() += 1);
        }
        let seen_inside = bus.hold(|| {
            bus.emit(arrived("a"));
            bus.emit(arrived("b"));
            *count.borrow()
        });
        assert_eq!(seen_inside, 0);
        assert_eq!(*count.borrow(), 2);
    }

    #[test]
    fn journal_keeps_only_the_newest_events() {
        let bus = EventBus::new();
        bus.subscribe(None, |_| {});
        for step in 0..10_000 {
            bus.emit(arrived(&format!("stop-{step}")));
        }
        assert_eq!(bus.journal_len(), EVENT_JOURNAL_CAPACITY);
        let kept = bus.drain();
        assert_eq!(kept.len(), EVENT_JOURNAL_CAPACITY);
        assert_eq!(kept.last(), Some(&arrived("stop-9999")));
        assert_eq!(bus.journal_len(), 0);
    }

    #[test]
    fn zero_capacity_disables_the_journal() {
        let bus = EventBus::with_journal_capacity(0);
        let count = Rc::new(RefCell::new(0));
        {
            let count = count.clone();
            bus.subscribe(None, move |_| *count.borrow_mut() += 1);
        }
        bus.emit(arrived("a"));
        assert_eq!(*count.borrow(), 1);
        assert!(bus.drain().is_empty());
    }

    #[test]
    fn event_names_match_kinds() {
        assert_eq!(arrived("x").kind().name(), "arrived");
        let json = serde_json::to_value(arrived("x")).unwrap();
        assert_eq!(json["event"], "arrived");
    }
}
