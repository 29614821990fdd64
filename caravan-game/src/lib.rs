//! Caravan Game Engine
//!
//! Deterministic core simulation for an overland trading game: travel between
//! map locations with random encounters, resource gathering, and per-facility
//! crafting queues. Time comes from a host-driven clock; there is no wall clock,
//! rendering or persistence in this crate.

pub mod catalog;
pub mod clock;
pub mod config;
pub mod constants;
pub mod context;
pub mod equipment;
pub mod error;
pub mod events;
pub mod inventory;
pub mod items;
pub mod numbers;
pub mod rng;
pub mod scheduler;
pub mod session;
pub mod skills;
pub mod travel;
pub mod world;

// Re-export commonly used types
pub use catalog::{Catalog, CatalogData, CatalogError};
pub use clock::{Clock, SimClock, SimTime};
pub use config::{
    ConfigError, EncounterRoll, SchedulerConfig, SimConfig, TransportSpeeds, TravelConfig,
};
pub use context::{Collaborators, CollaboratorsBuilder, SharedEquipment, SharedInventory};
pub use equipment::{EquippedItem, Equipment, Wear};
pub use error::{ActionError, ActionResult, Requirement};
pub use events::{EventBus, EventKind, GameEvent, SubscriptionId};
pub use inventory::{Inventory, ItemLedger};
pub use items::{ConsumableEffect, EquipSlot, ItemDef};
pub use rng::{CountingRng, RngBundle, StreamRng};
pub use scheduler::{
    Buff, BuffList, CraftFault, CraftQueueEntry, CraftStatus, CraftedUnit, FacilityQueue,
    GatherAction, GatherTask, GatherYield, NoPerks, PerkHook, Recipe, RecipeInput,
    SchedulerReport, TaskScheduler, ToolBonus, YieldRange,
};
pub use session::{AdvanceReport, GameSession, SessionError};
pub use skills::{LevelUp, SkillBook, SkillType, skill_level, xp_to_next_level};
pub use travel::{
    EncounterKind, EncounterOutcome, EncounterReport, Journey, Resolution, TransportMode,
    TravelPlan, TravelRecord, TravelSimulator, TravelState, TravelTick, compute_travel_plan,
};
pub use world::{
    Coord, Location, LocationCategory, MapEntity, Path, PathQuality, PointOfInterest,
    ResourceNode, World, WorldError,
};

use thiserror::Error;

/// Trait for abstracting content loading.
/// Hosts with their own asset pipeline provide this.
pub trait ContentLoader {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load the world map.
    ///
    /// # Errors
    ///
    /// Returns an error if the world cannot be loaded or fails validation.
    fn load_world(&self) -> Result<World, Self::Error>;

    /// Load gather actions, recipes and items.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be loaded or fails validation.
    fn load_catalog(&self) -> Result<Catalog, Self::Error>;

    /// Load tuning values. Defaults apply when the host has none.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be parsed.
    fn load_config(&self) -> Result<SimConfig, Self::Error> {
        Ok(SimConfig::default())
    }
}

#[derive(Debug, Error)]
pub enum ContentError {
    #[error(transparent)]
    World(#[from] WorldError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Content bundled into the crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedContent;

impl ContentLoader for EmbeddedContent {
    type Error = ContentError;

    fn load_world(&self) -> Result<World, Self::Error> {
        Ok(World::default_world()?)
    }

    fn load_catalog(&self) -> Result<Catalog, Self::Error> {
        Ok(Catalog::default_catalog()?)
    }
}

/// Entry point for hosts: loads content and builds sessions.
pub struct CaravanEngine<L>
where
    L: ContentLoader,
{
    loader: L,
}

impl<L> CaravanEngine<L>
where
    L: ContentLoader,
{
    pub const fn new(loader: L) -> Self {
        Self { loader }
    }

    /// Create a session with default collaborators.
    ///
    /// # Errors
    ///
    /// Returns an error if content cannot be loaded or the config is invalid.
    pub fn create_session(&self, seed: u64) -> anyhow::Result<GameSession>
    where
        L::Error: Into<anyhow::Error>,
    {
        self.create_session_with(seed, Collaborators::default())
    }

    /// Create a session sharing the host's inventory, equipment and event bus.
    ///
    /// # Errors
    ///
    /// Returns an error if content cannot be loaded or the config is invalid.
    pub fn create_session_with(
        &self,
        seed: u64,
        collab: Collaborators,
    ) -> anyhow::Result<GameSession>
    where
        L::Error: Into<anyhow::Error>,
    {
        let world = self.loader.load_world().map_err(Into::into)?;
        let catalog = self.loader.load_catalog().map_err(Into::into)?;
        let cfg = self.loader.load_config().map_err(Into::into)?;
        Ok(GameSession::new(seed, world, catalog, cfg, collab)?)
    }
}
