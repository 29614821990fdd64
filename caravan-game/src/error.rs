//! Rejection reasons for player actions.
//!
//! Every action in the core returns `Result<_, ActionError>`; nothing in this
//! taxonomy is fatal. The UI surfaces [`ActionError::reason`] and the player
//! retries after correcting the precondition.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::skills::SkillType;

/// Which precondition of an action was not met.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Requirement {
    SkillLevel {
        skill: SkillType,
        required: u8,
        current: u8,
    },
    Tool {
        tool: String,
    },
    Location {
        allowed: Vec<String>,
    },
    Resource {
        resource: String,
    },
    Facility {
        required: String,
    },
    NotWhileTraveling,
}

impl std::fmt::Display for Requirement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SkillLevel {
                skill,
                required,
                current,
            } => write!(f, "{} level {required} required (have {current})", skill.label()),
            Self::Tool { tool } => write!(f, "requires {tool} equipped"),
            Self::Location { allowed } => {
                write!(f, "must be at one of: {}", allowed.join(", "))
            }
            Self::Resource { resource } => {
                write!(f, "no {resource} left to gather here")
            }
            Self::Facility { required } => write!(f, "must be crafted at a {required}"),
            Self::NotWhileTraveling => f.write_str("cannot do that while traveling"),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ActionError {
    #[error("unknown destination: {0}")]
    InvalidDestination(String),
    #[error("already traveling")]
    AlreadyTraveling,
    #[error("already gathering")]
    AlreadyGathering,
    #[error("not gathering")]
    NotGathering,
    #[error("requirements not met: {0}")]
    RequirementsNotMet(Requirement),
    #[error("recipe not found: {0}")]
    RecipeNotFound(String),
    #[error("action not found: {0}")]
    ActionNotFound(String),
    #[error("unknown item: {0}")]
    UnknownItem(String),
    #[error("item cannot be equipped: {0}")]
    ItemNotEquippable(String),
    #[error("item cannot be consumed: {0}")]
    ItemNotConsumable(String),
    #[error("not enough {item}: need {required}, have {available}")]
    InsufficientInventory {
        item: String,
        required: u32,
        available: u32,
    },
    #[error("queue entry not found: {0}")]
    EntryNotFound(u64),
    #[error("queue entry {0} cannot change state now")]
    EntryStateConflict(u64),
    #[error("quantity must be at least 1")]
    InvalidQuantity,
}

impl ActionError {
    /// Short human-readable rejection reason.
    #[must_use]
    pub fn reason(&self) -> String {
        self.to_string()
    }
}

impl From<Requirement> for ActionError {
    fn from(value: Requirement) -> Self {
        Self::RequirementsNotMet(value)
    }
}

/// Result alias used by every player action.
pub type ActionResult<T = ()> = Result<T, ActionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasons_are_human_readable() {
        let err = ActionError::from(Requirement::SkillLevel {
            skill: SkillType::Mining,
            required: 3,
            current: 1,
        });
        assert_eq!(
            err.reason(),
            "requirements not met: Mining level 3 required (have 1)"
        );
        let err = ActionError::InsufficientInventory {
            item: "iron_ore".into(),
            required: 4,
            available: 1,
        };
        assert_eq!(err.reason(), "not enough iron_ore: need 4, have 1");
    }
}
