//! Content tables: gather actions, recipes and items.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::items::ItemDef;
use crate::scheduler::craft::Recipe;
use crate::scheduler::gather::GatherAction;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("duplicate {kind} id: {id}")]
    DuplicateId { kind: &'static str, id: String },
    #[error("{owner} references unknown item {item}")]
    UnknownItem { owner: String, item: String },
    #[error("{id} has a non-positive duration")]
    InvalidTiming { id: String },
    #[error("{id} has yield min above max")]
    InvalidYield { id: String },
    #[error("{id} has zero quantity")]
    InvalidQuantity { id: String },
    #[error("{id} has a non-finite effect magnitude")]
    InvalidMagnitude { id: String },
}

/// Serialized catalog layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogData {
    #[serde(default)]
    pub items: Vec<ItemDef>,
    #[serde(default)]
    pub gather_actions: Vec<GatherAction>,
    #[serde(default)]
    pub recipes: Vec<Recipe>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    items: BTreeMap<String, ItemDef>,
    actions: BTreeMap<String, GatherAction>,
    recipes: BTreeMap<String, Recipe>,
}

fn index<T>(
    kind: &'static str,
    values: Vec<T>,
    id: impl Fn(&T) -> &str,
) -> Result<BTreeMap<String, T>, CatalogError> {
    let mut map = BTreeMap::new();
    for value in values {
        let key = id(&value).to_string();
        if map.contains_key(&key) {
            return Err(CatalogError::DuplicateId { kind, id: key });
        }
        map.insert(key, value);
    }
    Ok(map)
}

impl Catalog {
    /// Parse and validate a catalog.
    ///
    /// # Errors
    ///
    /// Returns an error on malformed JSON or inconsistent content.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let data: CatalogData = serde_json::from_str(json)?;
        Self::from_data(data)
    }

    /// Index and validate raw catalog data.
    ///
    /// # Errors
    ///
    /// Duplicate ids, references to unknown items, non-positive timings
    /// (consumable durations included), non-finite effect magnitudes,
    /// inverted yield ranges and zero output quantities are rejected.
    pub fn from_data(data: CatalogData) -> Result<Self, CatalogError> {
        let catalog = Self {
            items: index("item", data.items, |item| item.id.as_str())?,
            actions: index("gather action", data.gather_actions, |action| action.id.as_str())?,
            recipes: index("recipe", data.recipes, |recipe| recipe.id.as_str())?,
        };
        catalog.validate()?;
        Ok(catalog)
    }

    /// Embedded default catalog shipped with the crate.
    ///
    /// # Errors
    ///
    /// Returns an error if the bundled asset is malformed.
    pub fn default_catalog() -> Result<Self, CatalogError> {
        Self::from_json(include_str!("../assets/catalog.json"))
    }

    fn require_item(&self, owner: &str, item: &str) -> Result<(), CatalogError> {
        if self.items.contains_key(item) {
            Ok(())
        } else {
            Err(CatalogError::UnknownItem {
                owner: owner.to_string(),
                item: item.to_string(),
            })
        }
    }

    fn validate(&self) -> Result<(), CatalogError> {
        for item in self.items.values() {
            let Some(effect) = &item.consumable else {
                continue;
            };
            if !(effect.duration_secs > 0.0 && effect.duration_secs.is_finite()) {
                return Err(CatalogError::InvalidTiming {
                    id: item.id.clone(),
                });
            }
            if !effect.magnitude.is_finite() {
                return Err(CatalogError::InvalidMagnitude {
                    id: item.id.clone(),
                });
            }
        }
        for action in self.actions.values() {
            self.require_item(&action.id, &action.item)?;
            if let Some(tool) = &action.required_tool {
                self.require_item(&action.id, tool)?;
            }
            for bonus in &action.tool_bonuses {
                self.require_item(&action.id, &bonus.tool)?;
            }
            if !(action.base_time_secs > 0.0 && action.base_time_secs.is_finite()) {
                return Err(CatalogError::InvalidTiming {
                    id: action.id.clone(),
                });
            }
            if action.base_yield.min > action.base_yield.max {
                return Err(CatalogError::InvalidYield {
                    id: action.id.clone(),
                });
            }
        }
        for recipe in self.recipes.values() {
            self.require_item(&recipe.id, &recipe.output)?;
            for input in &recipe.inputs {
                self.require_item(&recipe.id, &input.item)?;
                if input.qty == 0 {
                    return Err(CatalogError::InvalidQuantity {
                        id: recipe.id.clone(),
                    });
                }
            }
            if recipe.unit_duration().is_none() {
                return Err(CatalogError::InvalidTiming {
                    id: recipe.id.clone(),
                });
            }
            if recipe.output_qty == 0 {
                return Err(CatalogError::InvalidQuantity {
                    id: recipe.id.clone(),
                });
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn item(&self, id: &str) -> Option<&ItemDef> {
        self.items.get(id)
    }

    #[must_use]
    pub fn action(&self, id: &str) -> Option<&GatherAction> {
        self.actions.get(id)
    }

    #[must_use]
    pub fn recipe(&self, id: &str) -> Option<&Recipe> {
        self.recipes.get(id)
    }

    pub fn items(&self) -> impl Iterator<Item = &ItemDef> {
        self.items.values()
    }

    pub fn actions(&self) -> impl Iterator<Item = &GatherAction> {
        self.actions.values()
    }

    pub fn recipes(&self) -> impl Iterator<Item = &Recipe> {
        self.recipes.values()
    }

    /// Recipes crafted at `facility`.
    pub fn recipes_for<'a>(&'a self, facility: &'a str) -> impl Iterator<Item = &'a Recipe> + 'a {
        self.recipes
            .values()
            .filter(move |recipe| recipe.facility == facility)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::ConsumableEffect;

    #[test]
    fn bundled_catalog_loads() {
        let catalog = Catalog::default_catalog().unwrap();
        assert!(catalog.action("mine_iron").is_some());
        assert!(catalog.recipe("smelt_iron_bar").is_some());
        assert!(catalog.item("iron_pickaxe").is_some_and(ItemDef::is_equippable));
        assert!(catalog.recipes_for("smelter").count() >= 1);
    }

    #[test]
    fn unknown_recipe_items_are_rejected() {
        let json = r#"{
            "items": [{"id": "iron_bar", "name": "Iron Bar"}],
            "recipes": [{"id": "bar", "name": "Bar", "facility": "smelter",
                         "inputs": [{"item": "mystery_ore", "qty": 1}],
                         "output": "iron_bar", "time_secs": 5, "skill": "smelting",
                         "skill_gain": 5}]
        }"#;
        let err = Catalog::from_json(json).unwrap_err();
        assert!(matches!(err, CatalogError::UnknownItem { ref item, .. } if item == "mystery_ore"));
    }

    #[test]
    fn duplicates_and_bad_timings_are_rejected() {
        let json = r#"{"items": [{"id": "a", "name": "A"}, {"id": "a", "name": "A2"}]}"#;
        assert!(matches!(
            Catalog::from_json(json).unwrap_err(),
            CatalogError::DuplicateId { kind: "item", .. }
        ));
        let json = r#"{
            "items": [{"id": "logs", "name": "Logs"}],
            "gather_actions": [{"id": "chop", "name": "Chop", "skill": "woodcutting",
                                "item": "logs", "base_yield": {"min": 1, "max": 2},
                                "base_time_secs": 0, "skill_gain": 5}]
        }"#;
        assert!(matches!(
            Catalog::from_json(json).unwrap_err(),
            CatalogError::InvalidTiming { .. }
        ));
    }

    #[test]
    fn consumable_effects_must_be_usable() {
        let json = r#"{"items": [{"id": "tonic", "name": "Tonic",
            "consumable": {"stat": "gather_speed", "magnitude": 0.1, "duration_secs": -5}}]}"#;
        assert!(matches!(
            Catalog::from_json(json).unwrap_err(),
            CatalogError::InvalidTiming { ref id } if id == "tonic"
        ));

        let tonic = |magnitude: f64, duration_secs: f64| ItemDef {
            id: "tonic".into(),
            name: "Tonic".into(),
            slot: None,
            durability: None,
            consumable: Some(ConsumableEffect {
                stat: "gather_speed".into(),
                magnitude,
                duration_secs,
            }),
        };
        let with_item = |item| CatalogData {
            items: vec![item],
            ..CatalogData::default()
        };
        assert!(matches!(
            Catalog::from_data(with_item(tonic(f64::NAN, 60.0))).unwrap_err(),
            CatalogError::InvalidMagnitude { .. }
        ));
        assert!(matches!(
            Catalog::from_data(with_item(tonic(0.1, f64::NAN))).unwrap_err(),
            CatalogError::InvalidTiming { .. }
        ));
        assert!(Catalog::from_data(with_item(tonic(0.1, 60.0))).is_ok());
    }
}
