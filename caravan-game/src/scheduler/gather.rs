//! Gathering actions: requirement checks and the yield/time pipeline.
//!
//! Both calculations run base value, then equipped-tool bonus, then skill
//! bonus (`1 + level * 0.1`), then the perk hook. Yield is floored after the
//! tool and skill stages combined and again after the perk stage.
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::clock::SimTime;
use crate::constants::SKILL_BONUS_PER_LEVEL;
use crate::error::Requirement;
use crate::numbers::floor_f64_to_u32;
use crate::skills::{SkillBook, SkillType};
use crate::world::{LocationCategory, MapEntity};

const fn one() -> f64 {
    1.0
}

/// Bonus granted when a specific tool is equipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolBonus {
    pub tool: String,
    #[serde(default = "one")]
    pub yield_mult: f64,
    #[serde(default = "one")]
    pub speed_mult: f64,
}

/// Inclusive quantity range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YieldRange {
    pub min: u32,
    pub max: u32,
}

impl YieldRange {
    #[must_use]
    pub const fn contains(self, qty: u32) -> bool {
        qty >= self.min && qty <= self.max
    }

    /// Both bounds scaled by node abundance. Order is preserved.
    #[must_use]
    pub fn scaled_by(self, abundance: f64) -> Self {
        Self {
            min: scale_by_abundance(self.min, abundance),
            max: scale_by_abundance(self.max, abundance),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatherAction {
    pub id: String,
    pub name: String,
    pub skill: SkillType,
    #[serde(default)]
    pub required_level: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_tool: Option<String>,
    /// Allowed site categories; empty means anywhere.
    #[serde(default)]
    pub location_types: Vec<LocationCategory>,
    /// Resource the site must offer; its abundance scales the yield.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    /// Item deposited on completion.
    pub item: String,
    pub base_yield: YieldRange,
    pub base_time_secs: f64,
    pub skill_gain: u32,
    #[serde(default)]
    pub tool_bonuses: Vec<ToolBonus>,
}

impl GatherAction {
    #[must_use]
    pub fn tool_bonus(&self, tool: Option<&str>) -> Option<&ToolBonus> {
        let tool = tool?;
        self.tool_bonuses.iter().find(|bonus| bonus.tool == tool)
    }

    /// Whether `tool` satisfies the required tool, directly or as an upgrade.
    #[must_use]
    pub fn accepts_tool(&self, tool: Option<&str>) -> bool {
        match (&self.required_tool, tool) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(required), Some(tool)) => required == tool || self.tool_bonus(Some(tool)).is_some(),
        }
    }
}

/// Multipliers from sources outside the core, such as perks.
pub trait PerkHook {
    fn gather_yield_multiplier(&self, _action: &GatherAction) -> f64 {
        1.0
    }

    fn gather_speed_multiplier(&self, _action: &GatherAction) -> f64 {
        1.0
    }
}

/// No perks.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPerks;

impl PerkHook for NoPerks {}

fn skill_multiplier(level: u8) -> f64 {
    SKILL_BONUS_PER_LEVEL.mul_add(f64::from(level), 1.0)
}

/// Check skill, tool, site category and resource, in that order.
///
/// # Errors
///
/// The first unmet [`Requirement`]. A missing site means the party is on the road.
pub fn can_gather(
    action: &GatherAction,
    tool: Option<&str>,
    skills: &SkillBook,
    site: Option<&MapEntity>,
) -> Result<(), Requirement> {
    let current = skills.level(action.skill);
    if current < action.required_level {
        return Err(Requirement::SkillLevel {
            skill: action.skill,
            required: action.required_level,
            current,
        });
    }
    if !action.accepts_tool(tool) {
        return Err(Requirement::Tool {
            tool: action.required_tool.clone().unwrap_or_default(),
        });
    }
    let Some(site) = site else {
        return Err(Requirement::NotWhileTraveling);
    };
    if !action.location_types.is_empty() && !action.location_types.contains(&site.category()) {
        return Err(Requirement::Location {
            allowed: action
                .location_types
                .iter()
                .map(|category| category.label().to_string())
                .collect(),
        });
    }
    if let Some(resource) = &action.resource {
        let offered = match site {
            MapEntity::ResourceNode(node) => node.abundance(resource).is_some(),
            _ => false,
        };
        if !offered {
            return Err(Requirement::Resource {
                resource: resource.clone(),
            });
        }
    }
    Ok(())
}

/// Yield range after bonuses. Always `min <= max`.
#[must_use]
pub fn calculate_gather_yield(
    action: &GatherAction,
    tool: Option<&str>,
    level: u8,
    perks: &dyn PerkHook,
) -> YieldRange {
    let tool_mult = action.tool_bonus(tool).map_or(1.0, |bonus| bonus.yield_mult);
    let bonus = tool_mult * skill_multiplier(level);
    let perk = perks.gather_yield_multiplier(action);
    let stage = |base: u32| {
        let boosted = floor_f64_to_u32(f64::from(base) * bonus);
        floor_f64_to_u32(f64::from(boosted) * perk)
    };
    let min = stage(action.base_yield.min);
    let max = stage(action.base_yield.max).max(min);
    YieldRange { min, max }
}

/// Seconds the action takes after bonuses, never below `floor_secs`.
#[must_use]
pub fn calculate_gather_time(
    action: &GatherAction,
    tool: Option<&str>,
    level: u8,
    perks: &dyn PerkHook,
    floor_secs: f64,
) -> f64 {
    let tool_mult = action.tool_bonus(tool).map_or(1.0, |bonus| bonus.speed_mult);
    let mut secs = action.base_time_secs;
    for mult in [tool_mult, skill_multiplier(level), perks.gather_speed_multiplier(action)] {
        if mult > 0.0 {
            secs /= mult;
        }
    }
    secs.max(floor_secs)
}

/// Apply node abundance to a yield bound. A non-zero bound stays at least one.
#[must_use]
pub fn scale_by_abundance(drawn: u32, abundance: f64) -> u32 {
    if drawn == 0 {
        return 0;
    }
    floor_f64_to_u32(f64::from(drawn) * abundance.clamp(0.0, 1.0)).max(1)
}

/// The single active gathering task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatherTask {
    pub action_id: String,
    pub started_at: SimTime,
    pub duration: Duration,
    pub progress: f64,
    pub yield_range: YieldRange,
    /// Resource node to deplete on completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
}

impl GatherTask {
    #[must_use]
    pub fn progress_at(&self, now: SimTime) -> f64 {
        let total = self.duration.as_secs_f64();
        if total <= 0.0 {
            return 1.0;
        }
        (now.saturating_since(self.started_at).as_secs_f64() / total).clamp(self.progress, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{Coord, Location, ResourceNode, ResourceYield};

    fn mine_iron() -> GatherAction {
        GatherAction {
            id: "mine_iron".into(),
            name: "Mine Iron".into(),
            skill: SkillType::Mining,
            required_level: 0,
            required_tool: Some("bronze_pickaxe".into()),
            location_types: vec![LocationCategory::ResourceNode],
            resource: Some("iron_ore".into()),
            item: "iron_ore".into(),
            base_yield: YieldRange { min: 1, max: 3 },
            base_time_secs: 6.0,
            skill_gain: 25,
            tool_bonuses: vec![ToolBonus {
                tool: "iron_pickaxe".into(),
                yield_mult: 1.5,
                speed_mult: 1.25,
            }],
        }
    }

    fn node(resource: &str) -> MapEntity {
        MapEntity::ResourceNode(ResourceNode {
            id: "hills".into(),
            name: "Hills".into(),
            center: Coord::new(0.0, 0.0),
            radius: 5.0,
            resources: vec![ResourceYield {
                resource: resource.into(),
                abundance: 1.0,
            }],
        })
    }

    fn village() -> MapEntity {
        MapEntity::Location(Location {
            id: "village".into(),
            name: "Village".into(),
            position: Coord::new(0.0, 0.0),
            category: LocationCategory::Village,
            services: Vec::new(),
            facilities: Vec::new(),
        })
    }

    #[test]
    fn tool_and_skill_bonus_match_expected_range() {
        let range = calculate_gather_yield(&mine_iron(), Some("iron_pickaxe"), 2, &NoPerks);
        assert_eq!(range, YieldRange { min: 1, max: 5 });
        let plain = calculate_gather_yield(&mine_iron(), Some("bronze_pickaxe"), 0, &NoPerks);
        assert_eq!(plain, YieldRange { min: 1, max: 3 });
    }

    #[test]
    fn perk_stage_floors_again() {
        struct Double;
        impl PerkHook for Double {
            fn gather_yield_multiplier(&self, _: &GatherAction) -> f64 {
                2.0
            }
            fn gather_speed_multiplier(&self, _: &GatherAction) -> f64 {
                2.0
            }
        }
        let range = calculate_gather_yield(&mine_iron(), Some("iron_pickaxe"), 2, &Double);
        assert_eq!(range, YieldRange { min: 2, max: 10 });
        let secs = calculate_gather_time(&mine_iron(), None, 0, &Double, 1.0);
        assert!((secs - 3.0).abs() < 1e-9);
    }

    #[test]
    fn gather_time_applies_bonuses_and_floor() {
        let secs = calculate_gather_time(&mine_iron(), Some("iron_pickaxe"), 5, &NoPerks, 1.0);
        assert!((secs - 6.0 / 1.25 / 1.5).abs() < 1e-9);
        let quick = GatherAction {
            base_time_secs: 0.2,
            ..mine_iron()
        };
        assert!((calculate_gather_time(&quick, None, 0, &NoPerks, 1.0) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn requirements_are_checked_in_order() {
        let action = GatherAction {
            required_level: 2,
            ..mine_iron()
        };
        let skills = SkillBook::new();
        assert!(matches!(
            can_gather(&action, None, &skills, Some(&node("iron_ore"))),
            Err(Requirement::SkillLevel { required: 2, current: 0, .. })
        ));

        let action = mine_iron();
        assert_eq!(
            can_gather(&action, None, &skills, Some(&node("iron_ore"))),
            Err(Requirement::Tool {
                tool: "bronze_pickaxe".into()
            })
        );
        assert_eq!(
            can_gather(&action, Some("bronze_pickaxe"), &skills, None),
            Err(Requirement::NotWhileTraveling)
        );
        assert!(matches!(
            can_gather(&action, Some("bronze_pickaxe"), &skills, Some(&village())),
            Err(Requirement::Location { .. })
        ));
        assert_eq!(
            can_gather(&action, Some("iron_pickaxe"), &skills, Some(&node("stone"))),
            Err(Requirement::Resource {
                resource: "iron_ore".into()
            })
        );
        assert_eq!(
            can_gather(&action, Some("iron_pickaxe"), &skills, Some(&node("iron_ore"))),
            Ok(())
        );
    }

    #[test]
    fn abundance_scaling_keeps_a_minimum_of_one() {
        assert_eq!(scale_by_abundance(5, 1.0), 5);
        assert_eq!(scale_by_abundance(5, 0.5), 2);
        assert_eq!(scale_by_abundance(1, 0.01), 1);
        assert_eq!(scale_by_abundance(0, 1.0), 0);
    }

    #[test]
    fn scaled_range_keeps_its_order() {
        let range = YieldRange { min: 2, max: 4 };
        assert_eq!(range.scaled_by(1.0), range);
        assert_eq!(range.scaled_by(0.9), YieldRange { min: 1, max: 3 });
        assert_eq!(range.scaled_by(0.1), YieldRange { min: 1, max: 1 });
        assert_eq!(YieldRange { min: 0, max: 3 }.scaled_by(0.5), YieldRange { min: 0, max: 1 });
    }
}
