//! Skill experience and level progression.
//!
//! Levels are a pure function of accumulated experience via
//! [`SKILL_XP_TABLE`]. Experience only ever grows, so levels never drop.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::constants::{MAX_SKILL_LEVEL, SKILL_XP_TABLE};

/// Gathering and crafting disciplines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillType {
    Mining,
    Woodcutting,
    Fishing,
    Herbalism,
    Hunting,
    Smithing,
    Smelting,
    Weaving,
    Carpentry,
    Cooking,
    Alchemy,
}

impl SkillType {
    pub const ALL: [Self; 11] = [
        Self::Mining,
        Self::Woodcutting,
        Self::Fishing,
        Self::Herbalism,
        Self::Hunting,
        Self::Smithing,
        Self::Smelting,
        Self::Weaving,
        Self::Carpentry,
        Self::Cooking,
        Self::Alchemy,
    ];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Mining => "Mining",
            Self::Woodcutting => "Woodcutting",
            Self::Fishing => "Fishing",
            Self::Herbalism => "Herbalism",
            Self::Hunting => "Hunting",
            Self::Smithing => "Smithing",
            Self::Smelting => "Smelting",
            Self::Weaving => "Weaving",
            Self::Carpentry => "Carpentry",
            Self::Cooking => "Cooking",
            Self::Alchemy => "Alchemy",
        }
    }
}

/// Level reached with `xp` cumulative experience.
#[must_use]
pub fn skill_level(xp: u32) -> u8 {
    let reached = SKILL_XP_TABLE
        .iter()
        .skip(1)
        .take_while(|threshold| xp >= **threshold)
        .count();
    u8::try_from(reached).unwrap_or(MAX_SKILL_LEVEL).min(MAX_SKILL_LEVEL)
}

/// Experience still needed for the next level, `None` at the cap.
#[must_use]
pub fn xp_to_next_level(xp: u32) -> Option<u32> {
    let next = usize::from(skill_level(xp)) + 1;
    SKILL_XP_TABLE
        .get(next)
        .map(|threshold| threshold.saturating_sub(xp))
}

/// A level boundary crossed by a single experience grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelUp {
    pub skill: SkillType,
    pub from: u8,
    pub to: u8,
}

/// Per-skill experience ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillBook {
    #[serde(default)]
    xp: BTreeMap<SkillType, u32>,
}

impl SkillBook {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn xp(&self, skill: SkillType) -> u32 {
        self.xp.get(&skill).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn level(&self, skill: SkillType) -> u8 {
        skill_level(self.xp(skill))
    }

    /// Accumulate experience and report a level-up when a boundary was crossed.
    pub fn add_xp(&mut self, skill: SkillType, amount: u32) -> Option<LevelUp> {
        let before = self.xp(skill);
        let after = before.saturating_add(amount);
        self.xp.insert(skill, after);
        let (from, to) = (skill_level(before), skill_level(after));
        (to > from).then_some(LevelUp { skill, from, to })
    }

    /// Snapshot of levels for every skill with recorded experience.
    #[must_use]
    pub fn levels(&self) -> BTreeMap<SkillType, u8> {
        self.xp
            .iter()
            .map(|(skill, xp)| (*skill, skill_level(*xp)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_thresholds_map_to_exact_levels() {
        for (level, threshold) in SKILL_XP_TABLE.iter().enumerate() {
            assert_eq!(usize::from(skill_level(*threshold)), level);
        }
        assert_eq!(skill_level(SKILL_XP_TABLE[3] - 1), 2);
        assert_eq!(skill_level(u32::MAX), MAX_SKILL_LEVEL);
    }

    #[test]
    fn level_is_monotonic_in_xp() {
        let mut last = 0;
        for xp in (0..=5_000).step_by(7) {
            let level = skill_level(xp);
            assert!(level >= last, "level dropped at {xp}");
            last = level;
        }
    }

    #[test]
    fn level_up_fires_only_on_boundary_crossing() {
        let mut book = SkillBook::new();
        assert_eq!(book.add_xp(SkillType::Mining, 49), None);
        let up = book.add_xp(SkillType::Mining, 1).expect("crossed level 1");
        assert_eq!((up.from, up.to), (0, 1));
        assert_eq!(book.add_xp(SkillType::Mining, 10), None);

        let jump = book.add_xp(SkillType::Mining, 500).expect("multi-level jump");
        assert_eq!((jump.from, jump.to), (1, 4));
        assert_eq!(book.level(SkillType::Mining), 4);
        assert_eq!(book.level(SkillType::Fishing), 0);
    }

    #[test]
    fn xp_to_next_level_reports_gap_and_cap() {
        assert_eq!(xp_to_next_level(0), Some(50));
        assert_eq!(xp_to_next_level(60), Some(90));
        assert_eq!(xp_to_next_level(SKILL_XP_TABLE[10]), None);
    }
}
