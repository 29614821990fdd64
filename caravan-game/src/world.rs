//! Map entities and the path graph connecting them.
//!
//! Locations, resource nodes and points of interest are loaded once and
//! resolved into a single id-keyed map of [`MapEntity`]. Paths are undirected.
//! The only state that changes after load is resource-node abundance.
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// Position on the world map, in map units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coord {
    pub x: f64,
    pub y: f64,
}

impl Coord {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub fn distance_to(self, other: Self) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    /// Point `t` of the way from `self` to `other`.
    #[must_use]
    pub fn lerp(self, other: Self, t: f64) -> Self {
        let t = t.clamp(0.0, 1.0);
        Self {
            x: (other.x - self.x).mul_add(t, self.x),
            y: (other.y - self.y).mul_add(t, self.y),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationCategory {
    City,
    Town,
    Village,
    ResourceNode,
    PointOfInterest,
}

impl LocationCategory {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::City => "city",
            Self::Town => "town",
            Self::Village => "village",
            Self::ResourceNode => "resource_node",
            Self::PointOfInterest => "point_of_interest",
        }
    }
}

/// A settlement with trade and crafting services.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
    pub name: String,
    pub position: Coord,
    pub category: LocationCategory,
    /// Service tags (market, inn, bank, ...).
    #[serde(default)]
    pub services: Vec<String>,
    /// Crafting facilities available here (forge, loom, ...).
    #[serde(default)]
    pub facilities: Vec<String>,
}

/// One gatherable resource at a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceYield {
    pub resource: String,
    #[serde(default = "ResourceYield::full")]
    pub abundance: f64,
}

impl ResourceYield {
    const fn full() -> f64 {
        1.0
    }
}

/// Circular gathering region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceNode {
    pub id: String,
    pub name: String,
    pub center: Coord,
    pub radius: f64,
    #[serde(default)]
    pub resources: Vec<ResourceYield>,
}

impl ResourceNode {
    #[must_use]
    pub fn abundance(&self, resource: &str) -> Option<f64> {
        self.resources
            .iter()
            .find(|entry| entry.resource == resource)
            .map(|entry| entry.abundance)
    }

    #[must_use]
    pub fn contains(&self, point: Coord) -> bool {
        self.center.distance_to(point) <= self.radius
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointOfInterest {
    pub id: String,
    pub name: String,
    pub position: Coord,
    #[serde(default)]
    pub description: String,
}

/// Anything the player can travel to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MapEntity {
    Location(Location),
    ResourceNode(ResourceNode),
    PointOfInterest(PointOfInterest),
}

impl MapEntity {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Location(loc) => &loc.id,
            Self::ResourceNode(node) => &node.id,
            Self::PointOfInterest(poi) => &poi.id,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Location(loc) => &loc.name,
            Self::ResourceNode(node) => &node.name,
            Self::PointOfInterest(poi) => &poi.name,
        }
    }

    #[must_use]
    pub const fn position(&self) -> Coord {
        match self {
            Self::Location(loc) => loc.position,
            Self::ResourceNode(node) => node.center,
            Self::PointOfInterest(poi) => poi.position,
        }
    }

    #[must_use]
    pub const fn category(&self) -> LocationCategory {
        match self {
            Self::Location(loc) => loc.category,
            Self::ResourceNode(_) => LocationCategory::ResourceNode,
            Self::PointOfInterest(_) => LocationCategory::PointOfInterest,
        }
    }

    #[must_use]
    pub fn has_facility(&self, facility: &str) -> bool {
        matches!(self, Self::Location(loc) if loc.facilities.iter().any(|f| f == facility))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathQuality {
    Poor,
    #[default]
    Fair,
    Good,
    Excellent,
}

const fn default_speed_multiplier() -> f64 {
    1.0
}

/// Undirected road between two map entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub waypoints: Vec<Coord>,
    #[serde(default)]
    pub quality: PathQuality,
    pub safety: f64,
    #[serde(default = "default_speed_multiplier")]
    pub speed_multiplier: f64,
}

impl Path {
    /// Straight road used when no direct edge exists.
    #[must_use]
    pub fn synthetic(from: &MapEntity, to: &MapEntity, safety: f64) -> Self {
        Self {
            from: from.id().to_string(),
            to: to.id().to_string(),
            waypoints: vec![from.position(), to.position()],
            quality: PathQuality::Fair,
            safety,
            speed_multiplier: default_speed_multiplier(),
        }
    }

    #[must_use]
    pub fn connects(&self, a: &str, b: &str) -> bool {
        (self.from == a && self.to == b) || (self.from == b && self.to == a)
    }
}

#[derive(Debug, Error)]
pub enum WorldError {
    #[error("world JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("duplicate map entity id: {0}")]
    DuplicateId(String),
    #[error("path {from} -> {to} references unknown entity {missing}")]
    DanglingPath {
        from: String,
        to: String,
        missing: String,
    },
    #[error("path {from} -> {to} safety {safety} outside [0, 1]")]
    PathSafety { from: String, to: String, safety: f64 },
    #[error("unknown spawn location: {0}")]
    UnknownSpawn(String),
}

/// Serialized world layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldData {
    pub spawn: String,
    #[serde(default)]
    pub locations: Vec<Location>,
    #[serde(default)]
    pub resource_nodes: Vec<ResourceNode>,
    #[serde(default)]
    pub points_of_interest: Vec<PointOfInterest>,
    #[serde(default)]
    pub paths: Vec<Path>,
}

/// Resolved world: one lookup map for every destination plus the path graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct World {
    spawn: String,
    entities: BTreeMap<String, MapEntity>,
    paths: Vec<Path>,
    #[serde(skip)]
    path_index: HashMap<(String, String), usize>,
}

fn edge_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

impl World {
    /// Load and validate a world from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed or the layout is inconsistent.
    pub fn from_json(json: &str) -> Result<Self, WorldError> {
        let data: WorldData = serde_json::from_str(json)?;
        Self::from_data(data)
    }

    /// Resolve raw world data into the lookup structure.
    ///
    /// # Errors
    ///
    /// Returns an error on duplicate ids, dangling path endpoints, out-of-range
    /// safety or an unknown spawn.
    pub fn from_data(data: WorldData) -> Result<Self, WorldError> {
        let mut entities = BTreeMap::new();
        let all = data
            .locations
            .into_iter()
            .map(MapEntity::Location)
            .chain(data.resource_nodes.into_iter().map(MapEntity::ResourceNode))
            .chain(
                data.points_of_interest
                    .into_iter()
                    .map(MapEntity::PointOfInterest),
            );
        for entity in all {
            let id = entity.id().to_string();
            if entities.insert(id.clone(), entity).is_some() {
                return Err(WorldError::DuplicateId(id));
            }
        }
        if !entities.contains_key(&data.spawn) {
            return Err(WorldError::UnknownSpawn(data.spawn));
        }
        for path in &data.paths {
            for endpoint in [&path.from, &path.to] {
                if !entities.contains_key(endpoint) {
                    return Err(WorldError::DanglingPath {
                        from: path.from.clone(),
                        to: path.to.clone(),
                        missing: endpoint.clone(),
                    });
                }
            }
            if !(0.0..=1.0).contains(&path.safety) {
                return Err(WorldError::PathSafety {
                    from: path.from.clone(),
                    to: path.to.clone(),
                    safety: path.safety,
                });
            }
        }
        let mut world = Self {
            spawn: data.spawn,
            entities,
            paths: data.paths,
            path_index: HashMap::new(),
        };
        world.reindex();
        Ok(world)
    }

    /// Embedded default world shipped with the crate.
    ///
    /// # Errors
    ///
    /// Returns an error if the bundled asset is malformed.
    pub fn default_world() -> Result<Self, WorldError> {
        Self::from_json(include_str!("../assets/world.json"))
    }

    fn reindex(&mut self) {
        self.path_index = self
            .paths
            .iter()
            .enumerate()
            .map(|(idx, path)| (edge_key(&path.from, &path.to), idx))
            .collect();
    }

    #[must_use]
    pub fn spawn(&self) -> &str {
        &self.spawn
    }

    #[must_use]
    pub fn entity(&self, id: &str) -> Option<&MapEntity> {
        self.entities.get(id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &MapEntity> {
        self.entities.values()
    }

    #[must_use]
    pub fn paths(&self) -> &[Path] {
        &self.paths
    }

    /// Direct edge between two entities, in either direction.
    #[must_use]
    pub fn direct_path(&self, a: &str, b: &str) -> Option<&Path> {
        if let Some(idx) = self.path_index.get(&edge_key(a, b)) {
            return self.paths.get(*idx);
        }
        // Index is skipped by serde; fall back to a scan after deserializing.
        self.paths.iter().find(|path| path.connects(a, b))
    }

    /// Multiply a node's abundance for `resource` by `factor`. Returns the new value.
    pub fn deplete(&mut self, node_id: &str, resource: &str, factor: f64) -> Option<f64> {
        let Some(MapEntity::ResourceNode(node)) = self.entities.get_mut(node_id) else {
            return None;
        };
        let entry = node
            .resources
            .iter_mut()
            .find(|entry| entry.resource == resource)?;
        entry.abundance *= factor.clamp(0.0, 1.0);
        Some(entry.abundance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL_WORLD: &str = r#"{
        "spawn": "millbrook",
        "locations": [
            {"id": "millbrook", "name": "Millbrook", "position": {"x": 0, "y": 0},
             "category": "village", "facilities": ["forge"]},
            {"id": "harrowgate", "name": "Harrowgate", "position": {"x": 300, "y": 0},
             "category": "city"}
        ],
        "resource_nodes": [
            {"id": "iron_hills", "name": "Iron Hills", "center": {"x": 50, "y": 40},
             "radius": 10, "resources": [{"resource": "iron_ore", "abundance": 1.0}]}
        ],
        "paths": [
            {"from": "harrowgate", "to": "millbrook", "quality": "good", "safety": 0.8}
        ]
    }"#;

    #[test]
    fn world_resolves_entities_and_undirected_paths() {
        let world = World::from_json(SMALL_WORLD).unwrap();
        assert_eq!(world.spawn(), "millbrook");
        assert_eq!(
            world.entity("iron_hills").map(MapEntity::category),
            Some(LocationCategory::ResourceNode)
        );
        let path = world.direct_path("millbrook", "harrowgate").unwrap();
        assert_eq!(path.quality, PathQuality::Good);
        assert!((path.speed_multiplier - 1.0).abs() < f64::EPSILON);
        assert!(world.direct_path("millbrook", "iron_hills").is_none());
        assert!(world.entity("millbrook").unwrap().has_facility("forge"));
    }

    #[test]
    fn dangling_paths_and_duplicates_are_rejected() {
        let dangling = r#"{"spawn": "a",
            "locations": [{"id": "a", "name": "A", "position": {"x": 0, "y": 0}, "category": "town"}],
            "paths": [{"from": "a", "to": "nowhere", "safety": 0.5}]}"#;
        assert!(matches!(
            World::from_json(dangling),
            Err(WorldError::DanglingPath { missing, .. }) if missing == "nowhere"
        ));

        let dup = r#"{"spawn": "a",
            "locations": [{"id": "a", "name": "A", "position": {"x": 0, "y": 0}, "category": "town"}],
            "points_of_interest": [{"id": "a", "name": "Ruin", "position": {"x": 1, "y": 1}}]}"#;
        assert!(matches!(World::from_json(dup), Err(WorldError::DuplicateId(id)) if id == "a"));
    }

    #[test]
    fn depletion_is_geometric() {
        let mut world = World::from_json(SMALL_WORLD).unwrap();
        let first = world.deplete("iron_hills", "iron_ore", 0.9).unwrap();
        let second = world.deplete("iron_hills", "iron_ore", 0.9).unwrap();
        assert!((first - 0.9).abs() < 1e-9);
        assert!((second - 0.81).abs() < 1e-9);
        assert!(world.deplete("millbrook", "iron_ore", 0.9).is_none());
    }

    #[test]
    fn lerp_interpolates_and_clamps() {
        let a = Coord::new(0.0, 0.0);
        let b = Coord::new(300.0, 100.0);
        assert_eq!(a.lerp(b, 0.5), Coord::new(150.0, 50.0));
        assert_eq!(a.lerp(b, 2.0), b);
    }

    #[test]
    fn bundled_world_loads() {
        let world = World::default_world().expect("bundled world");
        assert!(world.entity(world.spawn()).is_some());
    }
}
