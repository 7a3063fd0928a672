use serde::{Deserialize, Serialize};

use crate::{CityId, Coord, GameOutcome, PlayerId, Relation, Resource, Terrain, UnitId, UnitKind};

/// Full structural dump of a match, for persistence and rejoin.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub map_size: u32,
    pub turn: u32,
    pub max_turns: u32,
    pub current_player: PlayerId,
    pub num_players: u32,
    pub players: Vec<PlayerSnapshot>,
    /// Explored tile keys (`"x,z"`) per player, indexed by player id.
    #[serde(default)]
    pub explored: Vec<Vec<String>>,
    /// Ordered-pair relations. Missing pairs restore as neutral.
    #[serde(default)]
    pub diplomacy: Vec<RelationSnapshot>,
    /// Flat tile list; order is not significant.
    pub tiles: Vec<TileSnapshot>,
    pub units: Vec<UnitSnapshot>,
    pub cities: Vec<CitySnapshot>,
    #[serde(default)]
    pub unit_slots: StoreLayout,
    #[serde(default)]
    pub city_slots: StoreLayout,
    #[serde(default)]
    pub outcome: Option<GameOutcome>,
    pub rng_state: [u8; 32],
}

/// Slot generations and free list of an entity store, so restored stores hand out the
/// same ids the original would have.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreLayout {
    pub generations: Vec<u32>,
    pub free: Vec<u32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TileSnapshot {
    pub x: i32,
    pub z: i32,
    pub terrain: Terrain,
    #[serde(default)]
    pub resource: Option<Resource>,
    #[serde(default)]
    pub building: Option<String>,
    #[serde(default)]
    pub owner: Option<PlayerId>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub stars: i32,
    #[serde(default)]
    pub stars_per_turn: i32,
    #[serde(default)]
    pub cities: Vec<Coord>,
    #[serde(default)]
    pub techs: Vec<String>,
    pub alive: bool,
    #[serde(default)]
    pub wins: u32,
    #[serde(default)]
    pub losses: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RelationSnapshot {
    pub from: PlayerId,
    pub to: PlayerId,
    #[serde(default)]
    pub relation: Relation,
    #[serde(default)]
    pub has_embassy: bool,
    #[serde(default)]
    pub peace_offered: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnitSnapshot {
    pub id: UnitId,
    pub kind: UnitKind,
    pub owner: PlayerId,
    pub pos: Coord,
    pub hp: i32,
    pub max_hp: i32,
    #[serde(default)]
    pub moved: bool,
    #[serde(default)]
    pub attacked: bool,
    #[serde(default)]
    pub veteran: bool,
    #[serde(default)]
    pub fortified: bool,
    #[serde(default)]
    pub was_idle: bool,
    #[serde(default)]
    pub kills: u32,
    #[serde(default)]
    pub city_ref: Option<CityId>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CitySnapshot {
    pub id: CityId,
    pub pos: Coord,
    pub owner: PlayerId,
    pub level: u8,
    pub population: i32,
    pub max_population: i32,
    #[serde(default)]
    pub is_capital: bool,
    #[serde(default)]
    pub walls: bool,
    #[serde(default)]
    pub workshop: bool,
    #[serde(default)]
    pub park: bool,
    #[serde(default = "default_territory_radius")]
    pub territory_radius: i32,
    #[serde(default)]
    pub pending_upgrades: Vec<u8>,
}

fn default_territory_radius() -> i32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relation_fields_default_when_missing() {
        let rel: RelationSnapshot = serde_json::from_str(r#"{"from":0,"to":1}"#).unwrap();
        assert_eq!(rel.relation, Relation::Neutral);
        assert!(!rel.has_embassy);
        assert!(!rel.peace_offered);
    }

    #[test]
    fn city_defaults_to_radius_one() {
        let json = r#"{"id":0,"pos":{"x":1,"z":2},"owner":0,"level":1,"population":0,"max_population":2}"#;
        let city: CitySnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(city.territory_radius, 1);
        assert!(city.pending_upgrades.is_empty());
    }
}
