//! Conversion between the live [`GameState`] and the flat [`Snapshot`] dump.

use thiserror::Error;
use tribes_protocol::{
    snapshot_hash, CitySnapshot, Coord, PlayerId, PlayerSnapshot, Snapshot, TileSnapshot,
    UnitSnapshot, WireError,
};

use crate::city::City;
use crate::diplomacy::DiplomacyState;
use crate::entities::EntityStore;
use crate::game::GameEngine;
use crate::map::{GameMap, Tile};
use crate::rng::GameRng;
use crate::rules::Rules;
use crate::state::{GameState, Player};
use crate::unit::Unit;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("snapshot lists {players} players but num_players is {num_players}")]
    PlayerCount { players: usize, num_players: u32 },
    #[error("tile {0} lies outside the map")]
    TileOutOfBounds(Coord),
    #[error("tile {0} appears more than once")]
    DuplicateTile(Coord),
    #[error("{0} tiles missing from the tile list")]
    MissingTiles(usize),
    #[error("unknown technology: {0}")]
    UnknownTech(String),
    #[error("unknown building: {0}")]
    UnknownBuilding(String),
    #[error("invalid explored tile key: {0}")]
    BadTileKey(String),
    #[error("two {0} entries share a slot")]
    DuplicateEntity(&'static str),
    #[error("city at {0} is off the map")]
    CityOutOfBounds(Coord),
}

impl GameState {
    pub fn snapshot(&self) -> Snapshot {
        let tiles = self
            .map
            .iter()
            .map(|(at, t)| TileSnapshot {
                x: at.x,
                z: at.z,
                terrain: t.terrain,
                resource: t.resource,
                building: t
                    .building
                    .and_then(|b| self.rules.building(b))
                    .map(|b| b.key.clone()),
                owner: t.owner,
            })
            .collect();

        let players = self
            .players
            .iter()
            .map(|p| PlayerSnapshot {
                id: p.id,
                stars: p.stars,
                stars_per_turn: p.stars_per_turn,
                cities: p.cities.clone(),
                techs: p
                    .techs
                    .iter()
                    .enumerate()
                    .filter(|(_, known)| **known)
                    .filter_map(|(i, _)| self.rules.techs.get(i).map(|t| t.key.clone()))
                    .collect(),
                alive: p.alive,
                wins: p.wins,
                losses: p.losses,
            })
            .collect();

        let explored = (0..self.players.len())
            .map(|i| {
                let Some(seen) = self.explored.get(i) else {
                    return Vec::new();
                };
                seen.iter()
                    .enumerate()
                    .filter(|(_, known)| **known)
                    .map(|(idx, _)| self.map.coord_at(idx).key())
                    .collect()
            })
            .collect();

        let units = self
            .units
            .iter_ordered()
            .map(|(id, u)| UnitSnapshot {
                id,
                kind: u.kind,
                owner: u.owner,
                pos: u.position,
                hp: u.hp,
                max_hp: u.max_hp,
                moved: u.moved,
                attacked: u.attacked,
                veteran: u.veteran,
                fortified: u.fortified,
                was_idle: u.was_idle,
                kills: u.kills,
                city_ref: u.city_ref,
            })
            .collect();

        let cities = self
            .cities
            .iter_ordered()
            .map(|(id, c)| CitySnapshot {
                id,
                pos: c.position,
                owner: c.owner,
                level: c.level,
                population: c.population,
                max_population: c.max_population,
                is_capital: c.is_capital,
                walls: c.walls,
                workshop: c.workshop,
                park: c.park,
                territory_radius: c.territory_radius,
                pending_upgrades: c.pending_upgrades.clone(),
            })
            .collect();

        Snapshot {
            map_size: self.map.size(),
            turn: self.turn,
            max_turns: self.max_turns,
            current_player: self.current_player,
            num_players: self.players.len() as u32,
            players,
            explored,
            diplomacy: self.diplomacy.to_snapshots(),
            tiles,
            units,
            cities,
            unit_slots: self.units.layout(),
            city_slots: self.cities.layout(),
            outcome: self.outcome.clone(),
            rng_state: self.rng.state_bytes(),
        }
    }

    /// Rebuilds a state from a snapshot taken under `rules`.
    ///
    /// The tile list may come in any order but must cover the grid exactly once. Missing
    /// diplomacy pairs come back neutral; missing explored lists come back empty.
    pub fn from_snapshot(snapshot: &Snapshot, rules: Rules) -> Result<Self, SnapshotError> {
        let num_players = snapshot.num_players as usize;
        if snapshot.players.len() != num_players {
            return Err(SnapshotError::PlayerCount {
                players: snapshot.players.len(),
                num_players: snapshot.num_players,
            });
        }

        let mut map = GameMap::new(snapshot.map_size, tribes_protocol::Terrain::Ocean);
        let mut filled = vec![false; map.len()];
        for t in &snapshot.tiles {
            let at = Coord::new(t.x, t.z);
            let idx = map.index_of(at).ok_or(SnapshotError::TileOutOfBounds(at))?;
            if filled[idx] {
                return Err(SnapshotError::DuplicateTile(at));
            }
            filled[idx] = true;
            let building = match &t.building {
                Some(key) => Some(
                    rules
                        .building_id(key)
                        .ok_or_else(|| SnapshotError::UnknownBuilding(key.clone()))?,
                ),
                None => None,
            };
            if let Some(tile) = map.get_mut(at) {
                *tile = Tile {
                    terrain: t.terrain,
                    resource: t.resource,
                    building,
                    owner: t.owner,
                    city: None,
                };
            }
        }
        let missing = filled.iter().filter(|f| !**f).count();
        if missing > 0 {
            return Err(SnapshotError::MissingTiles(missing));
        }

        let mut players = Vec::with_capacity(num_players);
        for p in &snapshot.players {
            let mut techs = vec![false; rules.tech_count()];
            for key in &p.techs {
                let id = rules
                    .tech_id(key)
                    .ok_or_else(|| SnapshotError::UnknownTech(key.clone()))?;
                techs[id.index()] = true;
            }
            players.push(Player {
                id: p.id,
                stars: p.stars,
                stars_per_turn: p.stars_per_turn,
                cities: p.cities.clone(),
                techs,
                alive: p.alive,
                wins: p.wins,
                losses: p.losses,
            });
        }

        let mut explored = vec![vec![false; map.len()]; num_players];
        for (player, keys) in snapshot.explored.iter().enumerate().take(num_players) {
            for key in keys {
                let at = Coord::parse_key(key)
                    .ok_or_else(|| SnapshotError::BadTileKey(key.clone()))?;
                let idx = map
                    .index_of(at)
                    .ok_or_else(|| SnapshotError::BadTileKey(key.clone()))?;
                explored[player][idx] = true;
            }
        }

        let units = snapshot
            .units
            .iter()
            .map(|u| {
                let unit = Unit {
                    kind: u.kind,
                    owner: u.owner,
                    position: u.pos,
                    hp: u.hp,
                    max_hp: u.max_hp,
                    moved: u.moved,
                    attacked: u.attacked,
                    veteran: u.veteran,
                    fortified: u.fortified,
                    was_idle: u.was_idle,
                    kills: u.kills,
                    city_ref: u.city_ref,
                };
                (u.id, unit)
            })
            .collect();
        let units = EntityStore::restore(units, &snapshot.unit_slots)
            .ok_or(SnapshotError::DuplicateEntity("unit"))?;

        let cities = snapshot
            .cities
            .iter()
            .map(|c| {
                let city = City {
                    owner: c.owner,
                    position: c.pos,
                    level: c.level,
                    population: c.population,
                    max_population: c.max_population,
                    is_capital: c.is_capital,
                    walls: c.walls,
                    workshop: c.workshop,
                    park: c.park,
                    territory_radius: c.territory_radius,
                    pending_upgrades: c.pending_upgrades.clone(),
                };
                (c.id, city)
            })
            .collect();
        let cities: EntityStore<City> = EntityStore::restore(cities, &snapshot.city_slots)
            .ok_or(SnapshotError::DuplicateEntity("city"))?;

        for (id, city) in cities.iter_ordered() {
            let tile = map
                .get_mut(city.position)
                .ok_or(SnapshotError::CityOutOfBounds(city.position))?;
            tile.city = Some(id);
        }

        Ok(Self {
            turn: snapshot.turn,
            max_turns: snapshot.max_turns,
            current_player: snapshot.current_player,
            map,
            rules,
            players,
            explored,
            units,
            cities,
            diplomacy: DiplomacyState::from_snapshots(num_players, &snapshot.diplomacy),
            outcome: snapshot.outcome.clone(),
            rng: GameRng::from_state_bytes(snapshot.rng_state),
        })
    }

    /// FNV-1a over the MessagePack encoding of [`GameState::snapshot`].
    pub fn state_hash(&self) -> Result<u64, WireError> {
        snapshot_hash(&self.snapshot())
    }
}

impl GameEngine {
    pub fn snapshot(&self) -> Snapshot {
        self.state().snapshot()
    }

    /// Current snapshot as a player sees it: see [`GameState::player_view`].
    pub fn snapshot_for_player(&self, player: PlayerId) -> Snapshot {
        self.state().player_view(player)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{load_rules, RulesSource};
    use tribes_protocol::{Relation, Terrain};

    fn rules() -> Rules {
        load_rules(RulesSource::Embedded).unwrap()
    }

    #[test]
    fn generated_state_restores_identically() {
        let state = GameState::generate(3, 30, 5, rules(), GameRng::seed_from_u64(21));
        let snap = state.snapshot();
        let restored = GameState::from_snapshot(&snap, rules()).unwrap();
        assert_eq!(restored.snapshot(), snap);
        assert_eq!(restored.map, state.map);
        assert_eq!(restored.players, state.players);
        assert_eq!(restored.explored, state.explored);
    }

    #[test]
    fn tile_order_is_not_significant() {
        let mut s = GameState::new_for_tests(5, 2, rules(), 3);
        s.found_city(Coord::new(2, 2), PlayerId(0), true);
        let mut snap = s.snapshot();
        snap.tiles.reverse();
        let restored = GameState::from_snapshot(&snap, rules()).unwrap();
        assert_eq!(restored.map, s.map);
        assert!(restored.city_at(Coord::new(2, 2)).is_some());
    }

    #[test]
    fn missing_diplomacy_backfills_neutral() {
        let mut s = GameState::new_for_tests(5, 3, rules(), 3);
        s.diplomacy
            .set_relation(PlayerId(0), PlayerId(2), Relation::Hostile);
        let mut snap = s.snapshot();
        snap.diplomacy.retain(|r| r.from == PlayerId(0));
        let restored = GameState::from_snapshot(&snap, rules()).unwrap();
        assert_eq!(
            restored.diplomacy.relation(PlayerId(0), PlayerId(2)),
            Relation::Hostile
        );
        assert_eq!(
            restored.diplomacy.relation(PlayerId(2), PlayerId(1)),
            Relation::Neutral
        );
    }

    #[test]
    fn rejects_incomplete_or_inconsistent_dumps() {
        let s = GameState::new_for_tests(4, 2, rules(), 3);
        let mut snap = s.snapshot();
        snap.tiles.pop();
        assert_eq!(
            GameState::from_snapshot(&snap, rules()).unwrap_err(),
            SnapshotError::MissingTiles(1)
        );

        let mut snap = s.snapshot();
        snap.tiles[0].x = 9;
        assert_eq!(
            GameState::from_snapshot(&snap, rules()).unwrap_err(),
            SnapshotError::TileOutOfBounds(Coord::new(9, 0))
        );

        let mut snap = s.snapshot();
        snap.players[0].techs.push("alchemy".to_string());
        assert_eq!(
            GameState::from_snapshot(&snap, rules()).unwrap_err(),
            SnapshotError::UnknownTech("alchemy".to_string())
        );

        let mut snap = s.snapshot();
        snap.num_players = 3;
        assert!(matches!(
            GameState::from_snapshot(&snap, rules()),
            Err(SnapshotError::PlayerCount { .. })
        ));
    }

    #[test]
    fn restored_rng_continues_the_sequence() {
        let mut s = GameState::new_for_tests(4, 2, rules(), 99);
        s.rng.next_u64();
        let mut restored = GameState::from_snapshot(&s.snapshot(), rules()).unwrap();
        assert_eq!(restored.rng.next_u64(), s.rng.next_u64());
    }

    #[test]
    fn buildings_are_stored_by_key() {
        let mut s = GameState::new_for_tests(4, 2, rules(), 3);
        let farm = s.rules.building_id("farm").unwrap();
        s.map.get_mut(Coord::new(1, 1)).unwrap().building = Some(farm);
        s.map.get_mut(Coord::new(0, 0)).unwrap().terrain = Terrain::Forest;
        let snap = s.snapshot();
        let tile = snap
            .tiles
            .iter()
            .find(|t| t.x == 1 && t.z == 1)
            .unwrap();
        assert_eq!(tile.building.as_deref(), Some("farm"));
        let restored = GameState::from_snapshot(&snap, rules()).unwrap();
        assert_eq!(restored.map, s.map);
        assert_eq!(restored.state_hash().unwrap(), s.state_hash().unwrap());
    }
}
