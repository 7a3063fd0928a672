//! Procedural square map generation.
//!
//! Distance from the centre picks ocean and water rings; land inside them is a weighted
//! terrain roll. Villages are spaced out, then each player gets a cleared, claimed start
//! with a capital in the middle.

use tribes_protocol::{Coord, PlayerId, Resource, Terrain};

use crate::map::GameMap;
use crate::rng::GameRng;
use crate::rules::Rules;

/// Beyond this fraction of the map size from centre: ocean.
const OCEAN_BAND: f64 = 0.48;
/// Beyond this: water.
const WATER_BAND: f64 = 0.42;
/// Beyond this: even split between shallow water and water.
const SHALLOW_BAND: f64 = 0.38;

/// Cumulative land roll, out of 100.
const LAND_TABLE: [(u32, Terrain); 6] = [
    (38, Terrain::Field),
    (60, Terrain::Forest),
    (75, Terrain::Mountain),
    (85, Terrain::Village),
    (88, Terrain::Ruins),
    (100, Terrain::Field),
];

const VILLAGE_SPACING: i32 = 2;
const MAX_SPACING_PASSES: usize = 32;
const START_UNITS: usize = 2;

#[derive(Clone, Debug)]
pub struct MapGenConfig {
    pub num_players: u32,
}

impl Default for MapGenConfig {
    fn default() -> Self {
        Self { num_players: 2 }
    }
}

/// Result of map generation: terrain with starts already cleared and claimed.
pub struct GeneratedMap {
    pub map: GameMap,
    /// Capital tile per player, indexed by player id.
    pub starts: Vec<Coord>,
    /// Starting warrior positions.
    pub start_units: Vec<(PlayerId, Coord)>,
}

pub fn map_size_for(num_players: u32) -> u32 {
    match num_players {
        0..=2 => 11,
        3 => 15,
        _ => 17,
    }
}

pub fn start_positions(num_players: u32, size: u32) -> Vec<Coord> {
    let n = size as i32;
    let low = 2;
    let high = n - 3;
    match num_players {
        0..=2 => vec![Coord::new(low, low), Coord::new(high, high)],
        3 => vec![
            Coord::new(low, low),
            Coord::new(high, low),
            Coord::new(n / 2, high),
        ],
        _ => vec![
            Coord::new(low, low),
            Coord::new(high, low),
            Coord::new(low, high),
            Coord::new(high, high),
        ],
    }
}

pub fn generate_map(config: &MapGenConfig, rules: &Rules, rng: &mut GameRng) -> GeneratedMap {
    let size = map_size_for(config.num_players);
    let mut map = GameMap::new(size, Terrain::Ocean);
    let centre = f64::from(size - 1) / 2.0;

    for index in 0..map.len() {
        let at = map.coord_at(index);
        let dx = f64::from(at.x) - centre;
        let dz = f64::from(at.z) - centre;
        let r = (dx * dx + dz * dz).sqrt() / f64::from(size);
        let (terrain, resource) = roll_tile(r, rng);
        if let Some(tile) = map.get_mut(at) {
            tile.terrain = terrain;
            tile.resource = resource;
        }
    }

    space_villages(&mut map, rng);

    let starts = start_positions(config.num_players, size);
    let mut start_units = Vec::with_capacity(starts.len() * START_UNITS);
    for (idx, &start) in starts.iter().enumerate() {
        let owner = PlayerId(idx as u8);
        clear_start(&mut map, start, owner);
        start_units.extend(
            start
                .neighbors()
                .filter(|&c| {
                    map.get(c)
                        .is_some_and(|t| t.city.is_none() && rules.terrain(t.terrain).move_cost.is_some())
                })
                .take(START_UNITS)
                .map(|c| (owner, c)),
        );
    }

    GeneratedMap {
        map,
        starts,
        start_units,
    }
}

fn roll_tile(r: f64, rng: &mut GameRng) -> (Terrain, Option<Resource>) {
    if r > OCEAN_BAND {
        return (Terrain::Ocean, None);
    }
    if r > WATER_BAND {
        return (Terrain::Water, None);
    }
    if r > SHALLOW_BAND {
        if rng.gen_bool(0.5) {
            let fish = rng.gen_bool(0.3).then_some(Resource::Fish);
            return (Terrain::ShallowWater, fish);
        }
        return (Terrain::Water, None);
    }

    let roll = (rng.next_u32() % 100) + 1;
    let terrain = LAND_TABLE
        .iter()
        .find(|(upper, _)| roll <= *upper)
        .map(|(_, t)| *t)
        .unwrap_or(Terrain::Field);
    (terrain, roll_resource(terrain, rng))
}

fn roll_resource(terrain: Terrain, rng: &mut GameRng) -> Option<Resource> {
    match terrain {
        Terrain::Field if rng.gen_bool(0.3) => Some(if rng.gen_bool(0.5) {
            Resource::Fruit
        } else {
            Resource::Crop
        }),
        Terrain::Forest if rng.gen_bool(0.25) => Some(Resource::Animal),
        Terrain::Mountain if rng.gen_bool(0.3) => Some(Resource::Mine),
        _ => None,
    }
}

/// Demotes villages that sit within `VILLAGE_SPACING` of another village until none do.
/// Scan order is index order, so the earlier village of a close pair is the one demoted.
fn space_villages(map: &mut GameMap, rng: &mut GameRng) {
    for _ in 0..MAX_SPACING_PASSES {
        let mut changed = false;
        for index in 0..map.len() {
            let at = map.coord_at(index);
            if map.get(at).map(|t| t.terrain) != Some(Terrain::Village) {
                continue;
            }
            let crowded = map
                .square(at, VILLAGE_SPACING)
                .filter(|&c| c != at)
                .any(|c| map.get(c).is_some_and(|t| t.terrain == Terrain::Village));
            if crowded {
                let resource = roll_resource(Terrain::Field, rng);
                if let Some(tile) = map.get_mut(at) {
                    tile.terrain = Terrain::Field;
                    tile.resource = resource;
                }
                changed = true;
            }
        }
        if !changed {
            return;
        }
    }
}

/// Clears water and mountains out of the 3x3 start, removes villages from it, claims it
/// and turns the centre into a city tile.
fn clear_start(map: &mut GameMap, start: Coord, owner: PlayerId) {
    let footprint: Vec<Coord> = map.square(start, 1).collect();
    for at in footprint {
        let Some(tile) = map.get_mut(at) else {
            continue;
        };
        if tile.terrain.is_water() || matches!(tile.terrain, Terrain::Mountain | Terrain::Village)
        {
            tile.terrain = Terrain::Field;
            tile.resource = None;
        }
        if at == start {
            tile.terrain = Terrain::City;
            tile.resource = None;
        }
        map.claim(at, owner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{load_rules, RulesSource};

    fn generate(num_players: u32, seed: u64) -> GeneratedMap {
        let rules = load_rules(RulesSource::Embedded).unwrap();
        let mut rng = GameRng::seed_from_u64(seed);
        generate_map(&MapGenConfig { num_players }, &rules, &mut rng)
    }

    #[test]
    fn sizes_follow_player_count() {
        assert_eq!(generate(2, 1).map.size(), 11);
        assert_eq!(generate(3, 1).map.size(), 15);
        assert_eq!(generate(4, 1).map.size(), 17);
    }

    #[test]
    fn same_seed_same_map() {
        assert_eq!(generate(2, 42).map, generate(2, 42).map);
    }

    #[test]
    fn villages_are_spaced() {
        for seed in 0..20 {
            let generated = generate(4, seed);
            let map = &generated.map;
            let villages: Vec<Coord> = map
                .iter()
                .filter(|(_, t)| t.terrain == Terrain::Village)
                .map(|(c, _)| c)
                .collect();
            for (i, a) in villages.iter().enumerate() {
                for b in &villages[i + 1..] {
                    assert!(a.chebyshev(*b) > VILLAGE_SPACING, "seed {seed}: {a} near {b}");
                }
            }
        }
    }

    #[test]
    fn starts_are_cleared_and_claimed() {
        for players in 2..=4 {
            let generated = generate(players, 7);
            assert_eq!(generated.starts.len(), players as usize);
            assert_eq!(generated.start_units.len(), players as usize * START_UNITS);
            for (idx, &start) in generated.starts.iter().enumerate() {
                let owner = PlayerId(idx as u8);
                assert_eq!(generated.map.get(start).unwrap().terrain, Terrain::City);
                for c in generated.map.square(start, 1) {
                    let tile = generated.map.get(c).unwrap();
                    assert_eq!(tile.owner, Some(owner));
                    assert!(!tile.terrain.is_water());
                    assert_ne!(tile.terrain, Terrain::Mountain);
                    assert_ne!(tile.terrain, Terrain::Village);
                }
            }
        }
    }

    #[test]
    fn spacing_demotes_the_earlier_village() {
        let mut map = GameMap::new(7, Terrain::Field);
        for at in [Coord::new(1, 1), Coord::new(1, 2)] {
            map.get_mut(at).unwrap().terrain = Terrain::Village;
        }
        let mut rng = GameRng::seed_from_u64(5);
        space_villages(&mut map, &mut rng);
        assert_eq!(map.get(Coord::new(1, 1)).unwrap().terrain, Terrain::Field);
        assert_eq!(map.get(Coord::new(1, 2)).unwrap().terrain, Terrain::Village);
    }

    #[test]
    fn water_is_never_owned_and_buildings_absent() {
        let generated = generate(4, 3);
        for (_, tile) in generated.map.iter() {
            if tile.terrain.is_unclaimable() {
                assert_eq!(tile.owner, None);
            }
            assert!(tile.building.is_none());
        }
    }
}
