use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap};

use tribes_protocol::{Coord, PlayerId, UnitId};

use crate::state::GameState;
use crate::unit::Unit;

/// Cost for `unit` to enter `at`, or `None` if it cannot.
///
/// Mountains open up with the climbing tech; shallow water only for explorer-class units.
pub fn step_cost(state: &GameState, unit: &Unit, at: Coord) -> Option<i32> {
    let tile = state.map.get(at)?;
    let rule = state.rules.terrain(tile.terrain);
    if let Some(cost) = rule.move_cost {
        return Some(cost);
    }
    let climbs = state
        .player(unit.owner)
        .is_some_and(|p| p.has_tech(state.rules.constants.climbing_tech));
    if climbs {
        if let Some(cost) = rule.climb_cost {
            return Some(cost);
        }
    }
    if unit.is_explorer(&state.rules) {
        if let Some(cost) = rule.explorer_cost {
            return Some(cost);
        }
    }
    None
}

/// Owner of the living unit on each tile, indexed like the map.
fn occupancy(state: &GameState) -> Vec<Option<PlayerId>> {
    let mut occupied = vec![None; state.map.len()];
    for (_, unit) in state.units.iter_ordered() {
        if !unit.is_alive() {
            continue;
        }
        if let Some(i) = state.map.index_of(unit.position) {
            occupied[i] = Some(unit.owner);
        }
    }
    occupied
}

/// Legal destinations for `unit_id` this turn.
///
/// Dijkstra over the 8-neighbourhood. The first step out of the unit's own tile is always
/// allowed onto passable terrain; its cost is clamped to the unit's movement. Enemy units
/// block outright. Friendly units can be passed through but not landed on.
pub fn reachable_tiles(state: &GameState, unit_id: UnitId) -> BTreeSet<Coord> {
    let Some(unit) = state.units.get(unit_id) else {
        return BTreeSet::new();
    };
    let Some(start) = state.map.index_of(unit.position) else {
        return BTreeSet::new();
    };
    let movement = state.rules.unit(unit.kind).movement;
    let occupied = occupancy(state);

    let mut dist = vec![i32::MAX; state.map.len()];
    dist[start] = 0;
    let mut heap: BinaryHeap<Reverse<(i32, usize)>> = BinaryHeap::new();
    heap.push(Reverse((0, start)));

    while let Some(Reverse((cost, index))) = heap.pop() {
        if cost != dist[index] {
            continue;
        }
        for neighbor in state.map.coord_at(index).neighbors() {
            let Some(n) = state.map.index_of(neighbor) else {
                continue;
            };
            if occupied[n].is_some_and(|owner| owner != unit.owner) {
                continue;
            }
            let Some(step) = step_cost(state, unit, neighbor) else {
                continue;
            };
            let new_cost = if index == start {
                step.min(movement)
            } else {
                cost.saturating_add(step)
            };
            if new_cost > movement {
                continue;
            }
            if new_cost < dist[n] {
                dist[n] = new_cost;
                heap.push(Reverse((new_cost, n)));
            }
        }
    }

    dist.iter()
        .enumerate()
        .filter(|&(i, &d)| i != start && d != i32::MAX && occupied[i].is_none())
        .map(|(i, _)| state.map.coord_at(i))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{load_rules, RulesSource};
    use tribes_protocol::{Terrain, UnitKind};

    fn state() -> GameState {
        GameState::new_for_tests(7, 2, load_rules(RulesSource::Embedded).unwrap(), 3)
    }

    fn place(s: &mut GameState, kind: UnitKind, owner: u8, x: i32, z: i32) -> UnitId {
        let unit = Unit::new(kind, PlayerId(owner), Coord::new(x, z), &s.rules);
        s.units.insert(unit)
    }

    fn set_terrain(s: &mut GameState, x: i32, z: i32, terrain: Terrain) {
        s.map.get_mut(Coord::new(x, z)).unwrap().terrain = terrain;
    }

    #[test]
    fn warrior_reaches_its_ring() {
        let mut s = state();
        let id = place(&mut s, UnitKind::Warrior, 0, 3, 3);
        let reach = reachable_tiles(&s, id);
        assert_eq!(reach.len(), 8);
        assert!(!reach.contains(&Coord::new(3, 3)));
        assert!(!reach.contains(&Coord::new(5, 3)));
    }

    #[test]
    fn first_step_into_forest_is_allowed() {
        let mut s = state();
        set_terrain(&mut s, 4, 3, Terrain::Forest);
        let id = place(&mut s, UnitKind::Warrior, 0, 3, 3);
        assert!(reachable_tiles(&s, id).contains(&Coord::new(4, 3)));
    }

    #[test]
    fn forest_consumes_the_rest_of_the_move() {
        let mut s = state();
        set_terrain(&mut s, 4, 3, Terrain::Forest);
        let id = place(&mut s, UnitKind::Rider, 0, 3, 3);
        let reach = reachable_tiles(&s, id);
        assert!(reach.contains(&Coord::new(4, 3)));
        // Two steps over fields still works.
        assert!(reach.contains(&Coord::new(5, 3)));
        assert!(reach.contains(&Coord::new(5, 5)));
    }

    #[test]
    fn mountains_need_climbing() {
        let mut s = state();
        set_terrain(&mut s, 4, 3, Terrain::Mountain);
        let id = place(&mut s, UnitKind::Warrior, 0, 3, 3);
        assert!(!reachable_tiles(&s, id).contains(&Coord::new(4, 3)));

        let climbing = s.rules.constants.climbing_tech;
        s.players[0].techs[climbing.index()] = true;
        assert!(reachable_tiles(&s, id).contains(&Coord::new(4, 3)));
    }

    #[test]
    fn only_explorers_wade_shallow_water() {
        let mut s = state();
        set_terrain(&mut s, 4, 3, Terrain::ShallowWater);
        set_terrain(&mut s, 4, 4, Terrain::Water);
        let warrior = place(&mut s, UnitKind::Warrior, 0, 3, 3);
        let rider = place(&mut s, UnitKind::Rider, 0, 5, 3);
        assert!(!reachable_tiles(&s, warrior).contains(&Coord::new(4, 3)));
        let reach = reachable_tiles(&s, rider);
        assert!(reach.contains(&Coord::new(4, 3)));
        assert!(!reach.contains(&Coord::new(4, 4)));
    }

    #[test]
    fn friends_pass_enemies_block() {
        let mut s = state();
        let rider = place(&mut s, UnitKind::Rider, 0, 3, 3);
        place(&mut s, UnitKind::Warrior, 0, 4, 3);
        let reach = reachable_tiles(&s, rider);
        assert!(!reach.contains(&Coord::new(4, 3)));
        assert!(reach.contains(&Coord::new(5, 3)));

        let mut s = state();
        let rider = place(&mut s, UnitKind::Rider, 0, 0, 3);
        // Wall of enemies across the x = 1 column.
        for z in 0..7 {
            place(&mut s, UnitKind::Warrior, 1, 1, z);
        }
        let reach = reachable_tiles(&s, rider);
        assert!(reach.iter().all(|c| c.x == 0));
    }
}
