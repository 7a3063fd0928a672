use tribes_protocol::{Coord, Terrain, UnitId};

use crate::rules::Rules;
use crate::state::GameState;
use crate::unit::Unit;
use crate::GameRng;

/// Variance applied to every damage roll.
pub const DAMAGE_VARIANCE: (f64, f64) = (0.8, 1.2);

/// One attack exchange, before it is applied to the roster.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CombatOutcome {
    pub damage_to_defender: i32,
    /// `None` when the defender could not or did not strike back.
    pub damage_to_attacker: Option<i32>,
    pub attacker_hp: i32,
    pub defender_hp: i32,
}

impl CombatOutcome {
    pub fn attacker_died(&self) -> bool {
        self.attacker_hp <= 0
    }

    pub fn defender_died(&self) -> bool {
        self.defender_hp <= 0
    }
}

/// Additive bonus for whoever defends at `unit.position`: walls, forest, fortification.
pub fn defence_bonus(state: &GameState, unit: &Unit) -> f64 {
    let constants = &state.rules.constants;
    let mut bonus = 0.0;
    if let Some(tile) = state.map.get(unit.position) {
        if tile.terrain == Terrain::Forest {
            bonus += state.rules.terrain(Terrain::Forest).defence_bonus;
        }
        let walled = tile
            .city
            .and_then(|id| state.cities.get(id))
            .is_some_and(|c| c.walls);
        if walled {
            bonus += constants.wall_defence_bonus;
        }
    }
    if unit.fortified {
        bonus += constants.fortify_defence_bonus;
    }
    bonus
}

pub fn effective_defence(unit: &Unit, bonus: f64, rules: &Rules) -> f64 {
    rules.unit(unit.kind).defence * unit.veteran_multiplier(rules) + bonus
}

pub fn effective_attack(unit: &Unit, rules: &Rules) -> f64 {
    rules.unit(unit.kind).attack * unit.veteran_multiplier(rules)
}

/// `max(1, round((attack - defence) * U))`, `U` uniform in [`DAMAGE_VARIANCE`].
pub fn roll_damage(attack: f64, defence: f64, rng: &mut GameRng) -> i32 {
    let u = rng.gen_range_f64(DAMAGE_VARIANCE.0, DAMAGE_VARIANCE.1);
    (((attack - defence) * u).round() as i32).max(1)
}

/// Resolves one exchange. Counterattacks only happen melee-vs-melee when the defender
/// survives. Neither unit is modified; the caller applies the outcome.
pub fn resolve_combat(
    attacker: &Unit,
    attacker_bonus: f64,
    defender: &Unit,
    defender_bonus: f64,
    rules: &Rules,
    rng: &mut GameRng,
) -> CombatOutcome {
    let damage_to_defender = roll_damage(
        effective_attack(attacker, rules),
        effective_defence(defender, defender_bonus, rules),
        rng,
    );
    let defender_hp = defender.hp - damage_to_defender;

    let melee = attacker.range(rules) <= 1 && defender.range(rules) <= 1;
    let damage_to_attacker = if defender_hp > 0 && melee {
        Some(roll_damage(
            effective_attack(defender, rules),
            effective_defence(attacker, attacker_bonus, rules),
            rng,
        ))
    } else {
        None
    };

    CombatOutcome {
        damage_to_defender,
        damage_to_attacker,
        attacker_hp: attacker.hp - damage_to_attacker.unwrap_or(0),
        defender_hp,
    }
}

/// Tiles within the unit's range (Manhattan) that hold a living enemy unit.
pub fn attack_targets(state: &GameState, unit_id: UnitId) -> Vec<Coord> {
    let Some(unit) = state.units.get(unit_id) else {
        return Vec::new();
    };
    let range = unit.range(&state.rules);
    let mut targets: Vec<Coord> = state
        .units
        .iter_ordered()
        .filter(|(_, other)| other.owner != unit.owner && other.is_alive())
        .map(|(_, other)| other.position)
        .filter(|&at| at != unit.position && at.manhattan(unit.position) <= range)
        .collect();
    targets.sort_unstable();
    targets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{load_rules, RulesSource};
    use tribes_protocol::{PlayerId, UnitKind};

    fn rules() -> Rules {
        load_rules(RulesSource::Embedded).unwrap()
    }

    fn unit(kind: UnitKind, owner: u8, x: i32, z: i32, rules: &Rules) -> Unit {
        Unit::new(kind, PlayerId(owner), Coord::new(x, z), rules)
    }

    #[test]
    fn damage_is_at_least_one() {
        let mut rng = GameRng::seed_from_u64(5);
        for _ in 0..200 {
            assert_eq!(roll_damage(1.0, 10.0, &mut rng), 1);
        }
    }

    #[test]
    fn damage_stays_within_variance() {
        let mut rng = GameRng::seed_from_u64(6);
        for _ in 0..200 {
            let d = roll_damage(10.0, 0.0, &mut rng);
            assert!((8..=12).contains(&d), "{d}");
        }
    }

    #[test]
    fn ranged_attacks_are_never_countered() {
        let rules = rules();
        let mut rng = GameRng::seed_from_u64(7);
        let archer = unit(UnitKind::Archer, 0, 0, 0, &rules);
        let defender = unit(UnitKind::Defender, 1, 0, 2, &rules);
        for _ in 0..50 {
            let out = resolve_combat(&archer, 0.0, &defender, 0.0, &rules, &mut rng);
            assert!(!out.defender_died());
            assert_eq!(out.damage_to_attacker, None);
            assert_eq!(out.attacker_hp, archer.hp);
        }
    }

    #[test]
    fn melee_survivor_strikes_back() {
        let rules = rules();
        let mut rng = GameRng::seed_from_u64(8);
        let a = unit(UnitKind::Warrior, 0, 0, 0, &rules);
        let d = unit(UnitKind::Defender, 1, 0, 1, &rules);
        let out = resolve_combat(&a, 0.0, &d, 0.0, &rules, &mut rng);
        assert!(!out.defender_died());
        let back = out.damage_to_attacker.unwrap();
        assert!(back >= 1);
        assert_eq!(out.attacker_hp, 10 - back);
    }

    #[test]
    fn veterans_hit_harder() {
        let rules = rules();
        let mut a = unit(UnitKind::Swordsman, 0, 0, 0, &rules);
        assert_eq!(effective_attack(&a, &rules), 3.0);
        a.veteran = true;
        assert_eq!(effective_attack(&a, &rules), 4.5);
        assert_eq!(effective_defence(&a, 1.0, &rules), 5.5);
    }

    #[test]
    fn bonuses_stack() {
        let mut s = GameState::new_for_tests(5, 2, rules(), 1);
        let city = s.found_city(Coord::new(2, 2), PlayerId(1), true).unwrap();
        s.cities.get_mut(city).unwrap().walls = true;
        let mut d = unit(UnitKind::Warrior, 1, 2, 2, &s.rules);
        d.fortified = true;
        assert_eq!(defence_bonus(&s, &d), 5.0);

        s.map.get_mut(Coord::new(1, 1)).unwrap().terrain = Terrain::Forest;
        let f = unit(UnitKind::Warrior, 1, 1, 1, &s.rules);
        assert_eq!(defence_bonus(&s, &f), 1.0);
    }

    #[test]
    fn targets_use_manhattan_range() {
        let mut s = GameState::new_for_tests(7, 2, rules(), 1);
        let archer = s.units.insert(unit(UnitKind::Archer, 0, 3, 3, &s.rules));
        s.units.insert(unit(UnitKind::Warrior, 1, 4, 4, &s.rules));
        s.units.insert(unit(UnitKind::Warrior, 1, 5, 4, &s.rules));
        s.units.insert(unit(UnitKind::Warrior, 0, 3, 4, &s.rules));
        assert_eq!(attack_targets(&s, archer), vec![Coord::new(4, 4)]);
    }
}
