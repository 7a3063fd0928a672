//! Property tests for the rules invariants.

use proptest::prelude::*;

use tribes_core::{
    check_research, load_rules, reachable_tiles, research_cost, resolve_combat, run_playout,
    step_cost, City, GameConfig, GameEngine, GameError, GameRng, GameState, ResearchBlock,
    Rules, RulesSource, Unit,
};
use tribes_protocol::{
    deserialize_snapshot, serialize_snapshot, Coord, PlayerId, TechId, Terrain, UnitKind,
    VictoryReason,
};

fn rules() -> Rules {
    load_rules(RulesSource::Embedded).unwrap()
}

fn terrain() -> impl Strategy<Value = Terrain> {
    prop::sample::select(vec![
        Terrain::Field,
        Terrain::Forest,
        Terrain::Mountain,
        Terrain::Water,
        Terrain::ShallowWater,
        Terrain::Ruins,
        Terrain::Ocean,
    ])
}

fn unit_kind() -> impl Strategy<Value = UnitKind> {
    prop::sample::select(UnitKind::ALL.to_vec())
}

proptest! {
    /// Every passable, empty neighbour is reachable, and no occupied tile ever is.
    #[test]
    fn first_step_always_allowed(
        tiles in prop::collection::vec(terrain(), 49),
        kind in unit_kind(),
        x in 0..7i32,
        z in 0..7i32,
        others in prop::collection::vec((0..7i32, 0..7i32, any::<bool>()), 0..8),
        climbing in any::<bool>(),
    ) {
        let mut state = GameState::new_for_tests(7, 2, rules(), 1);
        for (i, t) in tiles.into_iter().enumerate() {
            let at = state.map.coord_at(i);
            state.map.get_mut(at).unwrap().terrain = t;
        }
        if climbing {
            let tech = state.rules.constants.climbing_tech;
            state.players[0].techs[tech.index()] = true;
        }
        let me = Coord::new(x, z);
        let id = state.units.insert(Unit::new(kind, PlayerId(0), me, &state.rules));
        for (ox, oz, friendly) in others {
            let at = Coord::new(ox, oz);
            if state.unit_at(at).is_none() {
                let owner = if friendly { PlayerId(0) } else { PlayerId(1) };
                state.units.insert(Unit::new(UnitKind::Warrior, owner, at, &state.rules));
            }
        }

        let reach = reachable_tiles(&state, id);
        let unit = state.units.get(id).unwrap().clone();
        for n in me.neighbors().filter(|&n| state.map.in_bounds(n)) {
            if state.unit_at(n).is_none() && step_cost(&state, &unit, n).is_some() {
                prop_assert!(reach.contains(&n), "{n} should be reachable from {me}");
            }
        }
        for at in &reach {
            prop_assert!(state.unit_at(*at).is_none());
            prop_assert!(*at != me);
        }
    }

    /// Damage is at least one; counters only happen melee against a survivor.
    #[test]
    fn combat_bounds(
        attacker_kind in unit_kind(),
        defender_kind in unit_kind(),
        defender_hp in 1..40i32,
        attacker_bonus in 0.0..6.0f64,
        defender_bonus in 0.0..6.0f64,
        seed in any::<u64>(),
    ) {
        let rules = rules();
        let attacker = Unit::new(attacker_kind, PlayerId(0), Coord::new(0, 0), &rules);
        let mut defender = Unit::new(defender_kind, PlayerId(1), Coord::new(0, 1), &rules);
        defender.hp = defender_hp;
        let mut rng = GameRng::seed_from_u64(seed);

        let out = resolve_combat(
            &attacker,
            attacker_bonus,
            &defender,
            defender_bonus,
            &rules,
            &mut rng,
        );
        prop_assert!(out.damage_to_defender >= 1);
        prop_assert_eq!(out.defender_hp, defender_hp - out.damage_to_defender);

        let ranged = attacker.range(&rules) > 1 || defender.range(&rules) > 1;
        if ranged || out.defender_died() {
            prop_assert_eq!(out.damage_to_attacker, None);
            prop_assert_eq!(out.attacker_hp, attacker.hp);
        } else {
            let back = out.damage_to_attacker.unwrap();
            prop_assert!(back >= 1);
            prop_assert_eq!(out.attacker_hp, attacker.hp - back);
        }
    }

    /// Without the discount, cost never drops as tier or city count grows.
    #[test]
    fn tech_cost_is_monotonic(
        a in 0..22u16,
        b in 0..22u16,
        cities in 0..4usize,
    ) {
        let mut state = GameState::new_for_tests(11, 2, rules(), 1);
        let spots = [Coord::new(1, 1), Coord::new(5, 5), Coord::new(9, 9), Coord::new(1, 9)];
        for &at in &spots[..cities] {
            state.found_city(at, PlayerId(0), false);
        }
        let (ta, tb) = (TechId::new(a), TechId::new(b));
        let tier_a = state.rules.tech(ta).unwrap().tier;
        let tier_b = state.rules.tech(tb).unwrap().tier;
        let cost_a = research_cost(&state, PlayerId(0), ta).unwrap();
        let cost_b = research_cost(&state, PlayerId(0), tb).unwrap();
        if tier_a <= tier_b {
            prop_assert!(cost_a <= cost_b);
        }

        let before = cost_a;
        state.found_city(Coord::new(9, 1), PlayerId(0), false);
        prop_assert!(research_cost(&state, PlayerId(0), ta).unwrap() >= before);
    }

    /// Population additions always settle below the cap, one level per threshold crossed.
    #[test]
    fn population_cascade_settles(amounts in prop::collection::vec(0..12i32, 1..10)) {
        let mut city = City::new(Coord::new(0, 0), PlayerId(0), false);
        for amount in amounts {
            let level_before = city.level;
            let pending_before = city.pending_upgrades.len();
            let ups = city.add_population(amount, 5);
            prop_assert!(city.population < city.max_population);
            prop_assert!(city.population >= 0);
            prop_assert_eq!(usize::from(city.level - level_before), ups.len());
            prop_assert_eq!(city.max_population, i32::from(city.level) + 1);
            prop_assert_eq!(city.pending_upgrades.len(), pending_before + ups.len());
            prop_assert!(ups.iter().all(|u| (2..=5).contains(&u.reward_tier)));
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Snapshots survive restore and the MessagePack wire unchanged.
    #[test]
    fn snapshot_round_trip(seed in any::<u64>(), players in 2..=4u32) {
        let state = GameState::generate(players, 30, 5, rules(), GameRng::seed_from_u64(seed));
        let snap = state.snapshot();

        let restored = GameState::from_snapshot(&snap, rules()).unwrap();
        prop_assert_eq!(&restored.snapshot(), &snap);
        prop_assert_eq!(&restored.map, &state.map);
        prop_assert_eq!(&restored.players, &state.players);
        prop_assert_eq!(&restored.diplomacy, &state.diplomacy);
        for at in [Coord::new(0, 0), Coord::new(3, 4)] {
            prop_assert_eq!(
                restored.unit_at(at).map(|(id, _)| id),
                state.unit_at(at).map(|(id, _)| id)
            );
        }

        let bytes = serialize_snapshot(&snap).unwrap();
        prop_assert_eq!(deserialize_snapshot(&bytes).unwrap(), snap);
    }

    /// Capitals only ever leave with their owner; domination leaves exactly one player.
    #[test]
    fn capital_loss_means_elimination(seed in any::<u64>(), players in 2..=3u32) {
        let config = GameConfig {
            num_players: players,
            max_turns: 6,
            seed,
            starting_stars: 5,
        };
        let (engine, result) = run_playout(config, rules(), 600);
        let state = engine.state();
        for p in &state.players {
            if state.capital_count(p.id) == 0 {
                prop_assert!(!p.alive, "{} has no capital but is alive", p.id);
            }
        }
        if let Some(outcome) = &result.outcome {
            if outcome.reason == VictoryReason::Domination {
                prop_assert_eq!(state.alive_players().count(), 1);
            }
        }
    }
}

#[test]
fn research_is_guarded_against_repeats() {
    let state = GameState::new_for_tests(9, 2, rules(), 1);
    let mut engine = GameEngine::from_state(GameConfig::default(), state);
    engine.state_mut().players[0].stars = 50;
    engine.research_tech(PlayerId(0), "fishing").unwrap();
    assert_eq!(
        engine.research_tech(PlayerId(0), "fishing"),
        Err(GameError::TechAlreadyResearched)
    );
    let fishing = engine.state().rules.tech_id("fishing").unwrap();
    assert_eq!(
        check_research(engine.state(), PlayerId(0), fishing),
        Err(ResearchBlock::AlreadyKnown)
    );
    assert_eq!(engine.state().players[0].stars, 45);
}
