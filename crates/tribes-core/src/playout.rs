//! Seeded random playouts.
//!
//! Drives a match with uniformly random legal commands until it ends. Useful as a
//! determinism check and a smoke test for the rules; there is no planning here.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use tribes_protocol::{Command, Event, GameOutcome, UnitKind};

use crate::combat::attack_targets;
use crate::config::GameConfig;
use crate::game::GameEngine;
use crate::movement::reachable_tiles;
use crate::rng::GameRng;
use crate::rules::Rules;
use crate::tech::researchable;

/// Counters collected while a playout runs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayoutMetrics {
    pub commands_applied: u32,
    pub commands_rejected: u32,
    pub combats: u32,
    pub units_killed: u32,
    pub units_trained: u32,
    pub villages_captured: u32,
    pub cities_captured: u32,
    pub techs_researched: u32,
    pub buildings_built: u32,
    pub upgrades_applied: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayoutResult {
    pub seed: u64,
    /// `None` if the step limit ran out first.
    pub outcome: Option<GameOutcome>,
    pub steps: u32,
    pub final_turn: u32,
    pub metrics: PlayoutMetrics,
    /// Hash of the final snapshot, `None` if it could not be encoded.
    pub final_hash: Option<u64>,
}

/// Every command the current player could issue right now, in a fixed order.
///
/// Each entry passes the engine's own checks. `EndTurn` is always last. Peace is only
/// offered where no offer is already standing.
pub fn legal_commands(engine: &GameEngine) -> Vec<Command> {
    let state = engine.state();
    if state.is_over() {
        return Vec::new();
    }
    let actor = state.current_player;
    let mut commands = Vec::new();

    for (id, unit) in state.units.iter_ordered() {
        if unit.owner != actor {
            continue;
        }
        if !unit.moved {
            for to in reachable_tiles(state, id) {
                commands.push(Command::MoveUnit { unit: id, to });
            }
        }
        if !unit.attacked {
            for target in attack_targets(state, id) {
                commands.push(Command::AttackUnit {
                    attacker: id,
                    target,
                });
            }
        }
        if !unit.moved && !unit.attacked {
            commands.push(Command::Fortify { unit: id });
        }
    }

    for (id, city) in state.cities.iter_ordered() {
        if city.owner != actor {
            continue;
        }
        for kind in UnitKind::ALL {
            if engine.check_training(id, kind).is_ok() {
                commands.push(Command::TrainUnit { city: id, kind });
            }
        }
        if let Some(&tier) = city.pending_upgrades.first() {
            for &reward in state.rules.reward_choices(tier) {
                if engine.check_city_upgrade(id, reward, actor).is_ok() {
                    commands.push(Command::ApplyCityUpgrade { city: id, reward });
                }
            }
        }
    }

    for (at, tile) in state.map.iter() {
        if tile.resource.is_some() && engine.check_harvest(at, actor).is_ok() {
            commands.push(Command::HarvestResource { at });
        }
        if tile.owner != Some(actor) || tile.building.is_some() {
            continue;
        }
        for building in &state.rules.buildings {
            if engine.check_build(at, &building.key, actor).is_ok() {
                commands.push(Command::BuildOnTile {
                    at,
                    building: building.key.clone(),
                });
            }
        }
    }

    for tech in researchable(state, actor) {
        if let Some(def) = state.rules.tech(tech) {
            commands.push(Command::ResearchTech {
                tech: def.key.clone(),
            });
        }
    }

    let stars = state.player(actor).map(|p| p.stars).unwrap_or(0);
    for other in state.alive_players().filter(|&p| p != actor) {
        let (Some(outgoing), Some(incoming)) = (
            state.diplomacy.get(actor, other),
            state.diplomacy.get(other, actor),
        ) else {
            continue;
        };
        if !outgoing.peace_offered {
            commands.push(Command::OfferPeace { to: other });
        }
        if incoming.peace_offered {
            commands.push(Command::AcceptPeace { from: other });
        }
        if !outgoing.has_embassy && stars >= state.rules.constants.embassy_cost {
            commands.push(Command::EstablishEmbassy { with: other });
        }
    }

    commands.push(Command::EndTurn);
    commands
}

/// Plays one match from `config` with random legal commands, for at most `max_steps`
/// commands. Command choice draws from its own generator seeded from `config.seed`, so
/// the match RNG stream is the same one a replay of the log would see.
pub fn run_playout(
    config: GameConfig,
    rules: Rules,
    max_steps: u32,
) -> (GameEngine, PlayoutResult) {
    let seed = config.seed;
    let mut engine = GameEngine::new(config, rules);
    let mut chooser = GameRng::seed_from_u64(seed ^ 0x9e37_79b9_7f4a_7c15);
    let mut metrics = PlayoutMetrics::default();
    let mut steps = 0;

    while steps < max_steps && !engine.is_over() {
        let commands = legal_commands(&engine);
        if commands.is_empty() {
            break;
        }
        let command = commands[chooser.gen_index(commands.len())].clone();
        steps += 1;
        match engine.apply_command_checked(command.clone()) {
            Ok(events) => {
                metrics.commands_applied += 1;
                for event in &events {
                    record_event(event, &mut metrics);
                }
            }
            Err(err) => {
                metrics.commands_rejected += 1;
                debug!(?command, %err, "playout command rejected");
            }
        }
    }

    let state = engine.state();
    let result = PlayoutResult {
        seed,
        outcome: state.outcome.clone(),
        steps,
        final_turn: state.turn,
        metrics,
        final_hash: state.state_hash().ok(),
    };
    info!(
        seed,
        steps,
        turn = result.final_turn,
        winner = ?result.outcome.as_ref().and_then(|o| o.winner),
        "playout finished"
    );
    (engine, result)
}

fn record_event(event: &Event, metrics: &mut PlayoutMetrics) {
    match event {
        Event::CombatResolved { .. } => metrics.combats += 1,
        Event::UnitDied { .. } => metrics.units_killed += 1,
        Event::UnitTrained { .. } => metrics.units_trained += 1,
        Event::CityFounded { .. } => metrics.villages_captured += 1,
        Event::CityCaptured { .. } => metrics.cities_captured += 1,
        Event::TechResearched { .. } => metrics.techs_researched += 1,
        Event::BuildingBuilt { .. } => metrics.buildings_built += 1,
        Event::CityUpgradeApplied { .. } => metrics.upgrades_applied += 1,
        _ => {}
    }
}
