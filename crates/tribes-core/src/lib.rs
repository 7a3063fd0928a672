//! Authoritative engine for a small turn-based tribes strategy game.

mod city;
mod combat;
mod config;
mod diplomacy;
mod entities;
mod game;
mod map;
pub mod mapgen;
mod movement;
pub mod playout;
mod rng;
mod rules;
mod snapshot;
mod state;
mod tech;
mod unit;
mod view;

pub use crate::city::*;
pub use crate::combat::*;
pub use crate::config::*;
pub use crate::diplomacy::*;
pub use crate::entities::*;
pub use crate::game::*;
pub use crate::map::*;
pub use crate::mapgen::{generate_map, map_size_for, GeneratedMap, MapGenConfig};
pub use crate::movement::*;
pub use crate::playout::{legal_commands, run_playout, PlayoutMetrics, PlayoutResult};
pub use crate::rng::*;
pub use crate::rules::*;
pub use crate::snapshot::*;
pub use crate::state::*;
pub use crate::tech::*;
pub use crate::unit::*;
