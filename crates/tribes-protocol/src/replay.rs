use serde::{Deserialize, Serialize};

use crate::{Command, PlayerId};

pub const REPLAY_VERSION: u32 = 1;

/// Everything needed to rebuild a match command by command.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReplayFile {
    /// Replay file schema version.
    pub version: u32,
    pub num_players: u32,
    pub max_turns: u32,
    pub starting_stars: i32,
    pub seed: u64,
    /// Hash of the rules text the match was played with.
    pub rules_hash: u64,
    #[serde(default)]
    pub commands: Vec<ReplayCommand>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReplayCommand {
    pub turn: u32,
    pub player: PlayerId,
    pub command: Command,
}
