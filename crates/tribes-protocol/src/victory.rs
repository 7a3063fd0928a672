//! Match outcome types.

use serde::{Deserialize, Serialize};

use crate::PlayerId;

/// How the match ended.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VictoryReason {
    /// Every other player lost their last capital.
    Domination,
    /// Highest score when the turn limit was passed.
    Score,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerScore {
    pub player: PlayerId,
    pub total: i64,
}

/// Final result of a match. Once recorded the match accepts no further actions.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameOutcome {
    pub winner: Option<PlayerId>,
    pub reason: VictoryReason,
    pub turn: u32,
    #[serde(default)]
    pub scores: Vec<PlayerScore>,
}
