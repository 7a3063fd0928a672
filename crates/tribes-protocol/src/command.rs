use serde::{Deserialize, Serialize};

use crate::{CityId, CityReward, Coord, PlayerId, UnitId, UnitKind};

/// Every player intent the engine accepts. Commands act on behalf of the current player.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Command {
    // Units
    MoveUnit { unit: UnitId, to: Coord },
    AttackUnit { attacker: UnitId, target: Coord },
    Fortify { unit: UnitId },

    // Cities and tiles
    TrainUnit { city: CityId, kind: UnitKind },
    HarvestResource { at: Coord },
    BuildOnTile { at: Coord, building: String },
    ApplyCityUpgrade { city: CityId, reward: CityReward },

    // Research
    ResearchTech { tech: String },

    // Diplomacy
    OfferPeace { to: PlayerId },
    AcceptPeace { from: PlayerId },
    EstablishEmbassy { with: PlayerId },

    EndTurn,
}
