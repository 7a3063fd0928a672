use serde::{Deserialize, Serialize};

use crate::{
    CityId, CityReward, Coord, GameOutcome, PlayerId, Relation, RuinsReward, UnitId, UnitKind,
};

/// Everything the engine reports back after a successful action. Fully serializable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    // Turn flow
    TurnStarted {
        turn: u32,
        player: PlayerId,
        income: i32,
        stars: i32,
    },
    TurnEnded {
        turn: u32,
        player: PlayerId,
    },
    GameEnded {
        outcome: GameOutcome,
    },
    PlayerEliminated {
        player: PlayerId,
    },

    // Units
    UnitMoved {
        unit: UnitId,
        from: Coord,
        to: Coord,
    },
    UnitFortified {
        unit: UnitId,
    },
    UnitTrained {
        unit: UnitId,
        city: CityId,
        kind: UnitKind,
        cost: i32,
    },
    UnitSpawned {
        unit: UnitId,
        city: CityId,
        kind: UnitKind,
    },
    UnitHealed {
        unit: UnitId,
        hp: i32,
    },
    UnitPromoted {
        unit: UnitId,
    },
    UnitDied {
        unit: UnitId,
        owner: PlayerId,
        at: Coord,
        killer: Option<UnitId>,
    },
    CombatResolved {
        attacker: UnitId,
        defender: UnitId,
        at: Coord,
        damage_to_defender: i32,
        /// `None` when no counterattack happened.
        damage_to_attacker: Option<i32>,
        attacker_hp: i32,
        defender_hp: i32,
    },

    // Exploration
    TilesExplored {
        player: PlayerId,
        count: u32,
    },
    RuinsDiscovered {
        at: Coord,
        player: PlayerId,
        reward: RuinsReward,
    },

    // Cities and territory
    CityFounded {
        city: CityId,
        at: Coord,
        owner: PlayerId,
    },
    CityCaptured {
        city: CityId,
        at: Coord,
        old_owner: PlayerId,
        new_owner: PlayerId,
        was_capital: bool,
    },
    BordersExpanded {
        city: CityId,
        tiles: Vec<Coord>,
    },
    PopulationGained {
        city: CityId,
        amount: i32,
        population: i32,
        max_population: i32,
    },
    CityLeveledUp {
        city: CityId,
        level: u8,
        reward_tier: u8,
        choices: Vec<CityReward>,
    },
    CityUpgradeApplied {
        city: CityId,
        reward: CityReward,
    },

    // Economy
    StarsGained {
        player: PlayerId,
        amount: i32,
    },
    TechResearched {
        player: PlayerId,
        tech: String,
        cost: i32,
    },
    ResourceHarvested {
        at: Coord,
        player: PlayerId,
        city: Option<CityId>,
    },
    BuildingBuilt {
        at: Coord,
        building: String,
        player: PlayerId,
        cost: i32,
    },

    // Diplomacy
    RelationChanged {
        from: PlayerId,
        to: PlayerId,
        relation: Relation,
    },
    PeaceOffered {
        from: PlayerId,
        to: PlayerId,
    },
    PeaceAccepted {
        a: PlayerId,
        b: PlayerId,
    },
    EmbassyEstablished {
        from: PlayerId,
        to: PlayerId,
    },
}
