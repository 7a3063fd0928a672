use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Terrain {
    Field,
    Forest,
    Mountain,
    Water,
    ShallowWater,
    Village,
    City,
    Ruins,
    Ocean,
}

impl Terrain {
    pub const ALL: [Terrain; 9] = [
        Terrain::Field,
        Terrain::Forest,
        Terrain::Mountain,
        Terrain::Water,
        Terrain::ShallowWater,
        Terrain::Village,
        Terrain::City,
        Terrain::Ruins,
        Terrain::Ocean,
    ];

    /// Deep water tiles can never be owned.
    pub fn is_unclaimable(self) -> bool {
        matches!(self, Terrain::Water | Terrain::Ocean)
    }

    pub fn is_water(self) -> bool {
        matches!(
            self,
            Terrain::Water | Terrain::ShallowWater | Terrain::Ocean
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Fruit,
    Animal,
    Fish,
    Crop,
    Mine,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    Warrior,
    Rider,
    Archer,
    Defender,
    Swordsman,
    Catapult,
    Knight,
    Giant,
}

impl UnitKind {
    pub const ALL: [UnitKind; 8] = [
        UnitKind::Warrior,
        UnitKind::Rider,
        UnitKind::Archer,
        UnitKind::Defender,
        UnitKind::Swordsman,
        UnitKind::Catapult,
        UnitKind::Knight,
        UnitKind::Giant,
    ];
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UnitKind::Warrior => "warrior",
            UnitKind::Rider => "rider",
            UnitKind::Archer => "archer",
            UnitKind::Defender => "defender",
            UnitKind::Swordsman => "swordsman",
            UnitKind::Catapult => "catapult",
            UnitKind::Knight => "knight",
            UnitKind::Giant => "giant",
        };
        f.write_str(name)
    }
}

/// One player's stance toward another, ordered from worst to best.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Hostile,
    Unfriendly,
    #[default]
    Neutral,
    Friendly,
    Allied,
}

impl Relation {
    /// One step toward `Friendly`; `Friendly` and `Allied` are left as they are.
    pub fn toward_friendly(self) -> Relation {
        match self {
            Relation::Hostile => Relation::Unfriendly,
            Relation::Unfriendly => Relation::Neutral,
            Relation::Neutral => Relation::Friendly,
            Relation::Friendly => Relation::Friendly,
            Relation::Allied => Relation::Allied,
        }
    }
}

/// Reward picked when a city levels up.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CityReward {
    /// +1 star income.
    Workshop,
    /// A free scouting unit.
    Explorer,
    /// +4 defence for units in the city.
    Walls,
    /// Flat star bonus.
    Resources,
    /// Extra population, may cascade into further level-ups.
    PopulationGrowth,
    /// Territory grows to radius 2.
    BorderGrowth,
    /// +1 star income.
    Park,
    /// A free heavy unit.
    SuperUnit,
}

/// What a unit found when stepping on ruins.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuinsReward {
    Tech { tech: String },
    Stars { amount: i32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relation_steps_toward_friendly() {
        assert_eq!(Relation::Hostile.toward_friendly(), Relation::Unfriendly);
        assert_eq!(Relation::Neutral.toward_friendly(), Relation::Friendly);
        assert_eq!(Relation::Allied.toward_friendly(), Relation::Allied);
    }

    #[test]
    fn terrain_serializes_snake_case() {
        let json = serde_json::to_string(&Terrain::ShallowWater).unwrap();
        assert_eq!(json, "\"shallow_water\"");
    }
}
