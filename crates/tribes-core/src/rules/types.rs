use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;
use tribes_protocol::{
    BuildingId, CityReward, DataId, Resource, TechId, Terrain, UnitKind,
};

use crate::rules::RulesError;

/// Compiled, immutable rule tables. Pure data: the engine only reads from it.
#[derive(Clone, Debug)]
pub struct Rules {
    /// Indexed by `Terrain as usize`.
    pub terrains: Vec<TerrainRule>,
    /// Indexed by `UnitKind as usize`.
    pub units: Vec<UnitStats>,
    pub techs: Vec<Technology>,
    pub buildings: Vec<BuildingType>,
    pub harvest: BTreeMap<Resource, HarvestRule>,
    pub city_rewards: BTreeMap<u8, Vec<CityReward>>,
    pub constants: Constants,

    pub tech_ids: HashMap<DataId, TechId>,
    pub building_ids: HashMap<DataId, BuildingId>,

    /// FNV-1a of the rules text, used to reject mismatched replays.
    pub source_hash: u64,
}

impl Rules {
    pub fn terrain(&self, terrain: Terrain) -> &TerrainRule {
        &self.terrains[terrain as usize]
    }

    pub fn unit(&self, kind: UnitKind) -> &UnitStats {
        &self.units[kind as usize]
    }

    pub fn tech(&self, id: TechId) -> Option<&Technology> {
        self.techs.get(id.index())
    }

    pub fn building(&self, id: BuildingId) -> Option<&BuildingType> {
        self.buildings.get(id.index())
    }

    pub fn tech_id(&self, key: &str) -> Option<TechId> {
        self.tech_ids.get(key).copied()
    }

    pub fn building_id(&self, key: &str) -> Option<BuildingId> {
        self.building_ids.get(key).copied()
    }

    pub fn tech_count(&self) -> usize {
        self.techs.len()
    }

    /// Rewards offered for a level-up of the given tier (empty for tier 1 or unknown tiers).
    pub fn reward_choices(&self, tier: u8) -> &[CityReward] {
        self.city_rewards
            .get(&tier)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTerrainRule {
    #[serde(default)]
    pub move_cost: Option<i32>,
    #[serde(default)]
    pub climb_cost: Option<i32>,
    #[serde(default)]
    pub explorer_cost: Option<i32>,
    #[serde(default)]
    pub defence_bonus: f64,
}

impl RawTerrainRule {
    pub fn compile(self) -> TerrainRule {
        TerrainRule {
            move_cost: self.move_cost.map(|c| c.max(1)),
            climb_cost: self.climb_cost.map(|c| c.max(1)),
            explorer_cost: self.explorer_cost.map(|c| c.max(1)),
            defence_bonus: self.defence_bonus,
        }
    }
}

/// Movement and defence data for one terrain. `None` costs mean impassable.
#[derive(Debug, Clone, PartialEq)]
pub struct TerrainRule {
    pub move_cost: Option<i32>,
    /// Cost once the climbing tech is known.
    pub climb_cost: Option<i32>,
    /// Cost for explorer-class units.
    pub explorer_cost: Option<i32>,
    pub defence_bonus: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawUnitStats {
    pub attack: f64,
    pub defence: f64,
    pub movement: i32,
    pub range: i32,
    pub hp: i32,
    pub cost: i32,
    #[serde(default)]
    pub tech: Option<String>,
    #[serde(default)]
    pub explorer: bool,
    #[serde(default = "default_trainable")]
    pub trainable: bool,
}

fn default_trainable() -> bool {
    true
}

impl RawUnitStats {
    pub fn compile(self, tech_ids: &HashMap<DataId, TechId>) -> Result<UnitStats, RulesError> {
        Ok(UnitStats {
            attack: self.attack,
            defence: self.defence,
            movement: self.movement.max(1),
            range: self.range.max(1),
            hp: self.hp.max(1),
            cost: self.cost.max(0),
            tech_required: resolve_tech(self.tech, tech_ids)?,
            explorer: self.explorer,
            trainable: self.trainable,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnitStats {
    pub attack: f64,
    pub defence: f64,
    pub movement: i32,
    pub range: i32,
    pub hp: i32,
    pub cost: i32,
    pub tech_required: Option<TechId>,
    /// Scouts: wider vision and can wade shallow water.
    pub explorer: bool,
    pub trainable: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawTechnology {
    pub tier: i32,
    #[serde(default)]
    pub requires: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Technology {
    pub key: DataId,
    pub tier: i32,
    pub requires: Option<TechId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawAdjacency {
    pub building: String,
    pub bonus: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawBuildingType {
    #[serde(default)]
    pub terrain: Option<Terrain>,
    #[serde(default)]
    pub tech: Option<String>,
    pub cost: i32,
    pub population: i32,
    #[serde(default)]
    pub adjacent: Option<RawAdjacency>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuildingType {
    pub key: DataId,
    /// `None` means the building fits any claimable terrain.
    pub terrain: Option<Terrain>,
    pub tech_required: Option<TechId>,
    pub cost: i32,
    pub population: i32,
    /// Extra population per neighbouring tile carrying `building`.
    pub adjacency: Option<(BuildingId, i32)>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawHarvestRule {
    pub tech: String,
    #[serde(default = "default_harvest_population")]
    pub population: i32,
}

fn default_harvest_population() -> i32 {
    1
}

#[derive(Debug, Clone, PartialEq)]
pub struct HarvestRule {
    pub tech_required: TechId,
    pub population: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawConstants {
    pub climbing_tech: String,
    pub research_base_cost: i32,
    pub research_discount_tech: String,
    pub research_discount_percent: i32,
    pub training_discount_tech: String,
    pub heal_amount: i32,
    pub embassy_cost: i32,
    pub ruins_stars: i32,
    pub ruins_tech_chance: f64,
    pub resources_reward_stars: i32,
    pub population_reward: i32,
    pub veteran_kills: u32,
    pub veteran_multiplier: f64,
    pub wall_defence_bonus: f64,
    pub fortify_defence_bonus: f64,
    pub explorer_unit: UnitKind,
    pub super_unit: UnitKind,
    pub max_reward_tier: u8,
    pub unit_vision: i32,
    pub explorer_vision: i32,
    pub territory_vision: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Constants {
    pub climbing_tech: TechId,
    pub research_base_cost: i32,
    pub research_discount_tech: TechId,
    pub research_discount_percent: i32,
    pub training_discount_tech: TechId,
    pub heal_amount: i32,
    pub embassy_cost: i32,
    pub ruins_stars: i32,
    pub ruins_tech_chance: f64,
    pub resources_reward_stars: i32,
    pub population_reward: i32,
    pub veteran_kills: u32,
    pub veteran_multiplier: f64,
    pub wall_defence_bonus: f64,
    pub fortify_defence_bonus: f64,
    pub explorer_unit: UnitKind,
    pub super_unit: UnitKind,
    pub max_reward_tier: u8,
    pub unit_vision: i32,
    pub explorer_vision: i32,
    pub territory_vision: i32,
}

impl RawConstants {
    pub fn compile(self, tech_ids: &HashMap<DataId, TechId>) -> Result<Constants, RulesError> {
        let lookup = |key: String| {
            tech_ids
                .get(&key)
                .copied()
                .ok_or(RulesError::MissingId(key))
        };
        Ok(Constants {
            climbing_tech: lookup(self.climbing_tech)?,
            research_base_cost: self.research_base_cost,
            research_discount_tech: lookup(self.research_discount_tech)?,
            research_discount_percent: self.research_discount_percent.clamp(1, 100),
            training_discount_tech: lookup(self.training_discount_tech)?,
            heal_amount: self.heal_amount.max(0),
            embassy_cost: self.embassy_cost.max(0),
            ruins_stars: self.ruins_stars,
            ruins_tech_chance: self.ruins_tech_chance.clamp(0.0, 1.0),
            resources_reward_stars: self.resources_reward_stars,
            population_reward: self.population_reward.max(0),
            veteran_kills: self.veteran_kills.max(1),
            veteran_multiplier: self.veteran_multiplier,
            wall_defence_bonus: self.wall_defence_bonus,
            fortify_defence_bonus: self.fortify_defence_bonus,
            explorer_unit: self.explorer_unit,
            super_unit: self.super_unit,
            max_reward_tier: self.max_reward_tier.max(2),
            unit_vision: self.unit_vision.max(0),
            explorer_vision: self.explorer_vision.max(0),
            territory_vision: self.territory_vision.max(0),
        })
    }
}

pub(crate) fn resolve_tech(
    key: Option<String>,
    tech_ids: &HashMap<DataId, TechId>,
) -> Result<Option<TechId>, RulesError> {
    match key {
        Some(key) => Ok(Some(
            *tech_ids.get(&key).ok_or(RulesError::MissingId(key))?,
        )),
        None => Ok(None),
    }
}
