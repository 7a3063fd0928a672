use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;
use thiserror::Error;
use tribes_protocol::{
    hash_bytes_fnv1a64, BuildingId, CityReward, Resource, TechId, Terrain, UnitKind,
};

use crate::rules::{
    resolve_tech, BuildingType, HarvestRule, RawBuildingType, RawConstants, RawHarvestRule,
    RawTechnology, RawTerrainRule, RawUnitStats, Rules, Technology,
};

#[derive(Debug, Error)]
pub enum RulesError {
    #[error("yaml parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("missing referenced id: {0}")]
    MissingId(String),
    #[error("utf-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub enum RulesSource<'a> {
    Embedded,
    Path(String),
    Str(&'a str),
}

#[derive(Debug, Deserialize)]
struct RawRules {
    terrain: BTreeMap<Terrain, RawTerrainRule>,
    units: BTreeMap<UnitKind, RawUnitStats>,
    techs: BTreeMap<String, RawTechnology>,
    #[serde(default)]
    buildings: BTreeMap<String, RawBuildingType>,
    #[serde(default)]
    harvest: BTreeMap<Resource, RawHarvestRule>,
    #[serde(default)]
    city_rewards: BTreeMap<u8, Vec<CityReward>>,
    constants: RawConstants,
}

pub const EMBEDDED_RULES: &str = include_str!("../../data/base/rules.yaml");

pub fn load_rules(source: RulesSource<'_>) -> Result<Rules, RulesError> {
    match source {
        RulesSource::Embedded => parse_rules(EMBEDDED_RULES),
        RulesSource::Path(path) => {
            let bytes = std::fs::read(path)?;
            parse_rules(std::str::from_utf8(&bytes)?)
        }
        RulesSource::Str(text) => parse_rules(text),
    }
}

fn parse_rules(text: &str) -> Result<Rules, RulesError> {
    let raw: RawRules = serde_yaml::from_str(text)?;
    compile_rules(raw, hash_bytes_fnv1a64(text.as_bytes()))
}

fn compile_rules(raw: RawRules, source_hash: u64) -> Result<Rules, RulesError> {
    let tech_ids = raw
        .techs
        .keys()
        .enumerate()
        .map(|(i, k)| (k.clone(), TechId::new(i as u16)))
        .collect::<HashMap<_, _>>();
    let building_ids = raw
        .buildings
        .keys()
        .enumerate()
        .map(|(i, k)| (k.clone(), BuildingId::new(i as u16)))
        .collect::<HashMap<_, _>>();

    let mut terrain = raw.terrain;
    let terrains = Terrain::ALL
        .iter()
        .map(|t| {
            terrain
                .remove(t)
                .map(RawTerrainRule::compile)
                .ok_or_else(|| RulesError::MissingId(format!("terrain {t:?}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut units = raw.units;
    let units = UnitKind::ALL
        .iter()
        .map(|k| {
            units
                .remove(k)
                .ok_or_else(|| RulesError::MissingId(format!("unit {k}")))?
                .compile(&tech_ids)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let techs = raw
        .techs
        .into_iter()
        .map(|(key, t)| {
            Ok(Technology {
                key,
                tier: t.tier.max(1),
                requires: resolve_tech(t.requires, &tech_ids)?,
            })
        })
        .collect::<Result<Vec<_>, RulesError>>()?;

    let buildings = raw
        .buildings
        .into_iter()
        .map(|(key, b)| {
            let adjacency = match b.adjacent {
                Some(adj) => {
                    let id = building_ids
                        .get(&adj.building)
                        .copied()
                        .ok_or(RulesError::MissingId(adj.building))?;
                    Some((id, adj.bonus))
                }
                None => None,
            };
            Ok(BuildingType {
                key,
                terrain: b.terrain,
                tech_required: resolve_tech(b.tech, &tech_ids)?,
                cost: b.cost.max(0),
                population: b.population.max(0),
                adjacency,
            })
        })
        .collect::<Result<Vec<_>, RulesError>>()?;

    let harvest = raw
        .harvest
        .into_iter()
        .map(|(resource, h)| {
            let tech = tech_ids
                .get(&h.tech)
                .copied()
                .ok_or(RulesError::MissingId(h.tech))?;
            Ok((
                resource,
                HarvestRule {
                    tech_required: tech,
                    population: h.population.max(0),
                },
            ))
        })
        .collect::<Result<BTreeMap<_, _>, RulesError>>()?;

    let constants = raw.constants.compile(&tech_ids)?;

    Ok(Rules {
        terrains,
        units,
        techs,
        buildings,
        harvest,
        city_rewards: raw.city_rewards,
        constants,
        tech_ids,
        building_ids,
        source_hash,
    })
}
