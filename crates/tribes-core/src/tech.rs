use tribes_protocol::{PlayerId, TechId};

use crate::state::GameState;

/// Why a tech cannot be researched right now.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResearchBlock {
    UnknownPlayer,
    UnknownTech,
    AlreadyKnown,
    MissingPrerequisite(TechId),
    Unaffordable { cost: i32, stars: i32 },
}

/// `tier * max(1, cities) + base`, scaled down (rounding up) once the discount tech is
/// known, unless `tech` is the discount tech itself.
pub fn research_cost(state: &GameState, player: PlayerId, tech: TechId) -> Option<i32> {
    let constants = &state.rules.constants;
    let tier = state.rules.tech(tech)?.tier;
    let p = state.player(player)?;
    let cities = (p.cities.len() as i32).max(1);
    let cost = tier * cities + constants.research_base_cost;

    let discounted = p.has_tech(constants.research_discount_tech)
        && tech != constants.research_discount_tech;
    if discounted {
        let pct = constants.research_discount_percent;
        Some((cost * pct + 99) / 100)
    } else {
        Some(cost)
    }
}

/// Checks every research precondition and returns the cost on success.
pub fn check_research(state: &GameState, player: PlayerId, tech: TechId) -> Result<i32, ResearchBlock> {
    let p = state.player(player).ok_or(ResearchBlock::UnknownPlayer)?;
    let def = state.rules.tech(tech).ok_or(ResearchBlock::UnknownTech)?;
    if p.has_tech(tech) {
        return Err(ResearchBlock::AlreadyKnown);
    }
    if let Some(req) = def.requires {
        if !p.has_tech(req) {
            return Err(ResearchBlock::MissingPrerequisite(req));
        }
    }
    let cost = research_cost(state, player, tech).ok_or(ResearchBlock::UnknownTech)?;
    if p.stars < cost {
        return Err(ResearchBlock::Unaffordable {
            cost,
            stars: p.stars,
        });
    }
    Ok(cost)
}

/// Techs the player could research right now, in id order.
pub fn researchable(state: &GameState, player: PlayerId) -> Vec<TechId> {
    (0..state.rules.tech_count())
        .map(|i| TechId::new(i as u16))
        .filter(|&t| check_research(state, player, t).is_ok())
        .collect()
}
