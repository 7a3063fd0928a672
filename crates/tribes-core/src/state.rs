use std::collections::BTreeSet;

use tribes_protocol::{CityId, Coord, GameOutcome, PlayerId, Terrain, UnitId};

use crate::city::City;
use crate::diplomacy::DiplomacyState;
use crate::entities::EntityStore;
use crate::map::GameMap;
use crate::mapgen::{generate_map, MapGenConfig};
use crate::rng::GameRng;
use crate::rules::Rules;
use crate::unit::Unit;

#[derive(Clone, Debug, PartialEq)]
pub struct Player {
    pub id: PlayerId,
    /// Never negative.
    pub stars: i32,
    /// Derived from owned cities; refreshed whenever a city changes hands or levels up.
    pub stars_per_turn: i32,
    /// Coordinates of owned cities, in acquisition order.
    pub cities: Vec<Coord>,
    /// Indexed by `TechId`.
    pub techs: Vec<bool>,
    pub alive: bool,
    pub wins: u32,
    pub losses: u32,
}

impl Player {
    pub fn new(id: PlayerId, stars: i32, tech_count: usize) -> Self {
        Self {
            id,
            stars,
            stars_per_turn: 0,
            cities: Vec::new(),
            techs: vec![false; tech_count],
            alive: true,
            wins: 0,
            losses: 0,
        }
    }

    pub fn has_tech(&self, tech: tribes_protocol::TechId) -> bool {
        self.techs.get(tech.index()).copied().unwrap_or(false)
    }

    pub fn tech_count(&self) -> usize {
        self.techs.iter().filter(|&&known| known).count()
    }
}

/// The whole match: grid, units, cities, players, fog and diplomacy.
///
/// Read it freely; mutate it only through [`crate::GameEngine`].
#[derive(Clone, Debug)]
pub struct GameState {
    pub turn: u32,
    pub max_turns: u32,
    pub current_player: PlayerId,
    pub map: GameMap,
    pub rules: Rules,
    pub players: Vec<Player>,
    /// Per player, indexed like the map. Only ever grows.
    pub explored: Vec<Vec<bool>>,
    pub units: EntityStore<Unit>,
    pub cities: EntityStore<City>,
    pub diplomacy: DiplomacyState,
    pub outcome: Option<GameOutcome>,
    pub rng: GameRng,
}

impl GameState {
    /// Generates a map for `num_players` and seats everyone at their start: one capital,
    /// two warriors and the explored area around them.
    pub fn generate(
        num_players: u32,
        max_turns: u32,
        starting_stars: i32,
        rules: Rules,
        mut rng: GameRng,
    ) -> Self {
        let generated = generate_map(
            &MapGenConfig {
                num_players: num_players.clamp(2, 4),
            },
            &rules,
            &mut rng,
        );
        let mut state = Self::empty(
            generated.map,
            generated.starts.len(),
            max_turns,
            starting_stars,
            rules,
            rng,
        );

        for (idx, &at) in generated.starts.iter().enumerate() {
            let owner = PlayerId(idx as u8);
            state.found_city(at, owner, true);
        }
        for &(owner, at) in &generated.start_units {
            let unit = Unit::new(tribes_protocol::UnitKind::Warrior, owner, at, &state.rules);
            state.units.insert(unit);
        }
        for idx in 0..state.players.len() {
            let player = PlayerId(idx as u8);
            state.refresh_income(player);
            state.reveal(player);
        }
        state
    }

    /// A match with no cities or units on the given map. Used by restore paths and tests.
    pub fn empty(
        map: GameMap,
        num_players: usize,
        max_turns: u32,
        starting_stars: i32,
        rules: Rules,
        rng: GameRng,
    ) -> Self {
        let map_len = map.len();
        let tech_count = rules.tech_count();
        Self {
            turn: 1,
            max_turns,
            current_player: PlayerId(0),
            map,
            rules,
            players: (0..num_players)
                .map(|i| Player::new(PlayerId(i as u8), starting_stars.max(0), tech_count))
                .collect(),
            explored: vec![vec![false; map_len]; num_players],
            units: EntityStore::default(),
            cities: EntityStore::default(),
            diplomacy: DiplomacyState::new(num_players),
            outcome: None,
            rng,
        }
    }

    /// All-field map of `size` with `num_players` players and nothing placed.
    pub fn new_for_tests(size: u32, num_players: usize, rules: Rules, seed: u64) -> Self {
        Self::empty(
            GameMap::new(size, Terrain::Field),
            num_players,
            30,
            0,
            rules,
            GameRng::seed_from_u64(seed),
        )
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(id.index())
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(id.index())
    }

    pub fn is_over(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn unit_at(&self, at: Coord) -> Option<(UnitId, &Unit)> {
        self.units
            .iter_ordered()
            .find(|(_, u)| u.position == at && u.is_alive())
    }

    pub fn city_at(&self, at: Coord) -> Option<(CityId, &City)> {
        let id = self.map.get(at)?.city?;
        self.cities.get(id).map(|c| (id, c))
    }

    pub fn capital_count(&self, player: PlayerId) -> usize {
        self.cities
            .iter_ordered()
            .filter(|(_, c)| c.owner == player && c.is_capital)
            .count()
    }

    pub fn alive_players(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.players.iter().filter(|p| p.alive).map(|p| p.id)
    }

    /// Puts a fresh level-1 city at `at`, claims the unowned part of its radius-1 territory
    /// and registers it with the owner.
    pub fn found_city(&mut self, at: Coord, owner: PlayerId, is_capital: bool) -> Option<CityId> {
        let tile = self.map.get_mut(at)?;
        tile.terrain = Terrain::City;
        tile.resource = None;
        tile.building = None;
        let city = City::new(at, owner, is_capital);
        let radius = city.territory_radius;
        let id = self.cities.insert(city);
        if let Some(tile) = self.map.get_mut(at) {
            tile.city = Some(id);
        }
        let territory: Vec<Coord> = self.map.square(at, radius).collect();
        for c in territory {
            let free = self.map.get(c).is_some_and(|t| t.owner.is_none());
            if c == at || free {
                self.map.claim(c, owner);
            }
        }
        if let Some(player) = self.player_mut(owner) {
            player.cities.push(at);
        }
        Some(id)
    }

    /// Recomputes a player's star income from the cities they own.
    pub fn refresh_income(&mut self, player: PlayerId) -> i32 {
        let income = self
            .cities
            .iter_ordered()
            .filter(|(_, c)| c.owner == player)
            .map(|(_, c)| c.income())
            .sum();
        if let Some(p) = self.player_mut(player) {
            p.stars_per_turn = income;
        }
        income
    }

    /// Tiles the player currently sees: a radius around every owned tile and every living
    /// unit (wider for explorer-class units). Not cached.
    pub fn compute_visibility(&self, player: PlayerId) -> BTreeSet<Coord> {
        let mut visible = BTreeSet::new();
        let territory = self.rules.constants.territory_vision;
        for (at, tile) in self.map.iter() {
            if tile.owner == Some(player) {
                visible.extend(self.map.square(at, territory));
            }
        }
        for (_, unit) in self.units.iter_ordered() {
            if unit.owner == player && unit.is_alive() {
                visible.extend(self.map.square(unit.position, unit.vision(&self.rules)));
            }
        }
        visible
    }

    /// Folds current visibility into the explored set. Returns how many tiles were new.
    pub fn reveal(&mut self, player: PlayerId) -> u32 {
        let visible = self.compute_visibility(player);
        let Some(explored) = self.explored.get_mut(player.index()) else {
            return 0;
        };
        let mut newly = 0;
        for at in visible {
            if let Some(i) = self.map.index_of(at) {
                if !explored[i] {
                    explored[i] = true;
                    newly += 1;
                }
            }
        }
        tracing::trace!(player = %player, newly, "visibility updated");
        newly
    }

    pub fn explored_count(&self, player: PlayerId) -> usize {
        self.explored
            .get(player.index())
            .map(|e| e.iter().filter(|&&x| x).count())
            .unwrap_or(0)
    }

    pub fn is_explored(&self, player: PlayerId, at: Coord) -> bool {
        match (self.explored.get(player.index()), self.map.index_of(at)) {
            (Some(explored), Some(i)) => explored[i],
            _ => false,
        }
    }

    /// 100 per city, 10 per living unit, 20 per tech, current stars, 5 per explored tile.
    pub fn compute_score(&self, player: PlayerId) -> i64 {
        let Some(p) = self.player(player) else {
            return 0;
        };
        let cities = self
            .cities
            .iter_ordered()
            .filter(|(_, c)| c.owner == player)
            .count() as i64;
        let units = self
            .units
            .iter_ordered()
            .filter(|(_, u)| u.owner == player && u.is_alive())
            .count() as i64;
        100 * cities
            + 10 * units
            + 20 * p.tech_count() as i64
            + i64::from(p.stars)
            + 5 * self.explored_count(player) as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{load_rules, RulesSource};
    use tribes_protocol::UnitKind;

    fn state() -> GameState {
        GameState::new_for_tests(9, 2, load_rules(RulesSource::Embedded).unwrap(), 1)
    }

    #[test]
    fn visibility_covers_territory_and_units() {
        let mut s = state();
        s.found_city(Coord::new(1, 1), PlayerId(0), true);
        let rider = Unit::new(UnitKind::Rider, PlayerId(0), Coord::new(6, 6), &s.rules);
        s.units.insert(rider);

        let visible = s.compute_visibility(PlayerId(0));
        // Territory (0..=2)^2 seen out to radius 1 gives (0..=3)^2.
        assert!(visible.contains(&Coord::new(3, 3)));
        assert!(!visible.contains(&Coord::new(3, 5)));
        // Rider sees two tiles out.
        assert!(visible.contains(&Coord::new(8, 8)));
        assert!(visible.contains(&Coord::new(4, 4)));
        assert!(!visible.contains(&Coord::new(3, 6)));
    }

    #[test]
    fn reveal_is_monotonic() {
        let mut s = state();
        let id = s
            .units
            .insert(Unit::new(UnitKind::Warrior, PlayerId(1), Coord::new(4, 4), &s.rules));
        assert_eq!(s.reveal(PlayerId(1)), 9);
        s.units.get_mut(id).unwrap().position = Coord::new(5, 4);
        assert_eq!(s.reveal(PlayerId(1)), 3);
        assert_eq!(s.explored_count(PlayerId(1)), 12);
        assert!(s.is_explored(PlayerId(1), Coord::new(3, 3)));
    }

    #[test]
    fn score_is_a_pure_sum() {
        let mut s = state();
        s.found_city(Coord::new(1, 1), PlayerId(0), true);
        s.units
            .insert(Unit::new(UnitKind::Warrior, PlayerId(0), Coord::new(1, 2), &s.rules));
        s.players[0].stars = 7;
        s.players[0].techs[0] = true;
        s.reveal(PlayerId(0));
        let explored = s.explored_count(PlayerId(0)) as i64;
        assert_eq!(s.compute_score(PlayerId(0)), 100 + 10 + 20 + 7 + 5 * explored);
        assert_eq!(s.compute_score(PlayerId(1)), 0);
    }

    #[test]
    fn generated_match_seats_every_player() {
        let rules = load_rules(RulesSource::Embedded).unwrap();
        let s = GameState::generate(3, 30, 5, rules, GameRng::seed_from_u64(11));
        assert_eq!(s.map.size(), 15);
        assert_eq!(s.players.len(), 3);
        for p in &s.players {
            assert_eq!(p.cities.len(), 1);
            assert_eq!(s.capital_count(p.id), 1);
            assert_eq!(p.stars, 5);
            assert_eq!(p.stars_per_turn, 2);
            assert!(s.explored_count(p.id) > 0);
            let warriors = s
                .units
                .iter_ordered()
                .filter(|(_, u)| u.owner == p.id)
                .count();
            assert_eq!(warriors, 2);
        }
    }
}
