use thiserror::Error;
use tracing::{debug, info, warn};
use tribes_protocol::{
    BuildingId, CityId, CityReward, Command, Coord, Event, GameOutcome, PlayerId, PlayerScore,
    Relation, ReplayCommand, ReplayFile, RuinsReward, TechId, Terrain, UnitId, UnitKind,
    VictoryReason, REPLAY_VERSION,
};

use crate::combat::{attack_targets, defence_bonus, resolve_combat};
use crate::config::{ConfigError, GameConfig};
use crate::movement::reachable_tiles;
use crate::rng::GameRng;
use crate::rules::Rules;
use crate::state::GameState;
use crate::tech::{check_research, ResearchBlock};
use crate::unit::Unit;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("unknown unit")]
    UnknownUnit,
    #[error("unknown city")]
    UnknownCity,
    #[error("unknown player")]
    UnknownPlayer,
    #[error("unknown technology: {0}")]
    UnknownTech(String),
    #[error("unknown building: {0}")]
    UnknownBuilding(String),
    #[error("{0} is off the map")]
    OutOfBounds(Coord),
    #[error("unit does not belong to the acting player")]
    NotYourUnit,
    #[error("city does not belong to the acting player")]
    NotYourCity,
    #[error("unit has already moved this turn")]
    AlreadyMoved,
    #[error("unit has already attacked this turn")]
    AlreadyAttacked,
    #[error("destination is not reachable")]
    IllegalDestination,
    #[error("no enemy in range at target")]
    TargetNotInRange,
    #[error("not enough stars: need {needed}, have {available}")]
    NotEnoughStars { needed: i32, available: i32 },
    #[error("required technology not researched")]
    MissingTech,
    #[error("technology already researched")]
    TechAlreadyResearched,
    #[error("technology prerequisite not met")]
    TechPrerequisiteNotMet,
    #[error("unit type cannot be trained")]
    NotTrainable,
    #[error("tile is occupied")]
    TileOccupied,
    #[error("tile is not owned by the acting player")]
    TileNotOwned,
    #[error("city cannot support more units")]
    CapacityExceeded,
    #[error("wrong terrain")]
    WrongTerrain,
    #[error("tile already has a building")]
    BuildingExists,
    #[error("tile has no resource")]
    NoResource,
    #[error("player owns no city")]
    NoOwnedCity,
    #[error("city has no pending upgrade")]
    NoPendingUpgrade,
    #[error("reward not offered at this level")]
    RewardNotOffered,
    #[error("no free tile to place the unit")]
    NoSpawnTile,
    #[error("invalid diplomacy target")]
    InvalidDiplomacyTarget,
    #[error("no peace offer to accept")]
    NoPeaceOffer,
    #[error("embassy already established")]
    EmbassyExists,
    #[error("player has been eliminated")]
    PlayerEliminated,
    #[error("game is over")]
    GameOver,
}

/// Validated outcome of a building action.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BuildPlan {
    pub building: BuildingId,
    /// Nearest owned city, credited with the population.
    pub city: CityId,
    pub cost: i32,
    /// Base population plus any adjacency bonus.
    pub population: i32,
}

#[derive(Debug, Error)]
pub enum ReplayImportError {
    #[error("unsupported replay version {0}")]
    UnsupportedVersion(u32),
    #[error("rules hash mismatch: replay {expected:#x}, loaded {found:#x}")]
    RulesMismatch { expected: u64, found: u64 },
    #[error("invalid replay config: {0}")]
    Config(#[from] ConfigError),
    #[error("command {index} recorded for {recorded} on turn {recorded_turn}, but it is {current}'s turn {turn}")]
    OutOfTurn {
        index: usize,
        recorded: PlayerId,
        recorded_turn: u32,
        current: PlayerId,
        turn: u32,
    },
    #[error("command {index} rejected: {source}")]
    Desync {
        index: usize,
        #[source]
        source: GameError,
    },
}

/// Owns a match and is the only thing that mutates it.
///
/// Every action validates first and applies second: an `Err` leaves the state untouched.
/// Direct methods act for whoever the arguments name; [`GameEngine::try_apply_command`]
/// acts for the current player and checks ownership.
#[derive(Clone, Debug)]
pub struct GameEngine {
    config: GameConfig,
    command_log: Vec<ReplayCommand>,
    state: GameState,
}

impl GameEngine {
    /// New match seeded from `config.seed`.
    pub fn new(config: GameConfig, rules: Rules) -> Self {
        let rng = GameRng::seed_from_u64(config.seed);
        Self::with_rng(config, rules, rng)
    }

    /// New match drawing from an injected generator. Exported replays still record
    /// `config.seed`, so only seed-derived generators replay faithfully.
    ///
    /// Out-of-range player counts and turn limits are clamped, and the clamped values are
    /// what the engine keeps and exports.
    pub fn with_rng(mut config: GameConfig, rules: Rules, rng: GameRng) -> Self {
        if let Err(err) = config.validate() {
            warn!(%err, "clamping match config");
            config.num_players = config.num_players.clamp(2, 4);
            config.max_turns = config.max_turns.max(1);
        }
        let state = GameState::generate(
            config.num_players,
            config.max_turns,
            config.starting_stars,
            rules,
            rng,
        );
        info!(
            players = config.num_players,
            seed = config.seed,
            map_size = state.map.size(),
            "match created"
        );
        Self::from_state(config, state)
    }

    /// Wraps an existing state, e.g. one restored from a snapshot.
    pub fn from_state(config: GameConfig, state: GameState) -> Self {
        Self {
            config,
            command_log: Vec::new(),
            state,
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Raw access for scenario setup. Bypasses every rule check.
    pub fn state_mut(&mut self) -> &mut GameState {
        &mut self.state
    }

    pub fn into_state(self) -> GameState {
        self.state
    }

    pub fn command_log(&self) -> &[ReplayCommand] {
        &self.command_log
    }

    pub fn is_over(&self) -> bool {
        self.state.is_over()
    }

    // =========================================================================
    // Command dispatch
    // =========================================================================

    /// Applies `command` for the current player without recording it.
    pub fn try_apply_command(&mut self, command: Command) -> Result<Vec<Event>, GameError> {
        self.ensure_running()?;
        let actor = self.state.current_player;
        match command {
            Command::MoveUnit { unit, to } => {
                self.ensure_unit_owner(unit, actor)?;
                self.move_unit(unit, to)
            }
            Command::AttackUnit { attacker, target } => {
                self.ensure_unit_owner(attacker, actor)?;
                self.attack_unit(attacker, target)
            }
            Command::Fortify { unit } => {
                self.ensure_unit_owner(unit, actor)?;
                self.fortify(unit)
            }
            Command::TrainUnit { city, kind } => {
                self.ensure_city_owner(city, actor)?;
                self.train_unit(city, kind)
            }
            Command::HarvestResource { at } => self.harvest_resource(at, actor),
            Command::BuildOnTile { at, building } => self.build_on_tile(at, &building, actor),
            Command::ApplyCityUpgrade { city, reward } => {
                self.apply_city_upgrade(city, reward, actor)
            }
            Command::ResearchTech { tech } => self.research_tech(actor, &tech),
            Command::OfferPeace { to } => self.offer_peace(actor, to),
            Command::AcceptPeace { from } => self.accept_peace(actor, from),
            Command::EstablishEmbassy { with } => self.establish_embassy(actor, with),
            Command::EndTurn => self.end_turn(),
        }
    }

    /// Applies `command` for the current player and records it in the command log.
    pub fn apply_command_checked(&mut self, command: Command) -> Result<Vec<Event>, GameError> {
        let turn = self.state.turn;
        let player = self.state.current_player;

        let events = self.try_apply_command(command.clone())?;
        self.command_log.push(ReplayCommand {
            turn,
            player,
            command,
        });
        Ok(events)
    }

    pub fn apply_command(&mut self, command: Command) -> Vec<Event> {
        self.apply_command_checked(command).unwrap_or_default()
    }

    // =========================================================================
    // Replay
    // =========================================================================

    pub fn export_replay(&self) -> ReplayFile {
        ReplayFile {
            version: REPLAY_VERSION,
            num_players: self.config.num_players,
            max_turns: self.config.max_turns,
            starting_stars: self.config.starting_stars,
            seed: self.config.seed,
            rules_hash: self.state.rules.source_hash,
            commands: self.command_log.clone(),
        }
    }

    /// Rebuilds a match from scratch and re-applies every recorded command.
    pub fn import_replay(replay: &ReplayFile, rules: Rules) -> Result<Self, ReplayImportError> {
        if replay.version != REPLAY_VERSION {
            return Err(ReplayImportError::UnsupportedVersion(replay.version));
        }
        if replay.rules_hash != rules.source_hash {
            return Err(ReplayImportError::RulesMismatch {
                expected: replay.rules_hash,
                found: rules.source_hash,
            });
        }
        let config = GameConfig {
            num_players: replay.num_players,
            max_turns: replay.max_turns,
            seed: replay.seed,
            starting_stars: replay.starting_stars,
        };
        config.validate()?;

        let mut engine = Self::new(config, rules);
        for (index, recorded) in replay.commands.iter().enumerate() {
            let state = &engine.state;
            if recorded.player != state.current_player || recorded.turn != state.turn {
                return Err(ReplayImportError::OutOfTurn {
                    index,
                    recorded: recorded.player,
                    recorded_turn: recorded.turn,
                    current: state.current_player,
                    turn: state.turn,
                });
            }
            engine
                .apply_command_checked(recorded.command.clone())
                .map_err(|source| ReplayImportError::Desync { index, source })?;
        }
        Ok(engine)
    }

    // =========================================================================
    // Units
    // =========================================================================

    /// Moves a unit to a reachable tile, then resolves ruins, villages and enemy cities there.
    pub fn move_unit(&mut self, unit_id: UnitId, to: Coord) -> Result<Vec<Event>, GameError> {
        self.ensure_running()?;
        let unit = self.state.units.get(unit_id).ok_or(GameError::UnknownUnit)?;
        let (owner, from, moved) = (unit.owner, unit.position, unit.moved);
        self.ensure_alive(owner)?;
        if moved {
            return Err(GameError::AlreadyMoved);
        }
        if !self.state.map.in_bounds(to) {
            return Err(GameError::OutOfBounds(to));
        }
        if !reachable_tiles(&self.state, unit_id).contains(&to) {
            return Err(GameError::IllegalDestination);
        }

        if let Some(unit) = self.state.units.get_mut(unit_id) {
            unit.position = to;
            unit.moved = true;
            unit.fortified = false;
        }
        debug!(unit = %unit_id, %from, %to, "unit moved");
        let mut events = vec![Event::UnitMoved {
            unit: unit_id,
            from,
            to,
        }];
        self.explore(owner, &mut events);

        match self.state.map.get(to).map(|t| t.terrain) {
            Some(Terrain::Ruins) => self.discover_ruins(to, owner, &mut events),
            Some(Terrain::Village) => self.capture_village(to, owner, &mut events),
            Some(Terrain::City) => self.capture_city(to, owner, &mut events),
            _ => {}
        }
        Ok(events)
    }

    /// Attacks the enemy unit on `target`. The attacker's turn ends whatever the result.
    pub fn attack_unit(
        &mut self,
        attacker_id: UnitId,
        target: Coord,
    ) -> Result<Vec<Event>, GameError> {
        self.ensure_running()?;
        let attacker = self
            .state
            .units
            .get(attacker_id)
            .ok_or(GameError::UnknownUnit)?
            .clone();
        self.ensure_alive(attacker.owner)?;
        if attacker.attacked {
            return Err(GameError::AlreadyAttacked);
        }
        if !attack_targets(&self.state, attacker_id).contains(&target) {
            return Err(GameError::TargetNotInRange);
        }
        let (defender_id, defender) = self
            .state
            .unit_at(target)
            .map(|(id, u)| (id, u.clone()))
            .ok_or(GameError::TargetNotInRange)?;

        let attacker_bonus = defence_bonus(&self.state, &attacker);
        let defender_bonus = defence_bonus(&self.state, &defender);
        let outcome = resolve_combat(
            &attacker,
            attacker_bonus,
            &defender,
            defender_bonus,
            &self.state.rules,
            &mut self.state.rng,
        );

        if let Some(u) = self.state.units.get_mut(attacker_id) {
            u.hp = outcome.attacker_hp;
            u.attacked = true;
            u.moved = true;
            u.fortified = false;
        }
        if let Some(u) = self.state.units.get_mut(defender_id) {
            u.hp = outcome.defender_hp;
        }
        debug!(
            attacker = %attacker_id,
            defender = %defender_id,
            damage_to_defender = outcome.damage_to_defender,
            damage_to_attacker = ?outcome.damage_to_attacker,
            attacker_died = outcome.attacker_died(),
            defender_died = outcome.defender_died(),
            "combat resolved"
        );

        let mut events = vec![Event::CombatResolved {
            attacker: attacker_id,
            defender: defender_id,
            at: target,
            damage_to_defender: outcome.damage_to_defender,
            damage_to_attacker: outcome.damage_to_attacker,
            attacker_hp: outcome.attacker_hp,
            defender_hp: outcome.defender_hp,
        }];

        for (from, to) in [
            (attacker.owner, defender.owner),
            (defender.owner, attacker.owner),
        ] {
            if self.state.diplomacy.set_relation(from, to, Relation::Hostile) {
                events.push(Event::RelationChanged {
                    from,
                    to,
                    relation: Relation::Hostile,
                });
            }
        }

        if outcome.defender_died() {
            self.record_kill(attacker_id, attacker.owner, defender.owner, &mut events);
            self.remove_unit(defender_id, Some(attacker_id), &mut events);
        }
        if outcome.attacker_died() {
            self.record_kill(defender_id, defender.owner, attacker.owner, &mut events);
            self.remove_unit(attacker_id, Some(defender_id), &mut events);
        }
        Ok(events)
    }

    /// Digs a unit in: +defence until it next moves or attacks. Ends the unit's turn.
    pub fn fortify(&mut self, unit_id: UnitId) -> Result<Vec<Event>, GameError> {
        self.ensure_running()?;
        let unit = self.state.units.get(unit_id).ok_or(GameError::UnknownUnit)?;
        let (owner, moved, attacked) = (unit.owner, unit.moved, unit.attacked);
        self.ensure_alive(owner)?;
        if moved {
            return Err(GameError::AlreadyMoved);
        }
        if attacked {
            return Err(GameError::AlreadyAttacked);
        }
        if let Some(unit) = self.state.units.get_mut(unit_id) {
            unit.fortified = true;
            unit.moved = true;
            unit.attacked = true;
        }
        Ok(vec![Event::UnitFortified { unit: unit_id }])
    }

    // =========================================================================
    // Cities and tiles
    // =========================================================================

    /// Cost of training `kind` in `city_id` right now, or why it cannot happen.
    pub fn check_training(&self, city_id: CityId, kind: UnitKind) -> Result<i32, GameError> {
        let city = self.state.cities.get(city_id).ok_or(GameError::UnknownCity)?;
        self.ensure_alive(city.owner)?;
        let stats = self.state.rules.unit(kind);
        if !stats.trainable {
            return Err(GameError::NotTrainable);
        }
        let player = self.state.player(city.owner).ok_or(GameError::UnknownPlayer)?;
        if stats.tech_required.is_some_and(|t| !player.has_tech(t)) {
            return Err(GameError::MissingTech);
        }
        let mut cost = stats.cost;
        if player.has_tech(self.state.rules.constants.training_discount_tech) {
            cost = (cost - 1).max(1);
        }
        if player.stars < cost {
            return Err(GameError::NotEnoughStars {
                needed: cost,
                available: player.stars,
            });
        }
        if self.state.unit_at(city.position).is_some() {
            return Err(GameError::TileOccupied);
        }
        let supported = self
            .state
            .units
            .iter_ordered()
            .filter(|(_, u)| u.city_ref == Some(city_id))
            .count();
        if supported >= city.unit_capacity() {
            return Err(GameError::CapacityExceeded);
        }
        Ok(cost)
    }

    /// Trains a unit on the city tile. It cannot act until its owner's next turn.
    pub fn train_unit(
        &mut self,
        city_id: CityId,
        kind: UnitKind,
    ) -> Result<Vec<Event>, GameError> {
        self.ensure_running()?;
        let cost = self.check_training(city_id, kind)?;
        let city = self.state.cities.get(city_id).ok_or(GameError::UnknownCity)?;
        let (owner, at) = (city.owner, city.position);

        if let Some(p) = self.state.player_mut(owner) {
            p.stars -= cost;
        }
        let mut unit = Unit::new(kind, owner, at, &self.state.rules).exhausted();
        unit.city_ref = Some(city_id);
        let unit_id = self.state.units.insert(unit);
        debug!(unit = %unit_id, city = %city_id, %kind, cost, "unit trained");
        Ok(vec![Event::UnitTrained {
            unit: unit_id,
            city: city_id,
            kind,
            cost,
        }])
    }

    /// City credited and population gained by harvesting `at`, or why it cannot happen.
    pub fn check_harvest(&self, at: Coord, player: PlayerId) -> Result<(CityId, i32), GameError> {
        self.ensure_alive(player)?;
        let tile = self.state.map.get(at).ok_or(GameError::OutOfBounds(at))?;
        let resource = tile.resource.ok_or(GameError::NoResource)?;
        let rule = self
            .state
            .rules
            .harvest
            .get(&resource)
            .ok_or(GameError::NoResource)?;
        if !self.has_tech(player, rule.tech_required) {
            return Err(GameError::MissingTech);
        }
        let occupied_by_own = self
            .state
            .unit_at(at)
            .is_some_and(|(_, u)| u.owner == player);
        if tile.owner != Some(player) && !occupied_by_own {
            return Err(GameError::TileNotOwned);
        }
        let city_id = self.nearest_city(player, at).ok_or(GameError::NoOwnedCity)?;
        Ok((city_id, rule.population))
    }

    /// Consumes the resource on `at` for population in the nearest owned city.
    pub fn harvest_resource(
        &mut self,
        at: Coord,
        player: PlayerId,
    ) -> Result<Vec<Event>, GameError> {
        self.ensure_running()?;
        let (city_id, population) = self.check_harvest(at, player)?;

        if let Some(tile) = self.state.map.get_mut(at) {
            tile.resource = None;
        }
        let mut events = vec![Event::ResourceHarvested {
            at,
            player,
            city: Some(city_id),
        }];
        self.grow_city(city_id, population, &mut events);
        Ok(events)
    }

    /// What building `key` on `at` would cost and yield, or why it cannot happen.
    pub fn check_build(
        &self,
        at: Coord,
        key: &str,
        player: PlayerId,
    ) -> Result<BuildPlan, GameError> {
        self.ensure_alive(player)?;
        let building = self
            .state
            .rules
            .building_id(key)
            .ok_or_else(|| GameError::UnknownBuilding(key.to_string()))?;
        let def = self
            .state
            .rules
            .building(building)
            .ok_or_else(|| GameError::UnknownBuilding(key.to_string()))?;
        let tile = self.state.map.get(at).ok_or(GameError::OutOfBounds(at))?;
        if tile.owner != Some(player) {
            return Err(GameError::TileNotOwned);
        }
        if tile.building.is_some() {
            return Err(GameError::BuildingExists);
        }
        if tile.terrain == Terrain::City || def.terrain.is_some_and(|t| t != tile.terrain) {
            return Err(GameError::WrongTerrain);
        }
        if def.tech_required.is_some_and(|t| !self.has_tech(player, t)) {
            return Err(GameError::MissingTech);
        }
        let stars = self.state.player(player).map(|p| p.stars).unwrap_or(0);
        if stars < def.cost {
            return Err(GameError::NotEnoughStars {
                needed: def.cost,
                available: stars,
            });
        }
        let city = self.nearest_city(player, at).ok_or(GameError::NoOwnedCity)?;

        let adjacency_bonus = def
            .adjacency
            .map(|(neighbor, per)| {
                let count = at
                    .neighbors()
                    .filter(|&c| {
                        self.state
                            .map
                            .get(c)
                            .is_some_and(|t| t.owner == Some(player) && t.building == Some(neighbor))
                    })
                    .count() as i32;
                count * per
            })
            .unwrap_or(0);
        Ok(BuildPlan {
            building,
            city,
            cost: def.cost,
            population: def.population + adjacency_bonus,
        })
    }

    /// Builds `key` on an owned tile, replacing any resource, and credits population to the
    /// nearest owned city.
    pub fn build_on_tile(
        &mut self,
        at: Coord,
        key: &str,
        player: PlayerId,
    ) -> Result<Vec<Event>, GameError> {
        self.ensure_running()?;
        let plan = self.check_build(at, key, player)?;

        if let Some(p) = self.state.player_mut(player) {
            p.stars -= plan.cost;
        }
        if let Some(tile) = self.state.map.get_mut(at) {
            tile.building = Some(plan.building);
            tile.resource = None;
        }
        debug!(
            %at,
            building = key,
            player = %player,
            cost = plan.cost,
            population = plan.population,
            "building built"
        );
        let mut events = vec![Event::BuildingBuilt {
            at,
            building: key.to_string(),
            player,
            cost: plan.cost,
        }];
        self.grow_city(plan.city, plan.population, &mut events);
        Ok(events)
    }

    /// Checks that `reward` can be taken for the city's oldest pending level-up. For unit
    /// rewards, returns the unit and where it will appear.
    pub fn check_city_upgrade(
        &self,
        city_id: CityId,
        reward: CityReward,
        player: PlayerId,
    ) -> Result<Option<(UnitKind, Coord)>, GameError> {
        self.ensure_alive(player)?;
        let city = self.state.cities.get(city_id).ok_or(GameError::UnknownCity)?;
        if city.owner != player {
            return Err(GameError::NotYourCity);
        }
        let tier = *city
            .pending_upgrades
            .first()
            .ok_or(GameError::NoPendingUpgrade)?;
        if !self.state.rules.reward_choices(tier).contains(&reward) {
            return Err(GameError::RewardNotOffered);
        }
        let constants = &self.state.rules.constants;
        let kind = match reward {
            CityReward::Explorer => constants.explorer_unit,
            CityReward::SuperUnit => constants.super_unit,
            _ => return Ok(None),
        };
        let at = self.spawn_tile(city.position).ok_or(GameError::NoSpawnTile)?;
        Ok(Some((kind, at)))
    }

    /// Spends the oldest pending level-up reward of a city.
    pub fn apply_city_upgrade(
        &mut self,
        city_id: CityId,
        reward: CityReward,
        player: PlayerId,
    ) -> Result<Vec<Event>, GameError> {
        self.ensure_running()?;
        let spawn = self.check_city_upgrade(city_id, reward, player)?;

        let mut events = vec![Event::CityUpgradeApplied {
            city: city_id,
            reward,
        }];
        let mut position = None;
        if let Some(city) = self.state.cities.get_mut(city_id) {
            city.pending_upgrades.remove(0);
            match reward {
                CityReward::Workshop => city.workshop = true,
                CityReward::Walls => city.walls = true,
                CityReward::Park => city.park = true,
                CityReward::BorderGrowth => city.territory_radius = 2,
                _ => {}
            }
            position = Some(city.position);
        }
        debug!(city = %city_id, ?reward, "city upgrade applied");

        match reward {
            CityReward::Workshop | CityReward::Park => {
                self.state.refresh_income(player);
            }
            CityReward::Resources => {
                let amount = self.state.rules.constants.resources_reward_stars;
                if let Some(p) = self.state.player_mut(player) {
                    p.stars += amount;
                }
                events.push(Event::StarsGained { player, amount });
            }
            CityReward::PopulationGrowth => {
                let amount = self.state.rules.constants.population_reward;
                self.grow_city(city_id, amount, &mut events);
            }
            CityReward::BorderGrowth => {
                if let Some(center) = position {
                    self.grow_borders(city_id, center, player, &mut events);
                }
            }
            CityReward::Walls | CityReward::Explorer | CityReward::SuperUnit => {}
        }

        if let Some((kind, at)) = spawn {
            let unit = Unit::new(kind, player, at, &self.state.rules).exhausted();
            let unit_id = self.state.units.insert(unit);
            events.push(Event::UnitSpawned {
                unit: unit_id,
                city: city_id,
                kind,
            });
            self.explore(player, &mut events);
        }
        Ok(events)
    }

    // =========================================================================
    // Research
    // =========================================================================

    pub fn research_tech(&mut self, player: PlayerId, key: &str) -> Result<Vec<Event>, GameError> {
        self.ensure_running()?;
        self.ensure_alive(player)?;
        let tech = self
            .state
            .rules
            .tech_id(key)
            .ok_or_else(|| GameError::UnknownTech(key.to_string()))?;
        let cost = check_research(&self.state, player, tech).map_err(|block| match block {
            ResearchBlock::UnknownPlayer => GameError::UnknownPlayer,
            ResearchBlock::UnknownTech => GameError::UnknownTech(key.to_string()),
            ResearchBlock::AlreadyKnown => GameError::TechAlreadyResearched,
            ResearchBlock::MissingPrerequisite(_) => GameError::TechPrerequisiteNotMet,
            ResearchBlock::Unaffordable { cost, stars } => GameError::NotEnoughStars {
                needed: cost,
                available: stars,
            },
        })?;

        if let Some(p) = self.state.player_mut(player) {
            p.stars -= cost;
            p.techs[tech.index()] = true;
        }
        debug!(player = %player, tech = key, cost, "tech researched");
        Ok(vec![Event::TechResearched {
            player,
            tech: key.to_string(),
            cost,
        }])
    }

    // =========================================================================
    // Diplomacy
    // =========================================================================

    pub fn offer_peace(&mut self, from: PlayerId, to: PlayerId) -> Result<Vec<Event>, GameError> {
        self.ensure_running()?;
        self.ensure_pair(from, to)?;
        if let Some(entry) = self.state.diplomacy.get_mut(from, to) {
            entry.peace_offered = true;
        }
        Ok(vec![Event::PeaceOffered { from, to }])
    }

    /// `player` accepts the standing offer from `from`; both sides become friendly.
    pub fn accept_peace(
        &mut self,
        player: PlayerId,
        from: PlayerId,
    ) -> Result<Vec<Event>, GameError> {
        self.ensure_running()?;
        self.ensure_pair(player, from)?;
        let offered = self
            .state
            .diplomacy
            .get(from, player)
            .is_some_and(|e| e.peace_offered);
        if !offered {
            return Err(GameError::NoPeaceOffer);
        }

        let mut events = vec![Event::PeaceAccepted { a: from, b: player }];
        for (a, b) in [(from, player), (player, from)] {
            if let Some(entry) = self.state.diplomacy.get_mut(a, b) {
                entry.peace_offered = false;
            }
            if self.state.diplomacy.set_relation(a, b, Relation::Friendly) {
                events.push(Event::RelationChanged {
                    from: a,
                    to: b,
                    relation: Relation::Friendly,
                });
            }
        }
        Ok(events)
    }

    /// Pays the embassy fee and warms relations one step in both directions.
    pub fn establish_embassy(
        &mut self,
        from: PlayerId,
        with: PlayerId,
    ) -> Result<Vec<Event>, GameError> {
        self.ensure_running()?;
        self.ensure_pair(from, with)?;
        if self
            .state
            .diplomacy
            .get(from, with)
            .is_some_and(|e| e.has_embassy)
        {
            return Err(GameError::EmbassyExists);
        }
        let fee = self.state.rules.constants.embassy_cost;
        let stars = self.state.player(from).map(|p| p.stars).unwrap_or(0);
        if stars < fee {
            return Err(GameError::NotEnoughStars {
                needed: fee,
                available: stars,
            });
        }

        if let Some(p) = self.state.player_mut(from) {
            p.stars -= fee;
        }
        if let Some(entry) = self.state.diplomacy.get_mut(from, with) {
            entry.has_embassy = true;
        }
        let mut events = vec![Event::EmbassyEstablished { from, to: with }];
        for (a, b) in [(from, with), (with, from)] {
            let next = self.state.diplomacy.relation(a, b).toward_friendly();
            if self.state.diplomacy.set_relation(a, b, next) {
                events.push(Event::RelationChanged {
                    from: a,
                    to: b,
                    relation: next,
                });
            }
        }
        Ok(events)
    }

    // =========================================================================
    // Turn lifecycle
    // =========================================================================

    /// Ends the current player's turn and starts the next living player's.
    pub fn end_turn(&mut self) -> Result<Vec<Event>, GameError> {
        self.ensure_running()?;
        let ending = self.state.current_player;
        let mut events = vec![Event::TurnEnded {
            turn: self.state.turn,
            player: ending,
        }];

        for (_, unit) in self.state.units.iter_ordered_mut() {
            if unit.owner == ending {
                unit.was_idle = !unit.moved && !unit.attacked;
            }
        }

        let n = self.state.players.len().max(1);
        let start = ending.index();
        let mut next = ending;
        let mut wrapped = false;
        for step in 1..=n {
            let idx = (start + step) % n;
            if start + step >= n {
                wrapped = true;
            }
            if self.state.players[idx].alive {
                next = PlayerId(idx as u8);
                break;
            }
        }
        if wrapped {
            self.state.turn += 1;
        }
        self.state.current_player = next;

        let income = self.state.refresh_income(next);
        let heal = self.state.rules.constants.heal_amount;
        let stars = match self.state.player_mut(next) {
            Some(p) => {
                p.stars += income;
                p.stars
            }
            None => 0,
        };
        events.push(Event::TurnStarted {
            turn: self.state.turn,
            player: next,
            income,
            stars,
        });
        for (unit_id, unit) in self.state.units.iter_ordered_mut() {
            if unit.owner != next {
                continue;
            }
            if unit.was_idle && unit.heal(heal) > 0 {
                events.push(Event::UnitHealed {
                    unit: unit_id,
                    hp: unit.hp,
                });
            }
            unit.moved = false;
            unit.attacked = false;
            unit.was_idle = false;
        }
        self.explore(next, &mut events);
        debug!(turn = self.state.turn, player = %next, income, stars, "turn started");

        if self.state.turn > self.state.max_turns {
            self.finish_by_score(&mut events);
        }
        Ok(events)
    }

    /// Every player's current score, in player order.
    pub fn scores(&self) -> Vec<PlayerScore> {
        self.state
            .players
            .iter()
            .map(|p| PlayerScore {
                player: p.id,
                total: self.state.compute_score(p.id),
            })
            .collect()
    }

    fn finish_by_score(&mut self, events: &mut Vec<Event>) {
        let scores = self.scores();
        let mut winner: Option<(PlayerId, i64)> = None;
        for s in &scores {
            if !self.state.player(s.player).is_some_and(|p| p.alive) {
                continue;
            }
            if winner.map_or(true, |(_, best)| s.total > best) {
                winner = Some((s.player, s.total));
            }
        }
        self.finish(
            GameOutcome {
                winner: winner.map(|(p, _)| p),
                reason: VictoryReason::Score,
                turn: self.state.turn,
                scores,
            },
            events,
        );
    }

    /// Marks every player without a capital as eliminated; one survivor wins by domination.
    fn check_elimination(&mut self, events: &mut Vec<Event>) {
        let doomed: Vec<PlayerId> = self
            .state
            .alive_players()
            .filter(|&p| self.state.capital_count(p) == 0)
            .collect();
        for player in doomed {
            if let Some(p) = self.state.player_mut(player) {
                p.alive = false;
            }
            info!(player = %player, "player eliminated");
            events.push(Event::PlayerEliminated { player });
        }

        let alive: Vec<PlayerId> = self.state.alive_players().collect();
        if alive.len() <= 1 {
            let outcome = GameOutcome {
                winner: alive.first().copied(),
                reason: VictoryReason::Domination,
                turn: self.state.turn,
                scores: self.scores(),
            };
            self.finish(outcome, events);
        }
    }

    fn finish(&mut self, outcome: GameOutcome, events: &mut Vec<Event>) {
        info!(winner = ?outcome.winner, reason = ?outcome.reason, turn = outcome.turn, "game over");
        self.state.outcome = Some(outcome.clone());
        events.push(Event::GameEnded { outcome });
    }

    // =========================================================================
    // Side effects
    // =========================================================================

    fn discover_ruins(&mut self, at: Coord, player: PlayerId, events: &mut Vec<Event>) {
        let constants = &self.state.rules.constants;
        let (chance, stars) = (constants.ruins_tech_chance, constants.ruins_stars);
        let unknown: Vec<TechId> = (0..self.state.rules.tech_count())
            .map(|i| TechId::new(i as u16))
            .filter(|&t| !self.has_tech(player, t))
            .collect();

        let grant_tech = self.state.rng.gen_bool(chance) && !unknown.is_empty();
        let reward = if grant_tech {
            let tech = unknown[self.state.rng.gen_index(unknown.len())];
            if let Some(p) = self.state.player_mut(player) {
                p.techs[tech.index()] = true;
            }
            let key = self
                .state
                .rules
                .tech(tech)
                .map(|t| t.key.clone())
                .unwrap_or_default();
            RuinsReward::Tech { tech: key }
        } else {
            if let Some(p) = self.state.player_mut(player) {
                p.stars += stars;
            }
            RuinsReward::Stars { amount: stars }
        };
        if let Some(tile) = self.state.map.get_mut(at) {
            tile.terrain = Terrain::Field;
        }
        debug!(%at, player = %player, ?reward, "ruins discovered");
        events.push(Event::RuinsDiscovered { at, player, reward });
    }

    fn capture_village(&mut self, at: Coord, player: PlayerId, events: &mut Vec<Event>) {
        let Some(city) = self.state.found_city(at, player, false) else {
            return;
        };
        info!(%at, player = %player, "village captured");
        events.push(Event::CityFounded {
            city,
            at,
            owner: player,
        });
        self.state.refresh_income(player);
        self.explore(player, events);
    }

    fn capture_city(&mut self, at: Coord, new_owner: PlayerId, events: &mut Vec<Event>) {
        let Some((city_id, city)) = self.state.city_at(at) else {
            return;
        };
        if city.owner == new_owner {
            return;
        }
        let (old_owner, was_capital, radius) = (city.owner, city.is_capital, city.territory_radius);

        let territory: Vec<Coord> = self.state.map.square(at, radius).collect();
        for c in territory {
            if let Some(tile) = self.state.map.get_mut(c) {
                if tile.owner == Some(old_owner) {
                    tile.owner = Some(new_owner);
                }
            }
        }
        if let Some(city) = self.state.cities.get_mut(city_id) {
            city.owner = new_owner;
            city.is_capital = false;
            city.territory_radius = 1;
            city.pending_upgrades.clear();
        }
        if let Some(p) = self.state.player_mut(old_owner) {
            p.cities.retain(|&c| c != at);
        }
        if let Some(p) = self.state.player_mut(new_owner) {
            p.cities.push(at);
        }
        for (_, unit) in self.state.units.iter_ordered_mut() {
            if unit.city_ref == Some(city_id) {
                unit.city_ref = None;
            }
        }
        self.state.refresh_income(old_owner);
        self.state.refresh_income(new_owner);

        info!(%at, old_owner = %old_owner, new_owner = %new_owner, was_capital, "city captured");
        events.push(Event::CityCaptured {
            city: city_id,
            at,
            old_owner,
            new_owner,
            was_capital,
        });
        self.explore(new_owner, events);
        if was_capital {
            self.check_elimination(events);
        }
    }

    fn grow_borders(
        &mut self,
        city_id: CityId,
        center: Coord,
        player: PlayerId,
        events: &mut Vec<Event>,
    ) {
        let tiles: Vec<Coord> = self
            .state
            .map
            .square(center, 2)
            .filter(|&c| {
                self.state
                    .map
                    .get(c)
                    .is_some_and(|t| t.owner.is_none() && !t.terrain.is_unclaimable())
            })
            .collect();
        for &c in &tiles {
            self.state.map.claim(c, player);
        }
        events.push(Event::BordersExpanded {
            city: city_id,
            tiles,
        });
        self.explore(player, events);
    }

    /// Adds population and reports every level-up it causes.
    fn grow_city(&mut self, city_id: CityId, amount: i32, events: &mut Vec<Event>) {
        let max_tier = self.state.rules.constants.max_reward_tier;
        let Some(city) = self.state.cities.get_mut(city_id) else {
            return;
        };
        let level_ups = city.add_population(amount, max_tier);
        let owner = city.owner;
        events.push(Event::PopulationGained {
            city: city_id,
            amount,
            population: city.population,
            max_population: city.max_population,
        });
        for up in &level_ups {
            debug!(city = %city_id, level = up.level, tier = up.reward_tier, "city leveled up");
            events.push(Event::CityLeveledUp {
                city: city_id,
                level: up.level,
                reward_tier: up.reward_tier,
                choices: self.state.rules.reward_choices(up.reward_tier).to_vec(),
            });
        }
        if !level_ups.is_empty() {
            self.state.refresh_income(owner);
        }
    }

    fn record_kill(
        &mut self,
        killer: UnitId,
        winner: PlayerId,
        loser: PlayerId,
        events: &mut Vec<Event>,
    ) {
        if let Some(p) = self.state.player_mut(winner) {
            p.wins += 1;
        }
        if let Some(p) = self.state.player_mut(loser) {
            p.losses += 1;
        }
        let threshold = self.state.rules.constants.veteran_kills;
        if let Some(unit) = self.state.units.get_mut(killer) {
            unit.kills += 1;
            if !unit.veteran && unit.kills >= threshold {
                unit.veteran = true;
                events.push(Event::UnitPromoted { unit: killer });
            }
        }
    }

    fn remove_unit(&mut self, unit_id: UnitId, killer: Option<UnitId>, events: &mut Vec<Event>) {
        if let Some(unit) = self.state.units.remove(unit_id) {
            debug!(unit = %unit_id, owner = %unit.owner, at = %unit.position, "unit died");
            events.push(Event::UnitDied {
                unit: unit_id,
                owner: unit.owner,
                at: unit.position,
                killer,
            });
        }
    }

    fn explore(&mut self, player: PlayerId, events: &mut Vec<Event>) {
        let count = self.state.reveal(player);
        if count > 0 {
            events.push(Event::TilesExplored { player, count });
        }
    }

    // =========================================================================
    // Lookups and guards
    // =========================================================================

    /// Closest owned city by Manhattan distance; ties go to the lower city id.
    pub fn nearest_city(&self, player: PlayerId, at: Coord) -> Option<CityId> {
        self.state
            .cities
            .iter_ordered()
            .filter(|(_, c)| c.owner == player)
            .min_by_key(|(id, c)| (c.position.manhattan(at), *id))
            .map(|(id, _)| id)
    }

    /// City tile if free, otherwise the first free passable neighbour. Neighbouring ruins,
    /// villages and cities are skipped; those only resolve through a move.
    fn spawn_tile(&self, center: Coord) -> Option<Coord> {
        std::iter::once(center).chain(center.neighbors()).find(|&c| {
            let Some(tile) = self.state.map.get(c) else {
                return false;
            };
            let special = matches!(
                tile.terrain,
                Terrain::Ruins | Terrain::Village | Terrain::City
            );
            (c == center || !special)
                && self.state.rules.terrain(tile.terrain).move_cost.is_some()
                && self.state.unit_at(c).is_none()
        })
    }

    fn has_tech(&self, player: PlayerId, tech: TechId) -> bool {
        self.state.player(player).is_some_and(|p| p.has_tech(tech))
    }

    fn ensure_running(&self) -> Result<(), GameError> {
        if self.state.is_over() {
            return Err(GameError::GameOver);
        }
        Ok(())
    }

    fn ensure_alive(&self, player: PlayerId) -> Result<(), GameError> {
        let p = self.state.player(player).ok_or(GameError::UnknownPlayer)?;
        if !p.alive {
            return Err(GameError::PlayerEliminated);
        }
        Ok(())
    }

    fn ensure_pair(&self, actor: PlayerId, other: PlayerId) -> Result<(), GameError> {
        self.ensure_alive(actor)?;
        if actor == other || !self.state.player(other).is_some_and(|p| p.alive) {
            return Err(GameError::InvalidDiplomacyTarget);
        }
        Ok(())
    }

    fn ensure_unit_owner(&self, unit: UnitId, player: PlayerId) -> Result<(), GameError> {
        let unit = self.state.units.get(unit).ok_or(GameError::UnknownUnit)?;
        if unit.owner != player {
            return Err(GameError::NotYourUnit);
        }
        Ok(())
    }

    fn ensure_city_owner(&self, city: CityId, player: PlayerId) -> Result<(), GameError> {
        let city = self.state.cities.get(city).ok_or(GameError::UnknownCity)?;
        if city.owner != player {
            return Err(GameError::NotYourCity);
        }
        Ok(())
    }
}
