use tribes_protocol::{Coord, PlayerId, Snapshot};

use crate::state::GameState;

impl GameState {
    /// Fog-of-war filtered snapshot for `player`.
    ///
    /// The result is a view, not a save: it cannot be fed back to
    /// [`GameState::from_snapshot`]. It keeps:
    /// - tiles the player has explored, with owner and resource only where currently visible
    /// - the player's own units and cities, plus enemy ones on visible tiles
    /// - the player's own economy; other players keep only id, alive flag and city count
    /// - diplomacy entries involving the player
    ///
    /// The RNG state is always zeroed.
    pub fn player_view(&self, player: PlayerId) -> Snapshot {
        let visible = self.compute_visibility(player);
        let mut snap = self.snapshot();

        snap.tiles
            .retain(|t| self.is_explored(player, Coord::new(t.x, t.z)));
        for t in snap.tiles.iter_mut() {
            if !visible.contains(&Coord::new(t.x, t.z)) {
                t.owner = None;
                t.resource = None;
            }
        }

        snap.units
            .retain(|u| u.owner == player || visible.contains(&u.pos));
        snap.cities
            .retain(|c| c.owner == player || visible.contains(&c.pos));

        for p in snap.players.iter_mut() {
            if p.id == player {
                continue;
            }
            p.stars = 0;
            p.stars_per_turn = 0;
            p.techs.clear();
            p.wins = 0;
            p.losses = 0;
        }

        for (i, explored) in snap.explored.iter_mut().enumerate() {
            if i != player.index() {
                explored.clear();
            }
        }
        snap.diplomacy
            .retain(|r| r.from == player || r.to == player);
        snap.rng_state = [0; 32];
        snap
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{load_rules, RulesSource};
    use crate::unit::Unit;
    use tribes_protocol::{Resource, UnitKind};

    fn state() -> GameState {
        GameState::new_for_tests(9, 2, load_rules(RulesSource::Embedded).unwrap(), 1)
    }

    #[test]
    fn hides_unexplored_tiles_and_distant_enemies() {
        let mut s = state();
        s.found_city(Coord::new(1, 1), PlayerId(0), true);
        s.found_city(Coord::new(7, 7), PlayerId(1), true);
        let near = Unit::new(UnitKind::Warrior, PlayerId(1), Coord::new(3, 3), &s.rules);
        let far = Unit::new(UnitKind::Warrior, PlayerId(1), Coord::new(6, 6), &s.rules);
        s.units.insert(near);
        s.units.insert(far);
        s.players[1].stars = 40;
        s.reveal(PlayerId(0));

        let view = s.player_view(PlayerId(0));
        assert_eq!(view.tiles.len(), s.explored_count(PlayerId(0)));
        assert!(view.tiles.iter().all(|t| t.x <= 3 && t.z <= 3));
        assert_eq!(view.units.len(), 1);
        assert_eq!(view.units[0].pos, Coord::new(3, 3));
        assert_eq!(view.cities.len(), 1);
        assert_eq!(view.players[1].stars, 0);
        assert!(view.explored[1].is_empty());
        assert_eq!(view.rng_state, [0; 32]);
    }

    #[test]
    fn explored_but_not_visible_tiles_lose_details() {
        let mut s = state();
        let id = s.units.insert(Unit::new(
            UnitKind::Warrior,
            PlayerId(0),
            Coord::new(4, 4),
            &s.rules,
        ));
        s.map.get_mut(Coord::new(5, 5)).unwrap().resource = Some(Resource::Fruit);
        s.reveal(PlayerId(0));
        s.units.get_mut(id).unwrap().position = Coord::new(1, 1);

        let view = s.player_view(PlayerId(0));
        let tile = view.tiles.iter().find(|t| t.x == 5 && t.z == 5).unwrap();
        assert_eq!(tile.resource, None);

        s.units.get_mut(id).unwrap().position = Coord::new(4, 4);
        let view = s.player_view(PlayerId(0));
        let tile = view.tiles.iter().find(|t| t.x == 5 && t.z == 5).unwrap();
        assert_eq!(tile.resource, Some(Resource::Fruit));
    }
}
