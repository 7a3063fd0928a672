use tribes_protocol::{Coord, PlayerId};

#[derive(Clone, Debug, PartialEq)]
pub struct City {
    pub owner: PlayerId,
    pub position: Coord,
    pub level: u8,
    pub population: i32,
    /// Always `level + 1`.
    pub max_population: i32,
    pub is_capital: bool,
    pub walls: bool,
    pub workshop: bool,
    pub park: bool,
    pub territory_radius: i32,
    /// Reward tiers still waiting for a choice, oldest first.
    pub pending_upgrades: Vec<u8>,
}

/// One threshold crossed while adding population.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LevelUp {
    pub level: u8,
    pub reward_tier: u8,
}

impl City {
    pub fn new(position: Coord, owner: PlayerId, is_capital: bool) -> Self {
        Self {
            owner,
            position,
            level: 1,
            population: 0,
            max_population: 2,
            is_capital,
            walls: false,
            workshop: false,
            park: false,
            territory_radius: 1,
            pending_upgrades: Vec::new(),
        }
    }

    /// Star income: level, plus one each for workshop, park and capital status.
    pub fn income(&self) -> i32 {
        i32::from(self.level)
            + i32::from(self.workshop)
            + i32::from(self.park)
            + i32::from(self.is_capital)
    }

    /// Units this city can support at once.
    pub fn unit_capacity(&self) -> usize {
        usize::from(self.level) + 1
    }

    /// Adds population and resolves every level-up it triggers. Overflow carries over, so
    /// `population < max_population` holds on return.
    pub fn add_population(&mut self, amount: i32, max_reward_tier: u8) -> Vec<LevelUp> {
        self.population += amount.max(0);
        let mut level_ups = Vec::new();
        while self.population >= self.max_population {
            self.population -= self.max_population;
            self.level = self.level.saturating_add(1);
            self.max_population = i32::from(self.level) + 1;
            let reward_tier = self.level.min(max_reward_tier);
            self.pending_upgrades.push(reward_tier);
            level_ups.push(LevelUp {
                level: self.level,
                reward_tier,
            });
        }
        level_ups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capital_income() {
        let mut city = City::new(Coord::new(2, 2), PlayerId(0), true);
        assert_eq!(city.income(), 2);
        city.workshop = true;
        city.park = true;
        assert_eq!(city.income(), 4);
    }

    #[test]
    fn single_level_up() {
        let mut city = City::new(Coord::new(0, 0), PlayerId(0), false);
        assert!(city.add_population(1, 5).is_empty());
        let ups = city.add_population(1, 5);
        assert_eq!(
            ups,
            vec![LevelUp {
                level: 2,
                reward_tier: 2
            }]
        );
        assert_eq!(city.population, 0);
        assert_eq!(city.max_population, 3);
        assert_eq!(city.pending_upgrades, vec![2]);
    }

    #[test]
    fn cascade_crosses_several_thresholds() {
        let mut city = City::new(Coord::new(0, 0), PlayerId(0), false);
        // 2 -> level 2, 3 -> level 3, 1 left over of 4.
        let ups = city.add_population(6, 5);
        assert_eq!(ups.len(), 2);
        assert_eq!(city.level, 3);
        assert_eq!(city.population, 1);
        assert_eq!(city.max_population, 4);
        assert_eq!(city.pending_upgrades, vec![2, 3]);
    }

    #[test]
    fn reward_tier_is_capped() {
        let mut city = City::new(Coord::new(0, 0), PlayerId(0), false);
        city.level = 5;
        city.max_population = 6;
        let ups = city.add_population(6, 5);
        assert_eq!(ups[0].level, 6);
        assert_eq!(ups[0].reward_tier, 5);
    }
}
