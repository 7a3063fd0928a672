use tribes_protocol::{CityId, Coord, PlayerId, UnitKind};

use crate::rules::Rules;

#[derive(Clone, Debug, PartialEq)]
pub struct Unit {
    pub kind: UnitKind,
    pub owner: PlayerId,
    pub position: Coord,
    pub hp: i32,
    pub max_hp: i32,
    pub moved: bool,
    pub attacked: bool,
    pub veteran: bool,
    pub fortified: bool,
    /// Set at end of turn for units that neither moved nor attacked; they heal next turn.
    pub was_idle: bool,
    pub kills: u32,
    /// City whose support capacity this unit counts against.
    pub city_ref: Option<CityId>,
}

impl Unit {
    pub fn new(kind: UnitKind, owner: PlayerId, position: Coord, rules: &Rules) -> Self {
        let hp = rules.unit(kind).hp;
        Self {
            kind,
            owner,
            position,
            hp,
            max_hp: hp,
            moved: false,
            attacked: false,
            veteran: false,
            fortified: false,
            was_idle: false,
            kills: 0,
            city_ref: None,
        }
    }

    /// Freshly trained or spawned units cannot act until their owner's next turn.
    pub fn exhausted(mut self) -> Self {
        self.moved = true;
        self.attacked = true;
        self
    }

    pub fn is_alive(&self) -> bool {
        self.hp > 0
    }

    pub fn is_explorer(&self, rules: &Rules) -> bool {
        rules.unit(self.kind).explorer
    }

    pub fn range(&self, rules: &Rules) -> i32 {
        rules.unit(self.kind).range
    }

    pub fn vision(&self, rules: &Rules) -> i32 {
        if self.is_explorer(rules) {
            rules.constants.explorer_vision
        } else {
            rules.constants.unit_vision
        }
    }

    pub fn veteran_multiplier(&self, rules: &Rules) -> f64 {
        if self.veteran {
            rules.constants.veteran_multiplier
        } else {
            1.0
        }
    }

    pub fn heal(&mut self, amount: i32) -> i32 {
        let before = self.hp;
        self.hp = (self.hp + amount).min(self.max_hp);
        self.hp - before
    }
}
