use std::fmt;

use serde::{Deserialize, Serialize};

/// Square-grid tile coordinate. `x` selects the column block, `z` the row within it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coord {
    pub x: i32,
    pub z: i32,
}

impl Coord {
    /// The eight neighbour offsets, in a fixed scan order.
    pub const NEIGHBORS8: [Coord; 8] = [
        Coord { x: -1, z: -1 },
        Coord { x: -1, z: 0 },
        Coord { x: -1, z: 1 },
        Coord { x: 0, z: -1 },
        Coord { x: 0, z: 1 },
        Coord { x: 1, z: -1 },
        Coord { x: 1, z: 0 },
        Coord { x: 1, z: 1 },
    ];

    #[inline]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    pub fn neighbors(self) -> impl Iterator<Item = Coord> {
        Self::NEIGHBORS8.into_iter().map(move |d| self + d)
    }

    #[inline]
    pub fn chebyshev(self, other: Coord) -> i32 {
        (self.x - other.x).abs().max((self.z - other.z).abs())
    }

    #[inline]
    pub fn manhattan(self, other: Coord) -> i32 {
        (self.x - other.x).abs() + (self.z - other.z).abs()
    }

    /// All coordinates with Chebyshev distance `<= radius`, row-major from the low corner.
    /// Bounds are not checked.
    pub fn square(self, radius: i32) -> impl Iterator<Item = Coord> {
        let radius = radius.max(0);
        (-radius..=radius)
            .flat_map(move |dx| (-radius..=radius).map(move |dz| Coord::new(dx, dz)))
            .map(move |d| self + d)
    }

    /// Stable string key (`"x,z"`) used by persisted explored-tile lists.
    pub fn key(self) -> String {
        format!("{},{}", self.x, self.z)
    }

    pub fn parse_key(key: &str) -> Option<Coord> {
        let (x, z) = key.split_once(',')?;
        Some(Coord {
            x: x.trim().parse().ok()?,
            z: z.trim().parse().ok()?,
        })
    }
}

impl std::ops::Add for Coord {
    type Output = Coord;

    fn add(self, other: Coord) -> Coord {
        Coord {
            x: self.x + other.x,
            z: self.z + other.z,
        }
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}
