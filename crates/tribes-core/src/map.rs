use tribes_protocol::{BuildingId, CityId, Coord, PlayerId, Resource, Terrain};

#[derive(Clone, Debug, PartialEq)]
pub struct Tile {
    pub terrain: Terrain,
    /// Cleared when a building is placed; a tile never carries both.
    pub resource: Option<Resource>,
    pub building: Option<BuildingId>,
    /// Always `None` on water and ocean.
    pub owner: Option<PlayerId>,
    pub city: Option<CityId>,
}

impl Tile {
    pub fn new(terrain: Terrain) -> Self {
        Self {
            terrain,
            resource: None,
            building: None,
            owner: None,
            city: None,
        }
    }
}

/// Square grid stored flat, indexed by `x * size + z`.
#[derive(Clone, Debug, PartialEq)]
pub struct GameMap {
    size: u32,
    tiles: Vec<Tile>,
}

impl GameMap {
    pub fn new(size: u32, default_terrain: Terrain) -> Self {
        Self {
            size,
            tiles: vec![Tile::new(default_terrain); (size as usize) * (size as usize)],
        }
    }

    /// Builds a map from a complete tile list in index order. Returns `None` on a length mismatch.
    pub fn from_tiles(size: u32, tiles: Vec<Tile>) -> Option<Self> {
        if tiles.len() != (size as usize) * (size as usize) {
            return None;
        }
        Some(Self { size, tiles })
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn in_bounds(&self, at: Coord) -> bool {
        let n = self.size as i32;
        at.x >= 0 && at.z >= 0 && at.x < n && at.z < n
    }

    pub fn index_of(&self, at: Coord) -> Option<usize> {
        if !self.in_bounds(at) {
            return None;
        }
        Some(at.x as usize * self.size as usize + at.z as usize)
    }

    pub fn coord_at(&self, index: usize) -> Coord {
        let n = self.size.max(1) as usize;
        Coord::new((index / n) as i32, (index % n) as i32)
    }

    pub fn get(&self, at: Coord) -> Option<&Tile> {
        self.index_of(at).map(|i| &self.tiles[i])
    }

    pub fn get_mut(&mut self, at: Coord) -> Option<&mut Tile> {
        self.index_of(at).map(move |i| &mut self.tiles[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (Coord, &Tile)> {
        self.tiles
            .iter()
            .enumerate()
            .map(|(i, t)| (self.coord_at(i), t))
    }

    /// In-bounds coordinates within Chebyshev `radius` of `center`.
    pub fn square(&self, center: Coord, radius: i32) -> impl Iterator<Item = Coord> + '_ {
        center.square(radius).filter(|c| self.in_bounds(*c))
    }

    /// Claims `at` for `owner` unless the terrain can never be owned. Returns whether it changed.
    pub fn claim(&mut self, at: Coord, owner: PlayerId) -> bool {
        match self.get_mut(at) {
            Some(tile) if !tile.terrain.is_unclaimable() && tile.owner != Some(owner) => {
                tile.owner = Some(owner);
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_is_column_major_by_x() {
        let map = GameMap::new(4, Terrain::Field);
        assert_eq!(map.index_of(Coord::new(1, 2)), Some(6));
        assert_eq!(map.coord_at(6), Coord::new(1, 2));
        assert_eq!(map.index_of(Coord::new(4, 0)), None);
        assert_eq!(map.index_of(Coord::new(0, -1)), None);
    }

    #[test]
    fn water_is_never_claimed() {
        let mut map = GameMap::new(3, Terrain::Field);
        map.get_mut(Coord::new(0, 0)).unwrap().terrain = Terrain::Water;
        assert!(!map.claim(Coord::new(0, 0), PlayerId(0)));
        assert!(map.claim(Coord::new(1, 1), PlayerId(0)));
        assert!(!map.claim(Coord::new(1, 1), PlayerId(0)));
        assert_eq!(map.get(Coord::new(0, 0)).unwrap().owner, None);
    }

    #[test]
    fn square_is_clipped_to_bounds() {
        let map = GameMap::new(5, Terrain::Field);
        assert_eq!(map.square(Coord::new(0, 0), 1).count(), 4);
        assert_eq!(map.square(Coord::new(2, 2), 2).count(), 25);
    }
}
