use crate::{RegionCoords, Tile};

use atlas_core::SmallKeyHashMap;

/// A sparse grid of [`Tile`]s for a single dimension.
///
/// Keys are never removed; discovery is monotonic. The store knows nothing about dirtiness or observers, that is the
/// owning dataset's job.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TileStore {
    tiles: SmallKeyHashMap<RegionCoords, Tile>,
}

impl TileStore {
    /// True iff a tile has ever been recorded at `coords`.
    #[inline]
    pub fn has_tile_at(&self, coords: RegionCoords) -> bool {
        self.tiles.contains_key(&coords)
    }

    #[inline]
    pub fn get_tile(&self, coords: RegionCoords) -> Option<Tile> {
        self.tiles.get(&coords).copied()
    }

    /// Unconditionally overwrites the tile at `coords`. Returns the previous tile.
    #[inline]
    pub fn set_tile(&mut self, coords: RegionCoords, tile: Tile) -> Option<Tile> {
        self.tiles.insert(coords, tile)
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (RegionCoords, Tile)> + '_ {
        self.tiles.iter().map(|(&coords, &tile)| (coords, tile))
    }
}

impl FromIterator<(RegionCoords, Tile)> for TileStore {
    fn from_iter<I: IntoIterator<Item = (RegionCoords, Tile)>>(iter: I) -> Self {
        Self {
            tiles: iter.into_iter().collect(),
        }
    }
}
