use super::Side;
use crate::{
    AtlasId, AtlasSnapshot, Delta, DimensionId, DimensionTiles, RegionCoords, Replicated, Snapshot,
    SyncState, Tile, TileDelta, TileEntry, TileStore,
};

use atlas_core::SmallKeyHashMap;
use std::collections::BTreeMap;
use std::mem;

/// Everything discovered during one atlas session, across all dimensions.
///
/// On the authoritative side every [`put_tile`](Self::put_tile) does three things: it updates the store, buffers the
/// change for the next save, and queues a [`TileDelta`] for already-synced observers. Observer-side writes only touch the
/// store.
#[derive(Debug)]
pub struct AtlasDataset {
    atlas: AtlasId,
    side: Side,
    dimensions: BTreeMap<DimensionId, TileStore>,
    /// Set by every authoritative write, cleared only by [`take_changes`](Self::take_changes).
    dirty: bool,
    unsaved: SmallKeyHashMap<(DimensionId, RegionCoords), Tile>,
    outbox: Vec<TileDelta>,
    sync: SyncState,
}

impl AtlasDataset {
    pub fn new(atlas: AtlasId, side: Side) -> Self {
        Self {
            atlas,
            side,
            dimensions: BTreeMap::new(),
            dirty: false,
            unsaved: SmallKeyHashMap::default(),
            outbox: Vec::new(),
            sync: SyncState::default(),
        }
    }

    /// Rebuilds a dataset from persisted tiles. The result is clean.
    pub fn from_tiles(
        atlas: AtlasId,
        side: Side,
        tiles: impl IntoIterator<Item = (DimensionId, RegionCoords, Tile)>,
    ) -> Self {
        let mut dataset = Self::new(atlas, side);
        for (dimension, coords, tile) in tiles {
            dataset.dimension_entry(dimension).set_tile(coords, tile);
        }
        dataset
    }

    pub fn atlas(&self) -> AtlasId {
        self.atlas
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn dimension(&self, dimension: DimensionId) -> Option<&TileStore> {
        self.dimensions.get(&dimension)
    }

    pub fn dimensions(&self) -> impl Iterator<Item = (DimensionId, &TileStore)> {
        self.dimensions.iter().map(|(&d, store)| (d, store))
    }

    pub fn tile(&self, dimension: DimensionId, coords: RegionCoords) -> Option<Tile> {
        self.dimension(dimension)?.get_tile(coords)
    }

    pub fn has_tile_at(&self, dimension: DimensionId, coords: RegionCoords) -> bool {
        self.dimension(dimension)
            .map_or(false, |store| store.has_tile_at(coords))
    }

    /// Total number of tiles over all dimensions.
    pub fn num_tiles(&self) -> usize {
        self.dimensions.values().map(TileStore::len).sum()
    }

    /// The single mutation entry point. Returns the tile that was replaced, if any.
    pub fn put_tile(&mut self, dimension: DimensionId, coords: RegionCoords, tile: Tile) -> Option<Tile> {
        let previous = self.dimension_entry(dimension).set_tile(coords, tile);
        if self.side.is_authoritative() {
            self.dirty = true;
            self.unsaved.insert((dimension, coords), tile);
            self.outbox.push(TileDelta {
                atlas: self.atlas,
                dimension,
                coords,
                tile,
            });
        }
        log::trace!(
            "atlas {} dimension {}: put {:?} at {}",
            self.atlas,
            dimension,
            tile.classification,
            coords
        );
        previous
    }

    /// Swaps out the buffered changes and clears the dirty flag in one step. Returns `None` if nothing changed since the
    /// last call.
    ///
    /// Writes made after this call land in a fresh buffer and set the flag again, so they are picked up by the next save
    /// even if they race with the current one.
    pub fn take_changes(&mut self) -> Option<TileChanges> {
        if !mem::replace(&mut self.dirty, false) {
            return None;
        }
        let unsaved = mem::take(&mut self.unsaved);
        let mut tiles: Vec<_> = unsaved
            .into_iter()
            .map(|((dimension, coords), tile)| (dimension, coords, tile))
            .collect();
        tiles.sort_by_key(|&(dimension, coords, _)| (dimension, coords));
        Some(TileChanges { tiles })
    }

    /// Puts back changes whose save failed. Tiles written in the meantime are newer and win.
    pub fn restore_changes(&mut self, changes: TileChanges) {
        if changes.is_empty() {
            return;
        }
        for (dimension, coords, tile) in changes.tiles {
            self.unsaved.entry((dimension, coords)).or_insert(tile);
        }
        self.dirty = true;
    }

    pub fn apply_snapshot(&mut self, snapshot: &AtlasSnapshot) {
        for dimension in snapshot.dimensions.iter() {
            let store = self.dimension_entry(dimension.dimension);
            for entry in dimension.tiles.iter() {
                store.set_tile(entry.coords, entry.tile);
            }
        }
    }

    pub fn apply_delta(&mut self, delta: &TileDelta) {
        self.dimension_entry(delta.dimension)
            .set_tile(delta.coords, delta.tile);
    }

    fn dimension_entry(&mut self, dimension: DimensionId) -> &mut TileStore {
        self.dimensions.entry(dimension).or_default()
    }
}

impl Replicated for AtlasDataset {
    fn sync_state(&self) -> &SyncState {
        &self.sync
    }

    fn sync_state_mut(&mut self) -> &mut SyncState {
        &mut self.sync
    }

    fn is_empty(&self) -> bool {
        self.dimensions.values().all(TileStore::is_empty)
    }

    fn snapshot(&self) -> Snapshot {
        let dimensions = self
            .dimensions
            .iter()
            .filter(|(_, store)| !store.is_empty())
            .map(|(&dimension, store)| {
                let mut tiles: Vec<_> = store
                    .iter()
                    .map(|(coords, tile)| TileEntry { coords, tile })
                    .collect();
                tiles.sort_by_key(|e| e.coords);
                DimensionTiles { dimension, tiles }
            })
            .collect();
        Snapshot::Atlas(AtlasSnapshot {
            atlas: self.atlas,
            dimensions,
        })
    }

    fn take_outbox(&mut self) -> Vec<Delta> {
        mem::take(&mut self.outbox)
            .into_iter()
            .map(Delta::Tile)
            .collect()
    }
}

/// Tiles changed since the last save, sorted by key.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TileChanges {
    pub tiles: Vec<(DimensionId, RegionCoords, Tile)>,
}

impl TileChanges {
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
