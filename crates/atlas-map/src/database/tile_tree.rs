use super::{DatasetKey, DbError, TileDbKey};
use crate::{DimensionId, RegionCoords, Tile, TileChanges};

use atlas_core::{archive, ArchiveError, ArchivedBuf};
use rkyv::AlignedVec;
use sled::transaction::{TransactionalTree, UnabortableTransactionError};
use sled::Tree;

pub fn open_tile_tree(db: &sled::Db, key: &DatasetKey) -> sled::Result<Tree> {
    db.open_tree(key.tree_name())
}

/// [`TileChanges`] serialized ahead of a transaction, so a retried transaction does not serialize again.
#[derive(Clone, Debug, Default)]
pub struct EncodedTiles {
    pub tiles: Vec<([u8; 12], AlignedVec)>,
}

impl EncodedTiles {
    /// Keys keep the sorted order of `changes`, which is also sled's byte order.
    pub fn encode(changes: &TileChanges) -> Result<Self, ArchiveError> {
        let tiles = changes
            .tiles
            .iter()
            .map(|&(dimension, coords, tile)| {
                let key = TileDbKey::new(dimension, coords).into_sled_key();
                Ok((key, archive::<_, 16>(&tile)?))
            })
            .collect::<Result<_, ArchiveError>>()?;
        Ok(Self { tiles })
    }
}

pub fn write_tiles(
    txn: &TransactionalTree,
    tiles: &EncodedTiles,
) -> Result<(), UnabortableTransactionError> {
    for (key, value) in tiles.tiles.iter() {
        txn.insert(&key[..], value.as_slice())?;
    }
    Ok(())
}

pub fn read_tiles(
    tree: &Tree,
) -> Result<Vec<(DimensionId, RegionCoords, Tile)>, DbError> {
    let mut tiles = Vec::with_capacity(tree.len());
    for entry in tree.iter() {
        let (key_bytes, value) = entry?;
        let key = TileDbKey::from_sled_key(&key_bytes).ok_or_else(|| DbError::Corrupt {
            tree: String::from_utf8_lossy(&tree.name()).into_owned(),
            reason: format!("tile key of {} bytes", key_bytes.len()),
        })?;
        let tile = ArchivedBuf::<Tile>::from_bytes(&value)?.deserialize();
        tiles.push((key.dimension, key.coords, tile));
    }
    Ok(tiles)
}
