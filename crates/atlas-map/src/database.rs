mod annotation_tree;
mod dataset_key;
mod meta_tree;
mod tile_key;
mod tile_tree;

pub use dataset_key::{DatasetKey, DatasetKind};
pub use meta_tree::DatasetMeta;
pub use tile_key::TileDbKey;

use annotation_tree::{open_annotation_tree, read_annotations, write_annotations, EncodedAnnotations};
use meta_tree::{open_meta_tree, read_keys, read_meta};
use tile_tree::{open_tile_tree, read_tiles, write_tiles, EncodedTiles};

use crate::{AnnotationChanges, AnnotationDataset, AtlasDataset, AtlasId, Side, TileChanges};

use atlas_core::ArchiveError;
use sled::transaction::{TransactionError, TransactionResult};
use sled::{Transactional, Tree};
use std::fmt;
use std::path::Path;

/// # Atlas Database
///
/// The persistence collaborator for both kinds of dataset.
///
/// ## Implementation
///
/// All data lives in [`sled::Tree`]s.
///
/// ### Meta Tree
///
/// The `datasets` tree maps every [`DatasetKey`] that exists to its [`DatasetMeta`]. A key is taken iff it has an entry
/// here, even if the dataset has no content yet.
///
/// ### Content Trees
///
/// Each atlas owns a `"{key}-tiles"` tree keyed by [`TileDbKey`], and each annotation dataset owns a
/// `"{key}-annotations"` tree keyed by big-endian [`AnnotationId`](crate::AnnotationId).
///
/// Saves only write what changed since the previous save, in one transaction over the content tree and the meta tree.
#[derive(Clone)]
pub struct AtlasDb {
    db: sled::Db,
    meta_tree: Tree,
}

impl AtlasDb {
    pub fn open(db: sled::Db) -> Result<Self, DbError> {
        let meta_tree = open_meta_tree(&db)?;
        Ok(Self { db, meta_tree })
    }

    pub fn open_path(path: impl AsRef<Path>) -> Result<Self, DbError> {
        Self::open(sled::open(path)?)
    }

    /// A database that is deleted when dropped.
    pub fn open_temporary() -> Result<Self, DbError> {
        Self::open(sled::Config::default().temporary(true).open()?)
    }

    pub fn sled(&self) -> &sled::Db {
        &self.db
    }

    /// Returns an id whose dataset keys are not taken. Ids are never handed out twice, even across restarts.
    pub fn allocate_atlas_id(&self) -> Result<AtlasId, DbError> {
        loop {
            let id = AtlasId(self.db.generate_id()?);
            if !self.contains(&DatasetKey::atlas(id))? && !self.contains(&DatasetKey::annotations(id))? {
                return Ok(id);
            }
        }
    }

    pub fn contains(&self, key: &DatasetKey) -> Result<bool, DbError> {
        Ok(self.meta_tree.contains_key(key.to_string().as_bytes())?)
    }

    pub fn dataset_meta(&self, key: &DatasetKey) -> Result<Option<DatasetMeta>, DbError> {
        read_meta(&self.meta_tree, key)
    }

    pub fn dataset_keys(&self) -> Result<Vec<DatasetKey>, DbError> {
        read_keys(&self.meta_tree)
    }

    /// Registers an empty atlas under `atlas`. Does nothing to content that already exists.
    pub fn create_atlas(&self, atlas: AtlasId) -> Result<AtlasDataset, DbError> {
        let key = DatasetKey::atlas(atlas);
        if self.insert_meta_if_absent(&key, DatasetMeta::new(DatasetKind::Atlas))? {
            log::info!("created dataset {}", key);
        }
        Ok(AtlasDataset::new(atlas, Side::Authoritative))
    }

    pub fn load_atlas(&self, atlas: AtlasId) -> Result<Option<AtlasDataset>, DbError> {
        let key = DatasetKey::atlas(atlas);
        if self.dataset_meta(&key)?.is_none() {
            return Ok(None);
        }
        let tiles = read_tiles(&open_tile_tree(&self.db, &key)?)?;
        log::debug!("loaded {} tiles of {}", tiles.len(), key);
        Ok(Some(AtlasDataset::from_tiles(
            atlas,
            Side::Authoritative,
            tiles,
        )))
    }

    /// Writes previously taken changes. The dataset itself is not touched, so the caller decides what happens to the
    /// changes when this fails.
    pub fn write_atlas_changes(&self, atlas: AtlasId, changes: &TileChanges) -> Result<(), DbError> {
        let key = DatasetKey::atlas(atlas);
        let name = key.to_string();
        let encoded = EncodedTiles::encode(changes)?;
        let meta = self
            .dataset_meta(&key)?
            .unwrap_or_else(|| DatasetMeta::new(DatasetKind::Atlas))
            .encode()?;
        let tile_tree = open_tile_tree(&self.db, &key)?;

        let result: TransactionResult<(), ()> =
            (&tile_tree, &self.meta_tree).transaction(|(tile_txn, meta_txn)| {
                write_tiles(tile_txn, &encoded)?;
                meta_txn.insert(name.as_bytes(), meta.as_slice())?;
                Ok(())
            });
        result?;
        log::trace!("wrote {} tiles to {}", changes.len(), key);
        Ok(())
    }

    /// Saves everything `dataset` buffered since its last save. Returns the number of tiles written.
    pub fn save_atlas(&self, dataset: &mut AtlasDataset) -> Result<usize, DbError> {
        let changes = match dataset.take_changes() {
            Some(changes) => changes,
            None => return Ok(0),
        };
        match self.write_atlas_changes(dataset.atlas(), &changes) {
            Ok(()) => Ok(changes.len()),
            Err(e) => {
                dataset.restore_changes(changes);
                Err(e)
            }
        }
    }

    pub fn create_annotations(&self, atlas: AtlasId) -> Result<AnnotationDataset, DbError> {
        let key = DatasetKey::annotations(atlas);
        if self.insert_meta_if_absent(&key, DatasetMeta::new(DatasetKind::Annotations))? {
            log::info!("created dataset {}", key);
        }
        Ok(AnnotationDataset::new(atlas, Side::Authoritative))
    }

    pub fn load_annotations(&self, atlas: AtlasId) -> Result<Option<AnnotationDataset>, DbError> {
        let key = DatasetKey::annotations(atlas);
        let meta = match self.dataset_meta(&key)? {
            Some(meta) => meta,
            None => return Ok(None),
        };
        let annotations = read_annotations(&open_annotation_tree(&self.db, &key)?)?;
        log::debug!("loaded {} annotations of {}", annotations.len(), key);
        Ok(Some(AnnotationDataset::from_annotations(
            atlas,
            Side::Authoritative,
            meta.next_annotation,
            annotations,
        )))
    }

    pub fn write_annotation_changes(
        &self,
        atlas: AtlasId,
        changes: &AnnotationChanges,
    ) -> Result<(), DbError> {
        let key = DatasetKey::annotations(atlas);
        let name = key.to_string();
        let encoded = EncodedAnnotations::encode(changes)?;
        let meta = DatasetMeta {
            kind: DatasetKind::Annotations,
            next_annotation: changes.next_id,
        }
        .encode()?;
        let annotation_tree = open_annotation_tree(&self.db, &key)?;

        let result: TransactionResult<(), ()> =
            (&annotation_tree, &self.meta_tree).transaction(|(annotation_txn, meta_txn)| {
                write_annotations(annotation_txn, &encoded)?;
                meta_txn.insert(name.as_bytes(), meta.as_slice())?;
                Ok(())
            });
        result?;
        log::trace!("wrote {} annotation changes to {}", changes.changes.len(), key);
        Ok(())
    }

    /// Returns the number of annotation changes written.
    pub fn save_annotations(&self, dataset: &mut AnnotationDataset) -> Result<usize, DbError> {
        let changes = match dataset.take_changes() {
            Some(changes) => changes,
            None => return Ok(0),
        };
        match self.write_annotation_changes(dataset.atlas(), &changes) {
            Ok(()) => Ok(changes.changes.len()),
            Err(e) => {
                dataset.restore_changes(changes);
                Err(e)
            }
        }
    }

    /// Blocks until everything written so far is durable. Returns the number of bytes flushed.
    pub fn flush(&self) -> Result<usize, DbError> {
        Ok(self.db.flush()?)
    }

    /// Returns `false` if the key was already taken.
    fn insert_meta_if_absent(&self, key: &DatasetKey, meta: DatasetMeta) -> Result<bool, DbError> {
        let bytes = meta.encode()?;
        let swapped = self.meta_tree.compare_and_swap(
            key.to_string().as_bytes(),
            None as Option<&[u8]>,
            Some(bytes.as_slice()),
        )?;
        Ok(swapped.is_ok())
    }
}

#[derive(Debug)]
pub enum DbError {
    Sled(sled::Error),
    /// Stored bytes that can't be interpreted.
    Corrupt { tree: String, reason: String },
    Archive(ArchiveError),
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbError::Sled(e) => write!(f, "database error: {}", e),
            DbError::Corrupt { tree, reason } => write!(f, "corrupt tree {}: {}", tree, reason),
            DbError::Archive(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for DbError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DbError::Sled(e) => Some(e),
            DbError::Archive(e) => Some(e),
            DbError::Corrupt { .. } => None,
        }
    }
}

impl From<sled::Error> for DbError {
    fn from(e: sled::Error) -> Self {
        DbError::Sled(e)
    }
}

impl From<ArchiveError> for DbError {
    fn from(e: ArchiveError) -> Self {
        DbError::Archive(e)
    }
}

impl From<TransactionError<()>> for DbError {
    fn from(e: TransactionError<()>) -> Self {
        match e {
            TransactionError::Storage(e) => DbError::Sled(e),
            // None of our transactions abort.
            TransactionError::Abort(()) => DbError::Sled(sled::Error::ReportableBug(
                "transaction aborted".to_owned(),
            )),
        }
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ClassificationId, DimensionId, RegionCoords, Replicated, Tile};

    fn tile(id: i32) -> Tile {
        Tile::new(ClassificationId(id))
    }

    #[test]
    fn missing_datasets_load_as_none() {
        let db = AtlasDb::open_temporary().unwrap();
        assert!(db.load_atlas(AtlasId(5)).unwrap().is_none());
        assert!(db.load_annotations(AtlasId(5)).unwrap().is_none());
    }

    #[test]
    fn allocated_ids_are_fresh() {
        let db = AtlasDb::open_temporary().unwrap();
        let a = db.allocate_atlas_id().unwrap();
        db.create_atlas(a).unwrap();
        let b = db.allocate_atlas_id().unwrap();
        assert_ne!(a, b);
        assert!(db.contains(&DatasetKey::atlas(a)).unwrap());
        assert!(!db.contains(&DatasetKey::atlas(b)).unwrap());
    }

    #[test]
    fn incremental_atlas_saves_round_trip() {
        let sled_db = sled::Config::default().temporary(true).open().unwrap();
        let db = AtlasDb::open(sled_db.clone()).unwrap();
        let id = db.allocate_atlas_id().unwrap();
        let mut atlas = db.create_atlas(id).unwrap();

        atlas.put_tile(DimensionId(0), RegionCoords::new(-4, 2), tile(1));
        atlas.put_tile(DimensionId(-1), RegionCoords::new(0, 0), tile(2));
        assert_eq!(db.save_atlas(&mut atlas).unwrap(), 2);
        assert_eq!(db.save_atlas(&mut atlas).unwrap(), 0);

        atlas.put_tile(DimensionId(0), RegionCoords::new(-4, 2), tile(3));
        assert_eq!(db.save_atlas(&mut atlas).unwrap(), 1);

        // Reopen over the same sled instance.
        let db = AtlasDb::open(sled_db).unwrap();
        let loaded = db.load_atlas(id).unwrap().unwrap();
        assert!(!loaded.is_dirty());
        assert_eq!(loaded.num_tiles(), 2);
        assert_eq!(loaded.tile(DimensionId(0), RegionCoords::new(-4, 2)), Some(tile(3)));
        assert_eq!(loaded.tile(DimensionId(-1), RegionCoords::ZERO), Some(tile(2)));
        assert_eq!(
            db.dataset_keys().unwrap(),
            vec![DatasetKey::atlas(id)]
        );
    }

    #[test]
    fn annotation_saves_keep_removals_and_counter() {
        let db = AtlasDb::open_temporary().unwrap();
        let id = AtlasId(40);
        let mut markers = db.create_annotations(id).unwrap();

        let keep = markers.add(DimensionId(0), b"keep".to_vec());
        let drop = markers.add(DimensionId(0), b"drop".to_vec());
        db.save_annotations(&mut markers).unwrap();
        markers.remove(drop);
        assert_eq!(db.save_annotations(&mut markers).unwrap(), 1);

        let loaded = db.load_annotations(id).unwrap().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.get(keep).unwrap().payload, b"keep");
        assert_eq!(loaded.next_id(), drop.next());
        assert!(!loaded.is_empty());
    }

    #[test]
    fn corrupt_tile_is_reported() {
        let db = AtlasDb::open_temporary().unwrap();
        let id = AtlasId(1);
        db.create_atlas(id).unwrap();
        let tree = open_tile_tree(db.sled(), &DatasetKey::atlas(id)).unwrap();
        tree.insert(&[1, 2, 3][..], &[0u8; 4][..]).unwrap();

        assert!(matches!(db.load_atlas(id), Err(DbError::Corrupt { .. })));
    }
}
