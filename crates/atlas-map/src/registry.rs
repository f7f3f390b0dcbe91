use crate::{AnnotationDataset, AtlasDataset, AtlasDb, AtlasId, DbError};

use atlas_core::SmallKeyHashMap;
use parking_lot::RwLock;
use std::sync::Arc;

pub type AtlasHandle = Arc<RwLock<AtlasDataset>>;
pub type AnnotationHandle = Arc<RwLock<AnnotationDataset>>;

/// Every dataset a session has touched, with typed lookup by kind.
///
/// Datasets are loaded on first use and then kept in memory. Handles can be cloned out to other threads; a save holds a
/// dataset's write lock only long enough to take its changes, never during I/O.
pub struct DatasetRegistry {
    db: AtlasDb,
    atlases: SmallKeyHashMap<AtlasId, AtlasHandle>,
    annotations: SmallKeyHashMap<AtlasId, AnnotationHandle>,
}

impl DatasetRegistry {
    pub fn new(db: AtlasDb) -> Self {
        Self {
            db,
            atlases: SmallKeyHashMap::default(),
            annotations: SmallKeyHashMap::default(),
        }
    }

    pub fn db(&self) -> &AtlasDb {
        &self.db
    }

    /// Allocates a fresh id and creates an empty, persisted atlas for it.
    pub fn create_atlas(&mut self) -> Result<(AtlasId, AtlasHandle), DbError> {
        let id = self.db.allocate_atlas_id()?;
        let handle = Arc::new(RwLock::new(self.db.create_atlas(id)?));
        self.atlases.insert(id, handle.clone());
        Ok((id, handle))
    }

    /// The atlas with `id`, from memory or from the database. `None` if it was never created.
    pub fn atlas(&mut self, id: AtlasId) -> Result<Option<AtlasHandle>, DbError> {
        if let Some(handle) = self.atlases.get(&id) {
            return Ok(Some(handle.clone()));
        }
        Ok(self.db.load_atlas(id)?.map(|dataset| {
            let handle = Arc::new(RwLock::new(dataset));
            self.atlases.insert(id, handle.clone());
            handle
        }))
    }

    /// Like [`atlas`](Self::atlas), but an unknown id is replaced by a freshly created atlas. The returned id is the one
    /// to use from now on.
    pub fn atlas_or_allocate(&mut self, id: AtlasId) -> Result<(AtlasId, AtlasHandle), DbError> {
        if let Some(handle) = self.atlas(id)? {
            return Ok((id, handle));
        }
        let (new_id, handle) = self.create_atlas()?;
        log::info!("atlas {} does not exist, reassigned to {}", id, new_id);
        Ok((new_id, handle))
    }

    /// The annotations of atlas `id`, from memory or from the database. Never creates them.
    pub fn annotations(&mut self, id: AtlasId) -> Result<Option<AnnotationHandle>, DbError> {
        if let Some(handle) = self.annotations.get(&id) {
            return Ok(Some(handle.clone()));
        }
        Ok(self.db.load_annotations(id)?.map(|dataset| {
            let handle = Arc::new(RwLock::new(dataset));
            self.annotations.insert(id, handle.clone());
            handle
        }))
    }

    /// Annotations are created lazily, possibly long after their atlas.
    pub fn annotations_or_create(&mut self, id: AtlasId) -> Result<AnnotationHandle, DbError> {
        if let Some(handle) = self.annotations(id)? {
            return Ok(handle);
        }
        let handle = Arc::new(RwLock::new(self.db.create_annotations(id)?));
        self.annotations.insert(id, handle.clone());
        Ok(handle)
    }

    pub fn loaded_atlases(&self) -> impl Iterator<Item = (AtlasId, &AtlasHandle)> {
        self.atlases.iter().map(|(&id, handle)| (id, handle))
    }

    pub fn loaded_annotations(&self) -> impl Iterator<Item = (AtlasId, &AnnotationHandle)> {
        self.annotations.iter().map(|(&id, handle)| (id, handle))
    }

    /// Saves every dirty dataset, then flushes.
    ///
    /// A dataset that fails to save gets its changes back and is retried on the next call; the other datasets are still
    /// saved. Only a failed flush is returned as an error.
    pub fn save_dirty(&self) -> Result<SaveReport, DbError> {
        let mut report = SaveReport::default();

        for (&id, handle) in self.atlases.iter() {
            let changes = match handle.write().take_changes() {
                Some(changes) => changes,
                None => continue,
            };
            match self.db.write_atlas_changes(id, &changes) {
                Ok(()) => {
                    report.atlases_saved += 1;
                    report.tiles_written += changes.len();
                }
                Err(e) => {
                    log::warn!("failed to save atlas {}: {}", id, e);
                    handle.write().restore_changes(changes);
                    report.failures += 1;
                }
            }
        }

        for (&id, handle) in self.annotations.iter() {
            let changes = match handle.write().take_changes() {
                Some(changes) => changes,
                None => continue,
            };
            match self.db.write_annotation_changes(id, &changes) {
                Ok(()) => {
                    report.annotation_sets_saved += 1;
                    report.annotation_changes_written += changes.changes.len();
                }
                Err(e) => {
                    log::warn!("failed to save annotations of atlas {}: {}", id, e);
                    handle.write().restore_changes(changes);
                    report.failures += 1;
                }
            }
        }

        if report.datasets_saved() > 0 {
            self.db.flush()?;
        }
        log::debug!("{:?}", report);
        Ok(report)
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SaveReport {
    pub atlases_saved: usize,
    pub tiles_written: usize,
    pub annotation_sets_saved: usize,
    pub annotation_changes_written: usize,
    pub failures: usize,
}

impl SaveReport {
    pub fn datasets_saved(&self) -> usize {
        self.atlases_saved + self.annotation_sets_saved
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
