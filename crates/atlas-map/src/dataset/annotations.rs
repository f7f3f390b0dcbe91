use super::{Change, Side};
use crate::{
    AnnotationChange, AnnotationDelta, AnnotationId, AnnotationSnapshot, AtlasId, Delta,
    DimensionId, Replicated, Snapshot, SyncState,
};

use atlas_core::SmallKeyHashMap;
use rkyv::{Archive, Deserialize, Serialize};
use std::collections::BTreeMap;
use std::mem;

/// A user-placed marker in some dimension. Everything beyond identity and dimension is an opaque payload owned by the
/// front end.
#[derive(Archive, Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[archive(check_bytes)]
pub struct Annotation {
    pub id: AnnotationId,
    pub dimension: DimensionId,
    pub payload: Vec<u8>,
}

/// The annotations that accompany one atlas. Shares its [`AtlasId`] with the atlas dataset.
#[derive(Debug)]
pub struct AnnotationDataset {
    atlas: AtlasId,
    side: Side,
    annotations: BTreeMap<AnnotationId, Annotation>,
    next_id: AnnotationId,
    dirty: bool,
    unsaved: SmallKeyHashMap<AnnotationId, Change<Annotation>>,
    outbox: Vec<AnnotationDelta>,
    sync: SyncState,
}

impl AnnotationDataset {
    pub fn new(atlas: AtlasId, side: Side) -> Self {
        Self::from_annotations(atlas, side, AnnotationId(0), Vec::new())
    }

    /// Rebuilds a dataset from persisted state. The result is clean.
    pub fn from_annotations(
        atlas: AtlasId,
        side: Side,
        next_id: AnnotationId,
        annotations: impl IntoIterator<Item = Annotation>,
    ) -> Self {
        let annotations: BTreeMap<_, _> = annotations.into_iter().map(|a| (a.id, a)).collect();
        // Never hand out an id that is already taken, even if the stored counter lags.
        let next_id = annotations
            .keys()
            .next_back()
            .map_or(next_id, |&last| next_id.max(last.next()));
        Self {
            atlas,
            side,
            annotations,
            next_id,
            dirty: false,
            unsaved: SmallKeyHashMap::default(),
            outbox: Vec::new(),
            sync: SyncState::default(),
        }
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

    pub fn next_id(&self) -> AnnotationId {
        self.next_id
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn get(&self, id: AnnotationId) -> Option<&Annotation> {
        self.annotations.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Annotation> {
        self.annotations.values()
    }

    pub fn in_dimension(&self, dimension: DimensionId) -> impl Iterator<Item = &Annotation> {
        self.annotations
            .values()
            .filter(move |a| a.dimension == dimension)
    }

    /// Creates an annotation with a fresh id.
    pub fn add(&mut self, dimension: DimensionId, payload: Vec<u8>) -> AnnotationId {
        let id = self.next_id;
        self.next_id = id.next();
        self.insert(Annotation {
            id,
            dimension,
            payload,
        });
        id
    }

    /// Inserts or replaces the annotation with `annotation.id`.
    pub fn insert(&mut self, annotation: Annotation) {
        if annotation.id >= self.next_id {
            self.next_id = annotation.id.next();
        }
        if self.side.is_authoritative() {
            self.record(annotation.id, Change::Insert(annotation.clone()));
            self.outbox.push(AnnotationDelta {
                atlas: self.atlas,
                change: AnnotationChange::Added(annotation.clone()),
            });
        }
        self.annotations.insert(annotation.id, annotation);
    }

    pub fn remove(&mut self, id: AnnotationId) -> Option<Annotation> {
        let removed = self.annotations.remove(&id)?;
        if self.side.is_authoritative() {
            self.record(id, Change::Remove);
            self.outbox.push(AnnotationDelta {
                atlas: self.atlas,
                change: AnnotationChange::Removed(id),
            });
        }
        Some(removed)
    }

    /// Same contract as [`AtlasDataset::take_changes`](crate::AtlasDataset::take_changes).
    pub fn take_changes(&mut self) -> Option<AnnotationChanges> {
        if !mem::replace(&mut self.dirty, false) {
            return None;
        }
        let mut changes: Vec<_> = mem::take(&mut self.unsaved).into_iter().collect();
        changes.sort_by_key(|(id, _)| *id);
        Some(AnnotationChanges {
            next_id: self.next_id,
            changes,
        })
    }

    pub fn restore_changes(&mut self, changes: AnnotationChanges) {
        for (id, change) in changes.changes {
            self.unsaved.entry(id).or_insert(change);
        }
        self.dirty = true;
    }

    pub fn apply_snapshot(&mut self, snapshot: &AnnotationSnapshot) {
        for annotation in snapshot.annotations.iter() {
            self.insert(annotation.clone());
        }
    }

    pub fn apply_delta(&mut self, delta: &AnnotationDelta) {
        match &delta.change {
            AnnotationChange::Added(annotation) => self.insert(annotation.clone()),
            AnnotationChange::Removed(id) => {
                self.remove(*id);
            }
        }
    }

    fn record(&mut self, id: AnnotationId, change: Change<Annotation>) {
        self.dirty = true;
        self.unsaved.insert(id, change);
    }
}

impl Replicated for AnnotationDataset {
    fn sync_state(&self) -> &SyncState {
        &self.sync
    }

    fn sync_state_mut(&mut self) -> &mut SyncState {
        &mut self.sync
    }

    fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot::Annotations(AnnotationSnapshot {
            atlas: self.atlas,
            annotations: self.annotations.values().cloned().collect(),
        })
    }

    fn take_outbox(&mut self) -> Vec<Delta> {
        mem::take(&mut self.outbox)
            .into_iter()
            .map(Delta::Annotation)
            .collect()
    }
}

/// Annotation writes since the last save, sorted by id, plus the id counter to persist alongside them.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AnnotationChanges {
    pub next_id: AnnotationId,
    pub changes: Vec<(AnnotationId, Change<Annotation>)>,
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
