//! The two kinds of dataset kept per atlas: discovered [`Tile`](crate::Tile)s and [`Annotation`]s.
//!
//! Both track unsaved changes in a buffer that is swapped out as a whole when saving, so that a write racing with a save
//! is never lost. Both also queue a delta per authoritative write for the replication layer.

mod annotations;
mod atlas;

pub use annotations::{Annotation, AnnotationChanges, AnnotationDataset};
pub use atlas::{AtlasDataset, TileChanges};

/// Which side of replication a dataset lives on.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Side {
    /// The single source of truth. Writes mark the dataset dirty and are replicated.
    Authoritative,
    /// A local copy fed by snapshots and deltas. Writes are never persisted or replicated.
    Observer,
}

impl Side {
    pub fn is_authoritative(self) -> bool {
        matches!(self, Side::Authoritative)
    }
}

/// A pending write for some key.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Change<T> {
    Insert(T),
    Remove,
}
