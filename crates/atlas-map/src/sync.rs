use crate::{Delta, ObserverId, Snapshot};

use smallvec::SmallVec;

/// The set of observers that already received a full snapshot of a dataset.
///
/// Per observer the only transition is `never-synced -> synced`. There is no way back; detaching observers is the
/// transport's concern.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SyncState {
    synced: SmallVec<[ObserverId; 4]>,
}

impl SyncState {
    pub fn is_synced_on(&self, observer: ObserverId) -> bool {
        self.synced.contains(&observer)
    }

    /// Returns `false` if `observer` was already synced.
    pub fn mark_synced(&mut self, observer: ObserverId) -> bool {
        if self.is_synced_on(observer) {
            return false;
        }
        self.synced.push(observer);
        true
    }

    pub fn synced_observers(&self) -> &[ObserverId] {
        &self.synced
    }
}

/// A dataset whose content is replicated to observers with one full snapshot followed by deltas.
pub trait Replicated {
    fn sync_state(&self) -> &SyncState;

    fn sync_state_mut(&mut self) -> &mut SyncState;

    fn is_empty(&self) -> bool;

    fn snapshot(&self) -> Snapshot;

    /// Drains the deltas produced by authoritative writes since the last call.
    fn take_outbox(&mut self) -> Vec<Delta>;
}
