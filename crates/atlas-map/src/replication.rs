//! Host-to-observer replication: one full [`Snapshot`] per observer and dataset, then [`Delta`]s for every later
//! authoritative write.

mod codec;
mod message;
mod transport;

pub use codec::{decode_message, encode_message, CodecError};
pub use message::*;
pub use transport::{LocalTransport, Packet};

use crate::{ObserverId, Replicated};

/// Where replication messages go.
pub trait ReplicationChannel {
    /// Returns `false` if the snapshot could not be handed to `observer`, e.g. because it is not connected.
    fn send_full_snapshot(&mut self, observer: ObserverId, snapshot: &Snapshot) -> bool;

    /// Best-effort.
    fn send_delta(&mut self, observer: ObserverId, delta: &Delta);
}

/// Sends `dataset` to `observer` in full if it has not been synced yet. Returns whether a snapshot was delivered.
///
/// An empty dataset is not sent and the observer stays unsynced, so it will get the first non-empty snapshot instead.
/// The same holds when the channel can't deliver the snapshot; the observer is retried on the next call.
pub fn sync_observer<D, C>(dataset: &mut D, observer: ObserverId, channel: &mut C) -> bool
where
    D: Replicated + ?Sized,
    C: ReplicationChannel + ?Sized,
{
    if dataset.sync_state().is_synced_on(observer) || dataset.is_empty() {
        return false;
    }
    let snapshot = dataset.snapshot();
    if !channel.send_full_snapshot(observer, &snapshot) {
        log::debug!(
            "snapshot of atlas {} not delivered to observer {}",
            snapshot.atlas(),
            observer
        );
        return false;
    }
    dataset.sync_state_mut().mark_synced(observer);
    log::info!(
        "synced observer {} with dataset of atlas {}",
        observer,
        snapshot.atlas()
    );
    true
}

/// Drains the dataset's pending deltas and sends each one to every synced observer. Returns the number of deltas drained.
///
/// Observers that are not synced yet get nothing here; their snapshot will already contain these writes.
pub fn broadcast_deltas<D, C>(dataset: &mut D, channel: &mut C) -> usize
where
    D: Replicated + ?Sized,
    C: ReplicationChannel + ?Sized,
{
    let deltas = dataset.take_outbox();
    if deltas.is_empty() {
        return 0;
    }
    for &observer in dataset.sync_state().synced_observers() {
        for delta in deltas.iter() {
            channel.send_delta(observer, delta);
        }
    }
    log::trace!(
        "broadcast {} deltas to {} observers",
        deltas.len(),
        dataset.sync_state().synced_observers().len()
    );
    deltas.len()
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
    use crate::{AtlasDataset, AtlasId, ClassificationId, DimensionId, RegionCoords, Side, Tile};

    #[derive(Default)]
    struct RecordingChannel {
        snapshots: Vec<(ObserverId, Snapshot)>,
        deltas: Vec<(ObserverId, Delta)>,
        offline: Vec<ObserverId>,
    }

    impl ReplicationChannel for RecordingChannel {
        fn send_full_snapshot(&mut self, observer: ObserverId, snapshot: &Snapshot) -> bool {
            if self.offline.contains(&observer) {
                return false;
            }
            self.snapshots.push((observer, snapshot.clone()));
            true
        }

        fn send_delta(&mut self, observer: ObserverId, delta: &Delta) {
            self.deltas.push((observer, delta.clone()));
        }
    }

    fn put(atlas: &mut AtlasDataset, x: i32) {
        atlas.put_tile(DimensionId(0), RegionCoords::new(x, 0), Tile::new(ClassificationId(x)));
    }

    #[test]
    fn empty_dataset_is_not_synced() {
        let mut atlas = AtlasDataset::new(AtlasId(0), Side::Authoritative);
        let mut channel = RecordingChannel::default();

        assert!(!sync_observer(&mut atlas, ObserverId(1), &mut channel));
        assert!(!atlas.sync_state().is_synced_on(ObserverId(1)));
        assert!(channel.snapshots.is_empty());
    }

    #[test]
    fn snapshot_once_then_deltas() {
        let mut atlas = AtlasDataset::new(AtlasId(0), Side::Authoritative);
        let mut channel = RecordingChannel::default();
        put(&mut atlas, 1);

        // Writes before the snapshot are covered by it.
        assert_eq!(broadcast_deltas(&mut atlas, &mut channel), 1);
        assert!(sync_observer(&mut atlas, ObserverId(1), &mut channel));
        assert!(!sync_observer(&mut atlas, ObserverId(1), &mut channel));
        assert_eq!(channel.snapshots.len(), 1);
        assert!(channel.deltas.is_empty());

        put(&mut atlas, 2);
        assert_eq!(broadcast_deltas(&mut atlas, &mut channel), 1);
        assert_eq!(channel.deltas.len(), 1);
        assert_eq!(channel.deltas[0].0, ObserverId(1));

        // A late joiner gets everything in its snapshot and no backlog.
        assert!(sync_observer(&mut atlas, ObserverId(2), &mut channel));
        match &channel.snapshots[1].1 {
            Snapshot::Atlas(s) => assert_eq!(s.num_tiles(), 2),
            other => panic!("unexpected snapshot {:?}", other),
        }
        assert_eq!(broadcast_deltas(&mut atlas, &mut channel), 0);
        assert_eq!(channel.deltas.len(), 1);
    }

    #[test]
    fn undelivered_snapshot_leaves_observer_unsynced() {
        let mut atlas = AtlasDataset::new(AtlasId(0), Side::Authoritative);
        let mut channel = RecordingChannel {
            offline: vec![ObserverId(1)],
            ..Default::default()
        };
        put(&mut atlas, 1);

        assert!(!sync_observer(&mut atlas, ObserverId(1), &mut channel));
        assert!(!atlas.sync_state().is_synced_on(ObserverId(1)));

        channel.offline.clear();
        assert!(sync_observer(&mut atlas, ObserverId(1), &mut channel));
        assert_eq!(channel.snapshots.len(), 1);
    }
}
