use crate::{
    decode_message, AnnotationDataset, AtlasDataset, AtlasId, Delta, DimensionId, Message,
    Packet, RegionCoords, Side, Snapshot, Tile,
};

use atlas_core::ahash::RandomState;
use atlas_core::SmallKeyHashMap;
use crossbeam_channel::Receiver;
use std::fmt;
use std::hash::{BuildHasher, Hash, Hasher};

/// An observer's local copy of every dataset it has heard about.
///
/// Datasets are created on first contact. Observer-side datasets never persist or replicate, so applying a message is a
/// plain store update.
#[derive(Debug)]
pub struct Replica {
    atlases: SmallKeyHashMap<AtlasId, AtlasDataset>,
    annotations: SmallKeyHashMap<AtlasId, AnnotationDataset>,
    variants: TileVariants,
}

impl Default for Replica {
    fn default() -> Self {
        Self::new(TileVariants::default())
    }
}

impl Replica {
    pub fn new(variants: TileVariants) -> Self {
        Self {
            atlases: SmallKeyHashMap::default(),
            annotations: SmallKeyHashMap::default(),
            variants,
        }
    }

    pub fn atlas(&self, atlas: AtlasId) -> Option<&AtlasDataset> {
        self.atlases.get(&atlas)
    }

    /// The local copy of `atlas`, created empty if this is the first time it is needed.
    pub fn atlas_mut(&mut self, atlas: AtlasId) -> &mut AtlasDataset {
        self.atlases
            .entry(atlas)
            .or_insert_with(|| AtlasDataset::new(atlas, Side::Observer))
    }

    pub fn annotations(&self, atlas: AtlasId) -> Option<&AnnotationDataset> {
        self.annotations.get(&atlas)
    }

    pub fn annotations_mut(&mut self, atlas: AtlasId) -> &mut AnnotationDataset {
        self.annotations
            .entry(atlas)
            .or_insert_with(|| AnnotationDataset::new(atlas, Side::Observer))
    }

    pub fn variants(&self) -> &TileVariants {
        &self.variants
    }

    /// The cosmetic variant to draw for the tile at `coords`, if one is known.
    pub fn tile_variant(&self, atlas: AtlasId, dimension: DimensionId, coords: RegionCoords) -> Option<u8> {
        let tile = self.atlas(atlas)?.tile(dimension, coords)?;
        Some(self.variants.variant(dimension, coords, tile))
    }

    pub fn apply(&mut self, message: &Message) {
        match message {
            Message::Snapshot(Snapshot::Atlas(s)) => {
                log::debug!("received snapshot of atlas {} with {} tiles", s.atlas, s.num_tiles());
                self.atlas_mut(s.atlas).apply_snapshot(s);
            }
            Message::Snapshot(Snapshot::Annotations(s)) => {
                log::debug!(
                    "received {} annotations of atlas {}",
                    s.annotations.len(),
                    s.atlas
                );
                self.annotations_mut(s.atlas).apply_snapshot(s);
            }
            Message::Delta(Delta::Tile(d)) => self.atlas_mut(d.atlas).apply_delta(d),
            Message::Delta(Delta::Annotation(d)) => self.annotations_mut(d.atlas).apply_delta(d),
        }
    }

    /// Applies every packet waiting in `receiver` without blocking. Undecodable packets are logged and skipped. Returns
    /// the number of messages applied.
    pub fn pump(&mut self, receiver: &Receiver<Packet>) -> usize {
        let mut applied = 0;
        for packet in receiver.try_iter() {
            match decode_message(&packet) {
                Ok(message) => {
                    self.apply(&message);
                    applied += 1;
                }
                Err(e) => log::warn!("dropping undecodable packet of {} bytes: {}", packet.len(), e),
            }
        }
        applied
    }
}

/// Picks one of `count` cosmetic variants per tile, stable for a given location and classification.
///
/// The hasher uses fixed seeds so every observer, and every run, draws the same picture.
#[derive(Clone)]
pub struct TileVariants {
    count: u8,
    hasher: RandomState,
}

impl fmt::Debug for TileVariants {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileVariants")
            .field("count", &self.count)
            .finish()
    }
}

impl Default for TileVariants {
    fn default() -> Self {
        Self::new(4)
    }
}

impl TileVariants {
    /// `count` is clamped to at least one.
    pub fn new(count: u8) -> Self {
        Self {
            count: count.max(1),
            hasher: RandomState::with_seeds(0x5eed, 0xa71a5, 0x7113, 0xc0a57),
        }
    }

    pub fn count(&self) -> u8 {
        self.count
    }

    pub fn variant(&self, dimension: DimensionId, coords: RegionCoords, tile: Tile) -> u8 {
        let mut hasher = self.hasher.build_hasher();
        dimension.hash(&mut hasher);
        coords.hash(&mut hasher);
        tile.hash(&mut hasher);
        (hasher.finish() % u64::from(self.count)) as u8
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
    use crate::{
        broadcast_deltas, sync_observer, ClassificationId, LocalTransport, ObserverId,
    };

    const OVERWORLD: DimensionId = DimensionId(0);

    #[test]
    fn replica_converges_with_host() {
        let mut transport = LocalTransport::default();
        let rx = transport.connect(ObserverId(7));
        let mut host = AtlasDataset::new(AtlasId(3), Side::Authoritative);
        let mut markers = AnnotationDataset::new(AtlasId(3), Side::Authoritative);
        let mut replica = Replica::default();

        for x in 0..10 {
            host.put_tile(OVERWORLD, RegionCoords::new(x, -x), Tile::new(ClassificationId(x % 3)));
        }
        markers.add(OVERWORLD, b"home".to_vec());
        broadcast_deltas(&mut host, &mut transport);
        broadcast_deltas(&mut markers, &mut transport);
        sync_observer(&mut host, ObserverId(7), &mut transport);
        sync_observer(&mut markers, ObserverId(7), &mut transport);

        host.put_tile(OVERWORLD, RegionCoords::new(100, 100), Tile::new(ClassificationId(5)));
        broadcast_deltas(&mut host, &mut transport);

        assert_eq!(replica.pump(&rx), 3);
        let copy = replica.atlas(AtlasId(3)).unwrap();
        assert_eq!(copy.num_tiles(), host.num_tiles());
        for (dimension, store) in host.dimensions() {
            for (coords, tile) in store.iter() {
                assert_eq!(copy.tile(dimension, coords), Some(tile));
            }
        }
        assert_eq!(replica.annotations(AtlasId(3)).unwrap().len(), 1);
        assert!(!copy.is_dirty());
    }

    #[test]
    fn garbage_packets_are_skipped() {
        let (tx, rx) = crossbeam_channel::unbounded::<Packet>();
        tx.send(vec![1, 2, 3].into_boxed_slice()).unwrap();
        let mut replica = Replica::default();
        assert_eq!(replica.pump(&rx), 0);
    }

    #[test]
    fn variants_are_stable_and_in_range() {
        let variants = TileVariants::new(3);
        let tile = Tile::new(ClassificationId(1));
        let v = variants.variant(OVERWORLD, RegionCoords::new(4, 4), tile);
        assert!(v < 3);
        assert_eq!(
            TileVariants::new(3).variant(OVERWORLD, RegionCoords::new(4, 4), tile),
            v
        );
        assert_eq!(TileVariants::new(0).count(), 1);
    }
}
