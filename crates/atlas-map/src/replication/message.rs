use crate::{Annotation, AnnotationId, AtlasId, DimensionId, RegionCoords, Tile};

use rkyv::{Archive, Deserialize, Serialize};

#[derive(Archive, Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[archive(check_bytes)]
pub struct TileEntry {
    pub coords: RegionCoords,
    pub tile: Tile,
}

/// All tiles of one dimension, sorted by coordinates.
#[derive(Archive, Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[archive(check_bytes)]
pub struct DimensionTiles {
    pub dimension: DimensionId,
    pub tiles: Vec<TileEntry>,
}

#[derive(Archive, Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[archive(check_bytes)]
pub struct AtlasSnapshot {
    pub atlas: AtlasId,
    pub dimensions: Vec<DimensionTiles>,
}

impl AtlasSnapshot {
    pub fn num_tiles(&self) -> usize {
        self.dimensions.iter().map(|d| d.tiles.len()).sum()
    }
}

#[derive(Archive, Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[archive(check_bytes)]
pub struct AnnotationSnapshot {
    pub atlas: AtlasId,
    pub annotations: Vec<Annotation>,
}

#[derive(Archive, Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[archive(check_bytes)]
pub struct TileDelta {
    pub atlas: AtlasId,
    pub dimension: DimensionId,
    pub coords: RegionCoords,
    pub tile: Tile,
}

#[derive(Archive, Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[archive(check_bytes)]
pub enum AnnotationChange {
    Added(Annotation),
    Removed(AnnotationId),
}

#[derive(Archive, Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[archive(check_bytes)]
pub struct AnnotationDelta {
    pub atlas: AtlasId,
    pub change: AnnotationChange,
}

/// The whole content of a dataset, sent once per observer.
#[derive(Archive, Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[archive(check_bytes)]
pub enum Snapshot {
    Atlas(AtlasSnapshot),
    Annotations(AnnotationSnapshot),
}

impl Snapshot {
    pub fn atlas(&self) -> AtlasId {
        match self {
            Snapshot::Atlas(s) => s.atlas,
            Snapshot::Annotations(s) => s.atlas,
        }
    }
}

/// A single write, sent to observers that are already synced.
#[derive(Archive, Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[archive(check_bytes)]
pub enum Delta {
    Tile(TileDelta),
    Annotation(AnnotationDelta),
}

#[derive(Archive, Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[archive(check_bytes)]
pub enum Message {
    Snapshot(Snapshot),
    Delta(Delta),
}
