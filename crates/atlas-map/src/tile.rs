use atlas_core::static_assertions::const_assert_eq;
use rkyv::{Archive, Deserialize, Serialize};
use std::fmt;
use std::mem;

/// The category a region was classified as (for example a biome id).
#[derive(
    Archive, Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
#[archive(check_bytes)]
#[archive_attr(derive(Debug, Eq, PartialEq))]
pub struct ClassificationId(pub i32);

impl fmt::Display for ClassificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for ClassificationId {
    fn from(v: i32) -> Self {
        Self(v)
    }
}

/// The recorded classification of one region.
///
/// Tiles are replaced wholesale, never edited in place. The cosmetic variant a renderer draws is derived from the tile
/// and its location by [`TileVariants`](crate::TileVariants), so it is not part of the stored value and two tiles are
/// equal iff their classifications are.
#[derive(Archive, Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[archive(check_bytes)]
#[archive_attr(derive(Debug, Eq, PartialEq))]
pub struct Tile {
    pub classification: ClassificationId,
}

const_assert_eq!(mem::size_of::<Tile>(), 4);

impl Tile {
    pub const fn new(classification: ClassificationId) -> Self {
        Self { classification }
    }
}

impl From<ClassificationId> for Tile {
    fn from(classification: ClassificationId) -> Self {
        Self::new(classification)
    }
}
