use crate::AtlasId;

use rkyv::{Archive, Deserialize, Serialize};
use std::fmt;

#[derive(
    Archive, Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
#[archive(check_bytes)]
#[archive_attr(derive(Debug, Eq, PartialEq))]
pub enum DatasetKind {
    Atlas,
    Annotations,
}

impl DatasetKind {
    pub const fn prefix(self) -> &'static str {
        match self {
            DatasetKind::Atlas => "atlas_",
            DatasetKind::Annotations => "markers_",
        }
    }

    /// Suffix of the tree holding the dataset's entries.
    pub(crate) const fn tree_suffix(self) -> &'static str {
        match self {
            DatasetKind::Atlas => "tiles",
            DatasetKind::Annotations => "annotations",
        }
    }
}

/// The persisted name of one dataset. Both datasets of an atlas derive their key from the same [`AtlasId`], so either
/// can be found without the other.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct DatasetKey {
    pub kind: DatasetKind,
    pub atlas: AtlasId,
}

impl DatasetKey {
    pub const fn atlas(atlas: AtlasId) -> Self {
        Self {
            kind: DatasetKind::Atlas,
            atlas,
        }
    }

    pub const fn annotations(atlas: AtlasId) -> Self {
        Self {
            kind: DatasetKind::Annotations,
            atlas,
        }
    }

    /// Inverse of the [`Display`](fmt::Display) rendering.
    pub fn parse(name: &str) -> Option<Self> {
        [DatasetKind::Atlas, DatasetKind::Annotations]
            .into_iter()
            .find_map(|kind| {
                let id = name.strip_prefix(kind.prefix())?.parse().ok()?;
                Some(Self {
                    kind,
                    atlas: AtlasId(id),
                })
            })
    }

    pub(crate) fn tree_name(&self) -> String {
        format!("{}-{}", self, self.kind.tree_suffix())
    }
}

impl fmt::Display for DatasetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.prefix(), self.atlas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_render_and_parse() {
        let atlas = DatasetKey::atlas(AtlasId(17));
        let markers = DatasetKey::annotations(AtlasId(17));

        assert_eq!(atlas.to_string(), "atlas_17");
        assert_eq!(markers.to_string(), "markers_17");
        assert_eq!(markers.tree_name(), "markers_17-annotations");
        assert_eq!(DatasetKey::parse("atlas_17"), Some(atlas));
        assert_eq!(DatasetKey::parse("markers_17"), Some(markers));
        assert_eq!(DatasetKey::parse("atlas_"), None);
        assert_eq!(DatasetKey::parse("world_3"), None);
    }
}
