use super::{DatasetKey, DatasetKind, DbError};
use crate::AnnotationId;

use atlas_core::{archive, ArchivedBuf};
use rkyv::{AlignedVec, Archive, Deserialize, Serialize};
use sled::Tree;

pub const META_TREE: &str = "datasets";

/// One entry per dataset that exists. Presence is what makes a dataset key taken.
#[derive(Archive, Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[archive(check_bytes)]
#[archive_attr(derive(Debug, Eq, PartialEq))]
pub struct DatasetMeta {
    pub kind: DatasetKind,
    /// Only meaningful for annotation datasets.
    pub next_annotation: AnnotationId,
}

impl DatasetMeta {
    pub fn new(kind: DatasetKind) -> Self {
        Self {
            kind,
            next_annotation: AnnotationId(0),
        }
    }

    pub fn encode(&self) -> Result<AlignedVec, DbError> {
        Ok(archive::<_, 32>(self)?)
    }
}

pub fn open_meta_tree(db: &sled::Db) -> sled::Result<Tree> {
    db.open_tree(META_TREE)
}

pub fn read_meta(tree: &Tree, key: &DatasetKey) -> Result<Option<DatasetMeta>, DbError> {
    let bytes = match tree.get(key.to_string().as_bytes())? {
        Some(bytes) => bytes,
        None => return Ok(None),
    };
    let meta = ArchivedBuf::<DatasetMeta>::from_bytes(&bytes)?.deserialize();
    if meta.kind != key.kind {
        return Err(DbError::Corrupt {
            tree: META_TREE.to_owned(),
            reason: format!("{} is recorded as {:?}", key, meta.kind),
        });
    }
    Ok(Some(meta))
}

/// Every dataset key in the tree, in byte order. Entries with foreign names are skipped.
pub fn read_keys(tree: &Tree) -> Result<Vec<DatasetKey>, DbError> {
    let mut keys = Vec::new();
    for entry in tree.iter() {
        let (name, _) = entry?;
        match std::str::from_utf8(&name).ok().and_then(DatasetKey::parse) {
            Some(key) => keys.push(key),
            None => log::warn!("ignoring unknown entry in {} tree", META_TREE),
        }
    }
    Ok(keys)
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
    use crate::AtlasId;

    #[test]
    fn write_and_reread_meta() {
        let db = sled::Config::default().temporary(true).open().unwrap();
        let tree = open_meta_tree(&db).unwrap();
        let key = DatasetKey::annotations(AtlasId(3));

        assert_eq!(read_meta(&tree, &key).unwrap(), None);

        let meta = DatasetMeta {
            kind: DatasetKind::Annotations,
            next_annotation: AnnotationId(12),
        };
        tree.insert(key.to_string().as_bytes(), meta.encode().unwrap().as_slice())
            .unwrap();

        assert_eq!(read_meta(&tree, &key).unwrap(), Some(meta));
        assert_eq!(read_keys(&tree).unwrap(), vec![key]);
    }

    #[test]
    fn mismatched_kind_is_corrupt() {
        let db = sled::Config::default().temporary(true).open().unwrap();
        let tree = open_meta_tree(&db).unwrap();
        let key = DatasetKey::atlas(AtlasId(3));
        let meta = DatasetMeta::new(DatasetKind::Annotations);
        tree.insert(key.to_string().as_bytes(), meta.encode().unwrap().as_slice())
            .unwrap();

        assert!(matches!(
            read_meta(&tree, &key),
            Err(DbError::Corrupt { .. })
        ));
    }
}
