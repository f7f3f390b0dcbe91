use super::{DatasetKey, DbError};
use crate::{Annotation, AnnotationChanges, AnnotationId, Change};

use atlas_core::{archive, ArchiveError, ArchivedBuf};
use rkyv::AlignedVec;
use sled::transaction::{TransactionalTree, UnabortableTransactionError};
use sled::Tree;

/// Big-endian so the tree iterates in id order.
fn annotation_key(id: AnnotationId) -> [u8; 8] {
    id.0.to_be_bytes()
}

pub fn open_annotation_tree(db: &sled::Db, key: &DatasetKey) -> sled::Result<Tree> {
    db.open_tree(key.tree_name())
}

/// [`AnnotationChanges`] serialized ahead of a transaction.
#[derive(Clone, Debug, Default)]
pub struct EncodedAnnotations {
    pub changes: Vec<([u8; 8], Change<AlignedVec>)>,
}

impl EncodedAnnotations {
    pub fn encode(changes: &AnnotationChanges) -> Result<Self, ArchiveError> {
        let changes = changes
            .changes
            .iter()
            .map(|(id, change)| {
                let value = match change {
                    Change::Insert(annotation) => Change::Insert(archive::<_, 256>(annotation)?),
                    Change::Remove => Change::Remove,
                };
                Ok((annotation_key(*id), value))
            })
            .collect::<Result<_, ArchiveError>>()?;
        Ok(Self { changes })
    }
}

pub fn write_annotations(
    txn: &TransactionalTree,
    annotations: &EncodedAnnotations,
) -> Result<(), UnabortableTransactionError> {
    for (key, change) in annotations.changes.iter() {
        match change {
            Change::Insert(value) => {
                txn.insert(&key[..], value.as_slice())?;
            }
            Change::Remove => {
                txn.remove(&key[..])?;
            }
        }
    }
    Ok(())
}

pub fn read_annotations(tree: &Tree) -> Result<Vec<Annotation>, DbError> {
    let mut annotations = Vec::with_capacity(tree.len());
    for entry in tree.iter() {
        let (key_bytes, value) = entry?;
        let annotation = ArchivedBuf::<Annotation>::from_bytes(&value)?.deserialize();
        if key_bytes.as_ref() != &annotation_key(annotation.id)[..] {
            return Err(DbError::Corrupt {
                tree: String::from_utf8_lossy(&tree.name()).into_owned(),
                reason: format!("annotation {} stored under another key", annotation.id),
            });
        }
        annotations.push(annotation);
    }
    Ok(annotations)
}
