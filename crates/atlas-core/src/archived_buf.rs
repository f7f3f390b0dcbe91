use crate::NoSharedAllocSerializer;

use rkyv::bytecheck::CheckBytes;
use rkyv::ser::Serializer;
use rkyv::validation::validators::DefaultValidator;
use rkyv::{
    archived_root, check_archived_root, AlignedVec, Archive, Archived, Deserialize, Infallible,
    Serialize,
};
use std::error::Error;
use std::fmt;
use std::marker::PhantomData;

/// Serializes `value` into a fresh aligned buffer. `N` bytes of scratch space are reserved on the heap before falling back
/// to the allocator.
pub fn archive<T, const N: usize>(value: &T) -> Result<AlignedVec, ArchiveError>
where
    T: Serialize<NoSharedAllocSerializer<N>>,
{
    let mut serializer = NoSharedAllocSerializer::<N>::default();
    serializer
        .serialize_value(value)
        .map_err(|e| ArchiveError::Serialize(format!("{:?}", e)))?;
    Ok(serializer.into_serializer().into_inner())
}

/// An aligned byte buffer that is known to hold a valid [`Archived<T>`].
///
/// Bytes coming out of `sled` or off the wire have no alignment guarantee, so they are copied into an [`AlignedVec`] and
/// validated once on construction. Every later access skips validation.
///
/// Note: This is not intended to be used with structures that utilize shared memory like `Rc` and `Arc`.
#[derive(Clone)]
pub struct ArchivedBuf<T> {
    bytes: AlignedVec,
    marker: PhantomData<T>,
}

impl<T> ArchivedBuf<T>
where
    T: Archive,
{
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ArchiveError>
    where
        T::Archived: for<'a> CheckBytes<DefaultValidator<'a>>,
    {
        let mut aligned = AlignedVec::with_capacity(bytes.len());
        aligned.extend_from_slice(bytes);
        if let Err(e) = check_archived_root::<T>(aligned.as_slice()) {
            return Err(ArchiveError::Invalid(format!("{:?}", e)));
        }
        Ok(Self {
            bytes: aligned,
            marker: PhantomData,
        })
    }

    pub fn deserialize(&self) -> T
    where
        T::Archived: Deserialize<T, Infallible>,
    {
        self.as_ref()
            .deserialize(&mut Infallible)
            .unwrap_or_else(|_| unreachable!("deserializing with Infallible"))
    }
}

impl<T> AsRef<Archived<T>> for ArchivedBuf<T>
where
    T: Archive,
{
    fn as_ref(&self) -> &Archived<T> {
        // SAFETY: the bytes were validated as an `Archived<T>` in `from_bytes` and are never mutated afterwards.
        unsafe { archived_root::<T>(self.bytes.as_slice()) }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ArchiveError {
    /// The bytes do not hold a valid archive of the expected type.
    Invalid(String),
    /// The value could not be serialized.
    Serialize(String),
}

impl fmt::Display for ArchiveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid(reason) => write!(f, "invalid archive: {reason}"),
            Self::Serialize(reason) => write!(f, "failed to serialize archive: {reason}"),
        }
    }
}

impl Error for ArchiveError {}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Archive, Debug, Deserialize, Eq, PartialEq, Serialize)]
    #[archive(check_bytes)]
    struct Record {
        id: u64,
        payload: Vec<u8>,
    }

    #[test]
    fn archive_and_read_back() {
        let record = Record {
            id: 7,
            payload: vec![1, 2, 3],
        };
        let bytes = archive::<_, 64>(&record).unwrap();

        let buf = ArchivedBuf::<Record>::from_bytes(bytes.as_slice()).unwrap();
        assert_eq!(buf.as_ref().id, 7);
        assert_eq!(buf.deserialize(), record);
    }

    #[test]
    fn unaligned_input_is_copied_before_validation() {
        let record = Record {
            id: u64::MAX,
            payload: vec![9; 17],
        };
        let bytes = archive::<_, 64>(&record).unwrap();

        // Shift the archive by one byte so the source slice is misaligned.
        let mut shifted = vec![0u8];
        shifted.extend_from_slice(bytes.as_slice());
        let buf = ArchivedBuf::<Record>::from_bytes(&shifted[1..]).unwrap();
        assert_eq!(buf.deserialize(), record);
    }

    #[test]
    fn truncated_bytes_are_rejected() {
        let result = ArchivedBuf::<Record>::from_bytes(&[0xFF; 3]);
        assert!(matches!(result, Err(ArchiveError::Invalid(_))));
    }
}
