pub mod archived_buf;
pub mod work_timer;

pub use archived_buf::{archive, ArchiveError, ArchivedBuf};
pub use work_timer::WorkTimer;

use ahash::{AHashMap, AHashSet};
pub type SmallKeyHashMap<K, V> = AHashMap<K, V>;
pub type SmallKeyHashSet<K> = AHashSet<K>;

// Re-exports.
pub use ahash;
pub use rkyv;
pub use static_assertions;

use rkyv::{
    ser::serializers::{
        AlignedSerializer, AllocScratch, CompositeSerializer, FallbackScratch, HeapScratch,
    },
    AlignedVec, Infallible,
};
pub type NoSharedAllocSerializer<const N: usize> = CompositeSerializer<
    AlignedSerializer<AlignedVec>,
    FallbackScratch<HeapScratch<N>, AllocScratch>,
    Infallible,
>;
