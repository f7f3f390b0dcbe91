use rkyv::{Archive, Deserialize, Serialize};
use std::fmt;

macro_rules! def_id {
    ($(#[$meta:meta])* $name:ident($inner:ty)) => {
        $(#[$meta])*
        #[derive(
            Archive, Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
        )]
        #[archive(check_bytes)]
        #[archive_attr(derive(Debug, Eq, PartialEq))]
        pub struct $name(pub $inner);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$inner> for $name {
            fn from(v: $inner) -> Self {
                Self(v)
            }
        }
    };
}

def_id!(
    /// An independently addressed world space. Each dimension has its own [`TileStore`](crate::TileStore).
    DimensionId(i32)
);
def_id!(
    /// An entity consuming replicated dataset state.
    ObserverId(u64)
);
def_id!(
    /// One discovery session. Names both the atlas dataset and its annotation dataset.
    AtlasId(u64)
);
def_id!(
    /// Identity of an [`Annotation`](crate::Annotation) within its dataset.
    AnnotationId(u64)
);

impl AnnotationId {
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}
