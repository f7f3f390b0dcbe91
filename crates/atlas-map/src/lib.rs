//! The atlas discovery and caching engine.
//!
//! # Tiles
//!
//! The world is divided into square regions (`2^region_shift` ground units wide) and each region that has been explored is
//! summarized by a single [`Tile`], its [`ClassificationId`]. Tiles are kept in one sparse [`TileStore`] per
//! [`DimensionId`]. Discovery is monotonic: a region, once known, is never forgotten.
//!
//! # Discovery
//!
//! A [`Scanner`] periodically visits a disk of regions around each observer. Hand-placed overrides win over everything;
//! otherwise regions that are already known are skipped and unknown ones are classified from raw samples by a
//! [`RegionClassifier`], if the world has them loaded. All collaborators answer with a tagged [`Lookup`].
//!
//! # Datasets
//!
//! One discovery session is an "atlas." Its tiles live in an [`AtlasDataset`] and its user-placed markers in an
//! [`AnnotationDataset`]. Both are persisted by an [`AtlasDb`] and cached by a [`DatasetRegistry`].
//!
//! # Replication
//!
//! The authoritative host sends each observer a full [`Snapshot`] the first time it sees that observer on a non-empty
//! dataset, and [`Delta`]s for every write after that. Observers keep a [`Replica`].

mod classify;
mod config;
mod coordinates;
mod database;
mod dataset;
mod ids;
mod registry;
mod replica;
mod replication;
mod scanner;
mod sync;
mod tile;
mod tile_store;

pub use classify::*;
pub use config::*;
pub use coordinates::*;
pub use database::*;
pub use dataset::*;
pub use ids::*;
pub use registry::*;
pub use replica::*;
pub use replication::*;
pub use scanner::*;
pub use sync::*;
pub use tile::*;
pub use tile_store::*;

pub use atlas_core as core;
pub use crossbeam_channel;
pub use sled;
