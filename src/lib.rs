//! Host and observer sessions for the atlas discovery engine.
//!
//! A [`HostSession`] owns the datasets, decides when to scan around each attached observer, replicates the results and
//! saves them. An [`ObserverSession`] keeps a replica of what the host sent.

mod config;
mod host;
mod observer;
pub mod synthetic;

pub use config::{Config, ConfigError};
pub use host::{HostSession, ObserverState, TickReport};
pub use observer::ObserverSession;

pub use atlas_map as map;
