use crate::{DEFAULT_REGION_SHIFT, MAX_REGION_SHIFT};

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct AtlasConfig {
    /// Radius of the scanned disk around an observer, in regions.
    pub look_radius: u32,
    /// An observer is scanned once every `update_interval` of its own ticks. Zero behaves like one.
    pub update_interval: u32,
    /// Regions are `2^region_shift` ground units wide. At most [`MAX_REGION_SHIFT`].
    pub region_shift: u32,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            look_radius: 11,
            update_interval: 20,
            region_shift: DEFAULT_REGION_SHIFT,
        }
    }
}

impl AtlasConfig {
    /// Checks what serde can't. Call this on any config that was read from outside.
    pub fn validate(&self) -> Result<(), InvalidConfig> {
        if self.region_shift > MAX_REGION_SHIFT {
            return Err(InvalidConfig::RegionShift(self.region_shift));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InvalidConfig {
    RegionShift(u32),
}

impl fmt::Display for InvalidConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidConfig::RegionShift(shift) => write!(
                f,
                "region_shift is {}, must be at most {}",
                shift, MAX_REGION_SHIFT
            ),
        }
    }
}

impl std::error::Error for InvalidConfig {}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_shift_must_fit_in_a_coordinate() {
        assert_eq!(AtlasConfig::default().validate(), Ok(()));

        let mut config = AtlasConfig::default();
        config.region_shift = MAX_REGION_SHIFT;
        assert_eq!(config.validate(), Ok(()));
        config.region_shift = 32;
        assert_eq!(config.validate(), Err(InvalidConfig::RegionShift(32)));
    }
}
