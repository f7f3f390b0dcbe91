use itertools::iproduct;
use rkyv::{Archive, Deserialize, Serialize};
use std::fmt;

/// Number of bits to shift a ground-unit coordinate to get its region coordinate. Regions are 16×16 ground units.
pub const DEFAULT_REGION_SHIFT: u32 = 4;

/// Largest usable region shift. Anything wider would not fit one region coordinate in an `i32` ground coordinate.
pub const MAX_REGION_SHIFT: u32 = 31;

/// The integer coordinates of one region, in region units.
#[derive(
    Archive, Clone, Copy, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
#[archive(check_bytes)]
#[archive_attr(derive(Debug, Eq, PartialEq))]
pub struct RegionCoords {
    pub x: i32,
    pub z: i32,
}

impl RegionCoords {
    pub const ZERO: Self = Self { x: 0, z: 0 };

    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// `None` if the result leaves the `i32` range.
    pub fn checked_offset(self, dx: i32, dz: i32) -> Option<Self> {
        Some(Self::new(self.x.checked_add(dx)?, self.z.checked_add(dz)?))
    }
}

impl fmt::Display for RegionCoords {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

/// A position in continuous world space, in ground units.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct WorldPos {
    pub x: f64,
    pub z: f64,
}

impl WorldPos {
    pub const fn new(x: f64, z: f64) -> Self {
        Self { x, z }
    }

    /// Returns the coordinates of the region that contains this position.
    ///
    /// Positions are floored before shifting, so negative positions round toward negative infinity. Positions beyond the
    /// `i32` region range are clamped to its edge, and NaN maps to zero.
    pub fn region(self, shift: u32) -> RegionCoords {
        RegionCoords::new(floor_shift(self.x, shift), floor_shift(self.z, shift))
    }
}

fn floor_shift(ground: f64, shift: u32) -> i32 {
    // Float to int casts saturate.
    let ground = ground.floor() as i64;
    let region = ground >> shift.min(63);
    region.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

/// All offsets `(dx, dz)` with `dx² + dz² <= radius²`, row by row.
///
/// The comparison is inclusive, so offsets exactly on the circle are part of the disk.
pub fn disk_offsets(radius: u32) -> Vec<RegionCoords> {
    let r = radius as i64;
    let r_sq = r * r;
    iproduct!(-r..=r, -r..=r)
        .filter(|&(dx, dz)| dx * dx + dz * dz <= r_sq)
        .map(|(dx, dz)| RegionCoords::new(dx as i32, dz as i32))
        .collect()
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
