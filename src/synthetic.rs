//! A procedurally generated stand-in for a real world, used by the `survey` binary and the tests.

use atlas_map::core::ahash::RandomState;
use atlas_map::core::SmallKeyHashSet;
use atlas_map::{DimensionId, RegionCoords, RegionSource, SampleArray, UNGENERATED_SAMPLE};

use parking_lot::RwLock;
use std::hash::{BuildHasher, Hash, Hasher};

/// Samples per region side.
pub const REGION_SAMPLES: usize = 16;

/// A world of patchy biomes.
///
/// Biomes come in square patches of `patch_size` regions. Each sample column has a small chance to deviate from its patch,
/// so classification has to take the mode. Regions farther than `generated_radius` from the origin are ungenerated.
///
/// Regions can be unloaded and reloaded while the world is shared with a host.
pub struct SyntheticWorld {
    hasher: RandomState,
    biomes: u8,
    patch_size: i32,
    generated_radius: i32,
    unloaded: RwLock<SmallKeyHashSet<(DimensionId, RegionCoords)>>,
}

impl SyntheticWorld {
    pub fn new(seed: u64) -> Self {
        Self {
            hasher: RandomState::with_seeds(seed, seed ^ 0x9e37_79b9, 17, 31),
            biomes: 8,
            patch_size: 4,
            generated_radius: i32::MAX,
            unloaded: RwLock::new(SmallKeyHashSet::default()),
        }
    }

    pub fn with_generated_radius(mut self, radius: i32) -> Self {
        self.generated_radius = radius;
        self
    }

    pub fn unload(&self, dimension: DimensionId, coords: RegionCoords) {
        self.unloaded.write().insert((dimension, coords));
    }

    pub fn load(&self, dimension: DimensionId, coords: RegionCoords) {
        self.unloaded.write().remove(&(dimension, coords));
    }

    /// The biome a region's patch has, which is what a mode classifier should find.
    pub fn patch_biome(&self, dimension: DimensionId, coords: RegionCoords) -> u8 {
        let patch = (
            coords.x.div_euclid(self.patch_size),
            coords.z.div_euclid(self.patch_size),
        );
        (self.hash((dimension, patch)) % u64::from(self.biomes)) as u8
    }

    fn is_generated(&self, coords: RegionCoords) -> bool {
        coords.x.unsigned_abs() <= self.generated_radius.unsigned_abs()
            && coords.z.unsigned_abs() <= self.generated_radius.unsigned_abs()
    }

    fn hash(&self, value: impl Hash) -> u64 {
        let mut hasher = self.hasher.build_hasher();
        value.hash(&mut hasher);
        hasher.finish()
    }
}

impl RegionSource for SyntheticWorld {
    fn is_region_loaded(&self, dimension: DimensionId, coords: RegionCoords) -> bool {
        !self.unloaded.read().contains(&(dimension, coords))
    }

    fn raw_samples(&self, dimension: DimensionId, coords: RegionCoords) -> Option<SampleArray> {
        if !self.is_region_loaded(dimension, coords) {
            return None;
        }
        if !self.is_generated(coords) {
            return Some(vec![UNGENERATED_SAMPLE; REGION_SAMPLES * REGION_SAMPLES]);
        }

        let biome = self.patch_biome(dimension, coords);
        let samples = (0..REGION_SAMPLES * REGION_SAMPLES)
            .map(|column| {
                let noise = self.hash((dimension, coords, column));
                // One column in eight strays into a neighboring biome.
                if noise % 8 == 0 {
                    ((u64::from(biome) + 1 + (noise >> 8) % 2) % u64::from(self.biomes)) as u8
                } else {
                    biome
                }
            })
            .collect();
        Some(samples)
    }
}
