use crate::{
    disk_offsets, AtlasConfig, AtlasDataset, DimensionId, Lookup, OverrideSource, RegionClassifier,
    RegionCoords, RegionSource, Tile, WorldPos,
};

/// What a scanner needs to know about the world around one observer.
pub struct ScanContext<'a> {
    pub dimension: DimensionId,
    pub position: WorldPos,
    pub regions: &'a dyn RegionSource,
    pub classifier: &'a dyn RegionClassifier,
    pub overrides: &'a dyn OverrideSource,
}

/// Per-scan counters. Every candidate region lands in exactly one bucket.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ScanReport {
    pub center: RegionCoords,
    pub candidates: usize,
    pub overrides_written: usize,
    pub overrides_unchanged: usize,
    pub discovered: usize,
    pub skipped_known: usize,
    pub skipped_not_loaded: usize,
    pub skipped_unavailable: usize,
}

impl ScanReport {
    /// Number of tiles written to the dataset.
    pub fn writes(&self) -> usize {
        self.overrides_written + self.discovered
    }
}

/// Discovers tiles in a disk of regions around an observer.
///
/// The disk offsets only depend on the look radius, so they are computed once.
#[derive(Clone, Debug)]
pub struct Scanner {
    config: AtlasConfig,
    offsets: Vec<RegionCoords>,
}

impl Scanner {
    pub fn new(config: AtlasConfig) -> Self {
        Self {
            offsets: disk_offsets(config.look_radius),
            config,
        }
    }

    pub fn config(&self) -> &AtlasConfig {
        &self.config
    }

    /// Offsets of the scanned disk relative to its center.
    pub fn offsets(&self) -> &[RegionCoords] {
        &self.offsets
    }

    /// True on the ticks where an observer that has existed for `ticks_existed` ticks should be scanned.
    pub fn is_due(&self, ticks_existed: u64) -> bool {
        ticks_existed % u64::from(self.config.update_interval.max(1)) == 0
    }

    /// The regions a scan centered on `center` considers. Offsets that would leave the coordinate range are skipped.
    pub fn candidates(&self, center: RegionCoords) -> impl Iterator<Item = RegionCoords> + '_ {
        self.offsets.iter().filter_map(move |o| center.checked_offset(o.x, o.z))
    }

    /// Visits every candidate region once and writes what it learns to `dataset`.
    ///
    /// Overrides win over everything, including tiles already known, but an override that matches the stored
    /// classification is not written again. Without an override, known tiles are never re-examined and regions whose data
    /// is not loaded are left for a later scan.
    pub fn scan(&self, context: &ScanContext, dataset: &mut AtlasDataset) -> ScanReport {
        let dimension = context.dimension;
        let center = context.position.region(self.config.region_shift);
        let mut report = ScanReport {
            center,
            ..Default::default()
        };

        for coords in self.candidates(center) {
            report.candidates += 1;

            if let Lookup::Found(id) = context.overrides.override_at(dimension, coords) {
                if dataset
                    .tile(dimension, coords)
                    .map_or(false, |t| t.classification == id)
                {
                    report.overrides_unchanged += 1;
                } else {
                    dataset.put_tile(dimension, coords, Tile::new(id));
                    report.overrides_written += 1;
                }
                continue;
            }

            if dataset.has_tile_at(dimension, coords) {
                report.skipped_known += 1;
                continue;
            }

            if !context.regions.is_region_loaded(dimension, coords) {
                report.skipped_not_loaded += 1;
                continue;
            }
            let samples = match context.regions.raw_samples(dimension, coords) {
                Some(samples) => samples,
                None => {
                    report.skipped_not_loaded += 1;
                    continue;
                }
            };

            match context.classifier.classify(&samples) {
                Lookup::Found(id) => {
                    dataset.put_tile(dimension, coords, Tile::new(id));
                    report.discovered += 1;
                }
                Lookup::Unavailable | Lookup::NotLoaded | Lookup::NoOverride => {
                    report.skipped_unavailable += 1;
                }
            }
        }

        log::debug!(
            "scanned atlas {} around {} in dimension {}: {:?}",
            dataset.atlas(),
            center,
            dimension,
            report
        );
        report
    }
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
    use crate::{AtlasId, ClassificationId, ModeClassifier, NoOverrides, SampleArray, Side};

    use atlas_core::SmallKeyHashSet;
    use std::cell::Cell;

    const OVERWORLD: DimensionId = DimensionId(0);

    /// Every region is loaded and filled with one sample value, except the ones listed as unloaded.
    struct FlatWorld {
        sample: u8,
        unloaded: SmallKeyHashSet<RegionCoords>,
        reads: Cell<usize>,
    }

    impl FlatWorld {
        fn new(sample: u8) -> Self {
            Self {
                sample,
                unloaded: SmallKeyHashSet::default(),
                reads: Cell::new(0),
            }
        }
    }

    impl RegionSource for FlatWorld {
        fn is_region_loaded(&self, _dimension: DimensionId, coords: RegionCoords) -> bool {
            !self.unloaded.contains(&coords)
        }

        fn raw_samples(&self, _dimension: DimensionId, _coords: RegionCoords) -> Option<SampleArray> {
            self.reads.set(self.reads.get() + 1);
            Some(vec![self.sample; 16 * 16])
        }
    }

    fn small_scanner(radius: u32) -> Scanner {
        Scanner::new(AtlasConfig {
            look_radius: radius,
            ..Default::default()
        })
    }

    #[test]
    fn discovers_whole_disk_then_skips_known() {
        let scanner = small_scanner(2);
        let world = FlatWorld::new(7);
        let mut atlas = AtlasDataset::new(AtlasId(0), Side::Authoritative);
        let context = ScanContext {
            dimension: OVERWORLD,
            position: WorldPos::new(8.0, 8.0),
            regions: &world,
            classifier: &ModeClassifier,
            overrides: &NoOverrides,
        };

        let report = scanner.scan(&context, &mut atlas);
        assert_eq!(report.center, RegionCoords::ZERO);
        assert_eq!(report.candidates, 13);
        assert_eq!(report.discovered, 13);
        assert_eq!(atlas.num_tiles(), 13);
        assert_eq!(
            atlas.tile(OVERWORLD, RegionCoords::new(0, -2)),
            Some(Tile::new(ClassificationId(7)))
        );

        let report = scanner.scan(&context, &mut atlas);
        assert_eq!(report.skipped_known, 13);
        assert_eq!(report.writes(), 0);
        assert_eq!(world.reads.get(), 13);
    }

    #[test]
    fn unloaded_and_ungenerated_regions_are_retried() {
        let scanner = small_scanner(1);
        let mut world = FlatWorld::new(crate::UNGENERATED_SAMPLE);
        world.unloaded.insert(RegionCoords::new(1, 0));
        let mut atlas = AtlasDataset::new(AtlasId(0), Side::Authoritative);

        let report = {
            let context = ScanContext {
                dimension: OVERWORLD,
                position: WorldPos::new(0.0, 0.0),
                regions: &world,
                classifier: &ModeClassifier,
                overrides: &NoOverrides,
            };
            scanner.scan(&context, &mut atlas)
        };
        assert_eq!(report.skipped_not_loaded, 1);
        assert_eq!(report.skipped_unavailable, 4);
        assert_eq!(atlas.num_tiles(), 0);

        world.sample = 3;
        world.unloaded.clear();
        let context = ScanContext {
            dimension: OVERWORLD,
            position: WorldPos::new(0.0, 0.0),
            regions: &world,
            classifier: &ModeClassifier,
            overrides: &NoOverrides,
        };
        let report = scanner.scan(&context, &mut atlas);
        assert_eq!(report.discovered, 5);
    }

    #[test]
    fn overrides_replace_known_tiles_once() {
        let scanner = small_scanner(0);
        let world = FlatWorld::new(1);
        let mut atlas = AtlasDataset::new(AtlasId(0), Side::Authoritative);
        atlas.put_tile(OVERWORLD, RegionCoords::ZERO, Tile::new(ClassificationId(1)));
        atlas.take_changes();

        let overrides = |_d: DimensionId, c: RegionCoords| {
            if c == RegionCoords::ZERO {
                Lookup::Found(ClassificationId(42))
            } else {
                Lookup::NoOverride
            }
        };
        let context = ScanContext {
            dimension: OVERWORLD,
            position: WorldPos::new(1.0, 1.0),
            regions: &world,
            classifier: &ModeClassifier,
            overrides: &overrides,
        };

        let report = scanner.scan(&context, &mut atlas);
        assert_eq!(report.overrides_written, 1);
        assert_eq!(
            atlas.tile(OVERWORLD, RegionCoords::ZERO),
            Some(Tile::new(ClassificationId(42)))
        );
        assert!(atlas.take_changes().is_some());

        let report = scanner.scan(&context, &mut atlas);
        assert_eq!(report.overrides_unchanged, 1);
        assert!(!atlas.is_dirty());
        assert_eq!(world.reads.get(), 0);
    }

    #[test]
    fn zero_interval_scans_every_tick() {
        let scanner = Scanner::new(AtlasConfig {
            update_interval: 0,
            ..Default::default()
        });
        assert!((0..5).all(|t| scanner.is_due(t)));

        let scanner = Scanner::new(AtlasConfig::default());
        assert!(scanner.is_due(0));
        assert!(!scanner.is_due(19));
        assert!(scanner.is_due(40));
    }

    #[test]
    fn scans_at_the_edge_of_the_world_skip_what_is_off_it() {
        let scanner = Scanner::new(AtlasConfig {
            look_radius: 2,
            region_shift: 0,
            ..Default::default()
        });
        let world = FlatWorld::new(3);
        let mut atlas = AtlasDataset::new(AtlasId(0), Side::Authoritative);
        let context = ScanContext {
            dimension: OVERWORLD,
            position: WorldPos::new(3.0e9, 0.0),
            regions: &world,
            classifier: &ModeClassifier,
            overrides: &NoOverrides,
        };

        let report = scanner.scan(&context, &mut atlas);
        assert_eq!(report.center, RegionCoords::new(i32::MAX, 0));
        // The 4 offsets east of the center don't exist.
        assert_eq!(report.candidates, 9);
        assert_eq!(atlas.num_tiles(), 9);
        assert!(atlas.has_tile_at(OVERWORLD, RegionCoords::new(i32::MAX - 2, 0)));
    }
}
