//! The seams between the scanner and the world it surveys.
//!
//! All three collaborators answer with a [`Lookup`] instead of a sentinel value, so every call site has to say what it does
//! with each outcome.

use crate::{ClassificationId, DimensionId, RegionCoords};

use std::sync::Arc;

/// The result of asking a collaborator about one region.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Lookup {
    /// A concrete classification.
    Found(ClassificationId),
    /// The region's raw data is not currently available. Try again later.
    NotLoaded,
    /// The region is loaded but the classifier could not decide.
    Unavailable,
    /// No override is registered for the region.
    NoOverride,
}

impl Lookup {
    pub fn found(self) -> Option<ClassificationId> {
        match self {
            Lookup::Found(id) => Some(id),
            Lookup::NotLoaded | Lookup::Unavailable | Lookup::NoOverride => None,
        }
    }
}

/// Raw terrain samples for one region, one value per ground column.
pub type SampleArray = Vec<u8>;

/// The world's region-loading subsystem.
pub trait RegionSource {
    fn is_region_loaded(&self, dimension: DimensionId, coords: RegionCoords) -> bool;

    /// `None` if the region was unloaded since [`RegionSource::is_region_loaded`] was asked.
    fn raw_samples(&self, dimension: DimensionId, coords: RegionCoords) -> Option<SampleArray>;
}

impl<T> RegionSource for Arc<T>
where
    T: RegionSource + ?Sized,
{
    fn is_region_loaded(&self, dimension: DimensionId, coords: RegionCoords) -> bool {
        (**self).is_region_loaded(dimension, coords)
    }

    fn raw_samples(&self, dimension: DimensionId, coords: RegionCoords) -> Option<SampleArray> {
        (**self).raw_samples(dimension, coords)
    }
}

/// Turns raw samples into a classification. Answers [`Lookup::Found`] or [`Lookup::Unavailable`].
pub trait RegionClassifier {
    fn classify(&self, samples: &[u8]) -> Lookup;
}

/// Hand-placed classifications that take precedence over the [`RegionClassifier`]. Answers [`Lookup::Found`] or
/// [`Lookup::NoOverride`].
pub trait OverrideSource {
    fn override_at(&self, dimension: DimensionId, coords: RegionCoords) -> Lookup;
}

impl<F> OverrideSource for F
where
    F: Fn(DimensionId, RegionCoords) -> Lookup,
{
    fn override_at(&self, dimension: DimensionId, coords: RegionCoords) -> Lookup {
        self(dimension, coords)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoOverrides;

impl OverrideSource for NoOverrides {
    fn override_at(&self, _dimension: DimensionId, _coords: RegionCoords) -> Lookup {
        Lookup::NoOverride
    }
}

/// A sample value that means "not generated yet". It never counts toward a classification.
pub const UNGENERATED_SAMPLE: u8 = u8::MAX;

/// Classifies a region as its most frequent sample value.
///
/// Ties go to the value seen first. Regions with no usable samples are [`Lookup::Unavailable`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ModeClassifier;

impl RegionClassifier for ModeClassifier {
    fn classify(&self, samples: &[u8]) -> Lookup {
        let mut counter = SampleModeCounter::default();
        for &sample in samples {
            if sample != UNGENERATED_SAMPLE {
                counter.add(sample);
            }
        }
        match counter.mode() {
            Some(mode) => Lookup::Found(ClassificationId(mode.label as i32)),
            None => Lookup::Unavailable,
        }
    }
}

type Label = u8;

type Slot = u8;
const NULL_SLOT: Slot = Slot::MAX;

/// Counts occurrences of [`Label`]s. Labels get a slot in first-seen order, which is how ties are broken.
struct SampleModeCounter {
    counts: Vec<LabelCount>,
    /// An array map determines which count slot, if any, each label is assigned.
    label_to_slot: [Slot; 256],
}

impl Default for SampleModeCounter {
    fn default() -> Self {
        Self {
            counts: Vec::new(),
            label_to_slot: [NULL_SLOT; 256],
        }
    }
}

impl SampleModeCounter {
    fn add(&mut self, label: Label) {
        let label_i = label as usize;

        let mut slot = self.label_to_slot[label_i];
        if slot == NULL_SLOT {
            // At most 255 distinct labels reach here, because UNGENERATED_SAMPLE is filtered by the caller.
            slot = self.counts.len() as Slot;
            self.label_to_slot[label_i] = slot;
            self.counts.push(LabelCount { label, count: 0 });
        }

        self.counts[slot as usize].count += 1;
    }

    fn mode(&self) -> Option<LabelCount> {
        let mut max_elem: Option<LabelCount> = None;
        for &elem in self.counts.iter() {
            if max_elem.map_or(true, |m| elem.count > m.count) {
                max_elem = Some(elem);
            }
        }
        max_elem
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct LabelCount {
    pub count: usize,
    pub label: Label,
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

    #[test]
    fn single_label_is_mode() {
        let mut counter = SampleModeCounter::default();
        counter.add(1);
        assert_eq!(counter.mode(), Some(LabelCount { label: 1, count: 1 }));
    }

    #[test]
    fn two_labels_tie_for_mode() {
        let mut counter = SampleModeCounter::default();
        counter.add(1);
        counter.add(0);
        assert_eq!(counter.mode(), Some(LabelCount { label: 1, count: 1 }));
    }

    #[test]
    fn many_labels() {
        let mut counter = SampleModeCounter::default();
        for label in [1, 8, 2, 4, 4, 4, 3, 3, 3, 3] {
            counter.add(label);
        }
        assert_eq!(counter.mode(), Some(LabelCount { label: 3, count: 4 }));
    }

    #[test]
    fn classifier_uses_the_mode() {
        let mut samples = vec![7u8; 200];
        samples.extend_from_slice(&[2; 56]);
        assert_eq!(ModeClassifier.classify(&samples), Lookup::Found(ClassificationId(7)));
    }

    #[test]
    fn ungenerated_samples_are_ignored() {
        let mut samples = vec![UNGENERATED_SAMPLE; 250];
        samples.extend_from_slice(&[12; 6]);
        assert_eq!(ModeClassifier.classify(&samples), Lookup::Found(ClassificationId(12)));
    }

    #[test]
    fn nothing_usable_is_unavailable() {
        assert_eq!(ModeClassifier.classify(&[]), Lookup::Unavailable);
        assert_eq!(ModeClassifier.classify(&[UNGENERATED_SAMPLE; 256]), Lookup::Unavailable);
    }

    #[test]
    fn closures_are_override_sources() {
        let only_origin = |_dim: DimensionId, coords: RegionCoords| {
            if coords == RegionCoords::ZERO {
                Lookup::Found(ClassificationId(-5))
            } else {
                Lookup::NoOverride
            }
        };
        assert_eq!(
            only_origin.override_at(DimensionId(0), RegionCoords::ZERO),
            Lookup::Found(ClassificationId(-5))
        );
        assert_eq!(
            only_origin.override_at(DimensionId(0), RegionCoords::new(1, 0)),
            Lookup::NoOverride
        );
        assert_eq!(
            NoOverrides.override_at(DimensionId(0), RegionCoords::ZERO),
            Lookup::NoOverride
        );
    }
}
