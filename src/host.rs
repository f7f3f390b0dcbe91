use crate::Config;

use atlas_core::WorkTimer;
use atlas_map::{
    broadcast_deltas, sync_observer, AnnotationId, AtlasId, DatasetRegistry, DbError, DimensionId,
    NoOverrides, ObserverId, OverrideSource, RegionClassifier, RegionSource, ReplicationChannel,
    SaveReport, ScanContext, Scanner, WorldPos,
};

use std::collections::BTreeMap;

/// Where an attached observer is and which atlas it carries.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ObserverState {
    pub atlas: AtlasId,
    pub dimension: DimensionId,
    pub position: WorldPos,
    /// Ticks since the observer was attached. Scans are scheduled off this, so observers don't all scan on the same tick.
    pub ticks_existed: u64,
}

/// What happened during one [`HostSession::tick`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TickReport {
    pub tick: u64,
    pub snapshots_sent: usize,
    pub deltas_drained: usize,
    pub scans: usize,
    pub tiles_written: usize,
    pub reassigned: usize,
    /// Observers whose datasets could not be loaded or allocated this tick. They are retried on the next one.
    pub failed_observers: usize,
    pub save: Option<SaveReport>,
}

/// The authoritative side: discovers tiles around attached observers, replicates them and saves them.
pub struct HostSession<C> {
    config: Config,
    registry: DatasetRegistry,
    scanner: Scanner,
    regions: Box<dyn RegionSource>,
    classifier: Option<Box<dyn RegionClassifier>>,
    overrides: Box<dyn OverrideSource>,
    channel: C,
    observers: BTreeMap<ObserverId, ObserverState>,
    tick: u64,
    scan_timer: WorkTimer,
}

impl<C> HostSession<C>
where
    C: ReplicationChannel,
{
    /// A host without a classifier. It never scans, but still replicates what it has.
    pub fn new(
        config: Config,
        registry: DatasetRegistry,
        regions: impl RegionSource + 'static,
        channel: C,
    ) -> Self {
        Self {
            scanner: Scanner::new(config.map),
            config,
            registry,
            regions: Box::new(regions),
            classifier: None,
            overrides: Box::new(NoOverrides),
            channel,
            observers: BTreeMap::new(),
            tick: 0,
            scan_timer: WorkTimer::start(),
        }
    }

    pub fn with_classifier(mut self, classifier: impl RegionClassifier + 'static) -> Self {
        self.classifier = Some(Box::new(classifier));
        self
    }

    pub fn with_overrides(mut self, overrides: impl OverrideSource + 'static) -> Self {
        self.overrides = Box::new(overrides);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &DatasetRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut DatasetRegistry {
        &mut self.registry
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    pub fn create_atlas(&mut self) -> Result<AtlasId, DbError> {
        let (id, _) = self.registry.create_atlas()?;
        Ok(id)
    }

    /// Starts tracking `observer`. An unknown `atlas` is replaced with a fresh one on the next tick.
    ///
    /// The observer doesn't need to be reachable through the channel yet. It stays unsynced, and keeps getting offered
    /// snapshots every tick, until one is actually delivered.
    pub fn attach_observer(
        &mut self,
        observer: ObserverId,
        atlas: AtlasId,
        dimension: DimensionId,
        position: WorldPos,
    ) {
        self.observers.insert(
            observer,
            ObserverState {
                atlas,
                dimension,
                position,
                ticks_existed: 0,
            },
        );
    }

    /// Returns `false` if the observer is not attached.
    pub fn move_observer(&mut self, observer: ObserverId, dimension: DimensionId, position: WorldPos) -> bool {
        match self.observers.get_mut(&observer) {
            Some(state) => {
                state.dimension = dimension;
                state.position = position;
                true
            }
            None => false,
        }
    }

    pub fn detach_observer(&mut self, observer: ObserverId) -> Option<ObserverState> {
        self.observers.remove(&observer)
    }

    pub fn observer(&self, observer: ObserverId) -> Option<&ObserverState> {
        self.observers.get(&observer)
    }

    pub fn add_annotation(
        &mut self,
        atlas: AtlasId,
        dimension: DimensionId,
        payload: Vec<u8>,
    ) -> Result<AnnotationId, DbError> {
        let markers = self.registry.annotations_or_create(atlas)?;
        let id = markers.write().add(dimension, payload);
        Ok(id)
    }

    /// Returns `false` if there was no such annotation.
    pub fn remove_annotation(&mut self, atlas: AtlasId, id: AnnotationId) -> Result<bool, DbError> {
        Ok(match self.registry.annotations(atlas)? {
            Some(markers) => markers.write().remove(id).is_some(),
            None => false,
        })
    }

    /// Runs one tick of the scheduler.
    ///
    /// Writes made between ticks are broadcast first. Then each observer, in id order, is synced, scanned when due, and
    /// the deltas of its atlas are broadcast. Finally dirty datasets are saved if a save is due.
    ///
    /// A database error for one observer is logged and counted in [`TickReport::failed_observers`]; the remaining
    /// observers are still served. Only a failed save is returned as an error, after the observer pass completed.
    pub fn tick(&mut self) -> Result<TickReport, DbError> {
        self.tick += 1;
        let mut report = TickReport {
            tick: self.tick,
            ..Default::default()
        };
        let Self {
            registry,
            scanner,
            regions,
            classifier,
            overrides,
            channel,
            observers,
            scan_timer,
            ..
        } = self;

        report.deltas_drained += broadcast_pending(registry, channel);

        for (&observer, state) in observers.iter_mut() {
            let due = scanner.is_due(state.ticks_existed);
            state.ticks_existed += 1;

            let (atlas_id, atlas) = match registry.atlas_or_allocate(state.atlas) {
                Ok(loaded) => loaded,
                Err(e) => {
                    log::warn!("skipping observer {} this tick: atlas {}: {}", observer, state.atlas, e);
                    report.failed_observers += 1;
                    continue;
                }
            };
            if atlas_id != state.atlas {
                state.atlas = atlas_id;
                report.reassigned += 1;
            }
            let mut atlas = atlas.write();

            if sync_observer(&mut *atlas, observer, channel) {
                report.snapshots_sent += 1;
            }
            match registry.annotations(atlas_id) {
                Ok(Some(markers)) => {
                    if sync_observer(&mut *markers.write(), observer, channel) {
                        report.snapshots_sent += 1;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    // The atlas itself is fine, so keep scanning it.
                    log::warn!("annotations of atlas {} unavailable for observer {}: {}", atlas_id, observer, e);
                    report.failed_observers += 1;
                }
            }

            if let (true, Some(classifier)) = (due, classifier.as_deref()) {
                let context = ScanContext {
                    dimension: state.dimension,
                    position: state.position,
                    regions: &**regions,
                    classifier,
                    overrides: &**overrides,
                };
                let scan = scan_timer.time(|| scanner.scan(&context, &mut *atlas));
                report.scans += 1;
                report.tiles_written += scan.writes();
            }

            report.deltas_drained += broadcast_deltas(&mut *atlas, channel);
        }

        if self.config.is_save_due(self.tick) {
            report.save = Some(self.save()?);
        }
        Ok(report)
    }

    /// Saves every dirty dataset now.
    pub fn save(&mut self) -> Result<SaveReport, DbError> {
        self.registry.save_dirty()
    }

    /// Average CPU time of one scan, in microseconds.
    pub fn average_scan_time_us(&self) -> u32 {
        self.scan_timer.average_cpu_time_us()
    }

    pub fn scans_completed(&self) -> u32 {
        self.scan_timer.items_completed()
    }
}

/// Broadcasts deltas queued by writes outside of scans, like annotation edits.
fn broadcast_pending<C: ReplicationChannel>(registry: &DatasetRegistry, channel: &mut C) -> usize {
    let mut drained = 0;
    for (_, atlas) in registry.loaded_atlases() {
        drained += broadcast_deltas(&mut *atlas.write(), channel);
    }
    for (_, markers) in registry.loaded_annotations() {
        drained += broadcast_deltas(&mut *markers.write(), channel);
    }
    drained
}
