use atlas_map::{
    crossbeam_channel::Receiver, AtlasConfig, AtlasId, DimensionId, NoOverrides, ObserverId,
    Packet, RegionClassifier, RegionSource, Replica, ScanContext, ScanReport, Scanner, WorldPos,
};

/// The passive side: applies whatever the host sends and optionally scans on its own for immediate feedback.
///
/// Local scans write to the replica only. They are never saved or sent anywhere, and the host's tiles overwrite them when
/// they arrive.
pub struct ObserverSession {
    id: ObserverId,
    replica: Replica,
    receiver: Receiver<Packet>,
    local_scan: Option<LocalScan>,
}

struct LocalScan {
    scanner: Scanner,
    regions: Box<dyn RegionSource>,
    classifier: Box<dyn RegionClassifier>,
}

impl ObserverSession {
    pub fn new(id: ObserverId, receiver: Receiver<Packet>) -> Self {
        Self {
            id,
            replica: Replica::default(),
            receiver,
            local_scan: None,
        }
    }

    pub fn with_local_scanning(
        mut self,
        config: AtlasConfig,
        regions: impl RegionSource + 'static,
        classifier: impl RegionClassifier + 'static,
    ) -> Self {
        self.local_scan = Some(LocalScan {
            scanner: Scanner::new(config),
            regions: Box::new(regions),
            classifier: Box::new(classifier),
        });
        self
    }

    pub fn id(&self) -> ObserverId {
        self.id
    }

    pub fn replica(&self) -> &Replica {
        &self.replica
    }

    /// Applies everything the host sent since the last call. Returns the number of messages applied.
    pub fn receive(&mut self) -> usize {
        self.replica.pump(&self.receiver)
    }

    /// `None` unless local scanning is enabled.
    pub fn scan_locally(
        &mut self,
        atlas: AtlasId,
        dimension: DimensionId,
        position: WorldPos,
    ) -> Option<ScanReport> {
        let local = self.local_scan.as_ref()?;
        let context = ScanContext {
            dimension,
            position,
            regions: &*local.regions,
            classifier: &*local.classifier,
            overrides: &NoOverrides,
        };
        Some(local.scanner.scan(&context, self.replica.atlas_mut(atlas)))
    }
}
