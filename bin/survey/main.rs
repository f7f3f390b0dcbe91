use atlas::map::{
    DatasetRegistry, DimensionId, LocalTransport, ModeClassifier, ObserverId, WorldPos,
};
use atlas::synthetic::SyntheticWorld;
use atlas::{Config, HostSession, ObserverSession};

use clap::Parser;
use std::sync::Arc;

/// Walk a few observers through a synthetic world and report what the host discovered and replicated.
#[derive(Parser)]
#[command(about = "Headless atlas discovery run over a synthetic world")]
struct Args {
    /// RON config file. Defaults are used when absent.
    #[arg(long)]
    config: Option<String>,
    /// Number of host ticks to run.
    #[arg(long, default_value_t = 2000)]
    ticks: u64,
    /// Number of walking observers.
    #[arg(long, default_value_t = 2)]
    observers: u64,
    /// Seed of the synthetic world.
    #[arg(long, default_value_t = 1)]
    seed: u64,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = match args.config.as_deref() {
        Some(path) => Config::read_file(path)?,
        None => Config::default(),
    };
    let db = config.open_db()?;
    let world = Arc::new(SyntheticWorld::new(args.seed).with_generated_radius(200));

    let mut host = HostSession::new(
        config,
        DatasetRegistry::new(db),
        world,
        LocalTransport::default(),
    )
    .with_classifier(ModeClassifier);
    let atlas = host.create_atlas()?;

    let mut observers = Vec::new();
    for i in 0..args.observers {
        let id = ObserverId(i);
        let receiver = host.channel_mut().connect(id);
        host.attach_observer(id, atlas, DimensionId(0), WorldPos::new(0.0, 0.0));
        observers.push(ObserverSession::new(id, receiver));
    }

    let mut tiles_written = 0;
    for tick in 0..args.ticks {
        // Each observer walks its own straight line out from the origin, one ground unit per tick.
        for (i, observer) in observers.iter().enumerate() {
            let angle = i as f64 * std::f64::consts::TAU / args.observers.max(1) as f64;
            let position = WorldPos::new(angle.cos() * tick as f64, angle.sin() * tick as f64);
            host.move_observer(observer.id(), DimensionId(0), position);
        }
        let report = host.tick()?;
        tiles_written += report.tiles_written;
        if let Some(save) = report.save {
            log::info!("tick {}: {:?}", report.tick, save);
        }
        for observer in observers.iter_mut() {
            observer.receive();
        }
    }
    let save = host.save()?;

    log::info!(
        "{} ticks, {} tiles written, {} scans averaging {} us",
        args.ticks,
        tiles_written,
        host.scans_completed(),
        host.average_scan_time_us()
    );
    log::info!("final save: {:?}", save);
    for observer in observers.iter() {
        let tiles = observer
            .replica()
            .atlas(atlas)
            .map_or(0, |a| a.num_tiles());
        log::info!("observer {} holds {} tiles", observer.id(), tiles);
    }
    Ok(())
}
