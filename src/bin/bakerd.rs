//! bakerd - point cloud baker daemon
//!
//! This daemon:
//! 1. Delivers synthetic sensor bundles from a background thread
//! 2. Classifies each bundle per channel and hands frames off (most recent wins)
//! 3. Ticks at a fixed rate, loading fresh frames and baking attribute maps
//! 4. On Ctrl-C (or after --ticks), quiesces delivery and releases pending frames

use anyhow::{anyhow, Result};
use clap::Parser;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use pointcloud_baker::config::BakerConfig;
use pointcloud_baker::{
    Channel, CpuBaker, FrameHandle, IngestHandler, Pipeline, ReleaseLedger, SourceStats,
    SyntheticFrame, SyntheticSource,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Stop after this many ticks (runs until Ctrl-C when omitted).
    #[arg(long)]
    ticks: Option<u64>,
    /// Override the configured tick rate.
    #[arg(long)]
    tick_hz: Option<u32>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut cfg = BakerConfig::load()?;
    if let Some(hz) = args.tick_hz {
        cfg.tick_hz = hz;
        cfg.validate()?;
    }

    let ledger = ReleaseLedger::new();
    let mut source = SyntheticSource::new(cfg.source.clone(), ledger.clone())?;
    source.connect()?;

    let mut pipeline: Pipeline<SyntheticFrame, CpuBaker> =
        Pipeline::new(&cfg.pipeline_settings(), CpuBaker::new())?;

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || {
            stop.store(true, Ordering::SeqCst);
        })
        .expect("error setting Ctrl-C handler");
    }

    let source_url = source.settings().url.clone();
    let delivery = spawn_delivery(
        source,
        pipeline.handler(Channel::Color),
        pipeline.handler(Channel::Geometry),
        cfg.delivery_interval(),
        stop.clone(),
    )?;

    log::info!(
        "bakerd running. source={} fps={} tick_hz={} maps={}x{}",
        source_url,
        cfg.source.fps,
        cfg.tick_hz,
        cfg.map_width,
        cfg.map_height
    );

    let tick_interval = cfg.tick_interval();
    let mut last_health_log = Instant::now();
    let mut result = Ok(());

    while !stop.load(Ordering::SeqCst) {
        let started = Instant::now();

        if let Err(e) = pipeline.tick() {
            log::error!("bake failed: {}", e);
            result = Err(e);
            break;
        }

        if last_health_log.elapsed() >= Duration::from_secs(5) {
            log_health(&pipeline, &ledger);
            last_health_log = Instant::now();
        }

        if args.ticks.is_some_and(|limit| pipeline.cycle().ticks() >= limit) {
            break;
        }

        if let Some(remaining) = tick_interval.checked_sub(started.elapsed()) {
            std::thread::sleep(remaining);
        }
    }

    log::info!("shutting down, quiescing delivery...");
    stop.store(true, Ordering::SeqCst);
    let source_stats = delivery
        .join()
        .map_err(|_| anyhow!("delivery thread panicked"))?;
    log_health(&pipeline, &ledger);

    let report = pipeline.shutdown();
    log::info!(
        "delivered {} bundles from {}, baked {} ticks",
        source_stats.bundles_produced,
        source_stats.url,
        report.ticks
    );
    if ledger.is_balanced() {
        log::info!(
            "all {} frame references released",
            ledger.total_acquired()
        );
    } else {
        log::error!(
            "frame references unbalanced: {} acquired, {} released, {} outstanding",
            ledger.total_acquired(),
            ledger.total_released(),
            ledger.outstanding()
        );
    }
    result
}

fn spawn_delivery(
    mut source: SyntheticSource,
    color: IngestHandler<SyntheticFrame>,
    geometry: IngestHandler<SyntheticFrame>,
    interval: Duration,
    stop: Arc<AtomicBool>,
) -> Result<JoinHandle<SourceStats>> {
    let handle = std::thread::Builder::new()
        .name("bakerd-delivery".to_string())
        .spawn(move || {
            while !stop.load(Ordering::SeqCst) {
                let started = Instant::now();
                // Each channel's callback owns its own reference to the bundle.
                let bundle = source.next_bundle();
                let shared = bundle.retain();
                color.on_bundle(bundle);
                geometry.on_bundle(shared);

                if let Some(remaining) = interval.checked_sub(started.elapsed()) {
                    std::thread::sleep(remaining);
                }
            }
            source.stats()
        })?;
    Ok(handle)
}

fn log_health(pipeline: &Pipeline<SyntheticFrame, CpuBaker>, ledger: &ReleaseLedger) {
    for channel in Channel::ALL {
        let stats = pipeline.stats(channel);
        log::info!(
            "{}: bundles={} forwarded={} missed={} polled={} overwritten={}",
            channel,
            stats.handler.bundles,
            stats.handler.forwarded,
            stats.handler.missed,
            stats.queue.polled,
            stats.queue.overwritten
        );
    }
    let bake = pipeline.cycle().baker().stats();
    log::info!(
        "ticks={} bakes={} occupied_texels={} dropped_points={} outstanding_refs={}",
        pipeline.cycle().ticks(),
        bake.bakes,
        bake.occupied_texels,
        bake.dropped_points,
        ledger.outstanding()
    );
}
