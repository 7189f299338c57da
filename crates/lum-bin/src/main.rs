//! Lumen entrypoint: wire config, strips, the frame manager and the
//! animation service together, run demo producers, and shut everything
//! down in order on Ctrl-C.

mod demo;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Once;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use core_anim::AnimationService;
use core_config::{Config, PortKind, load_from};
use core_events::{EventBus, TaskRegistry};
use core_frame::{Frame, FramePriority, FrameSource};
use core_pixel::Color;
use core_render::{FrameManager, RenderSettings};
use core_strip::{MemoryPort, StripPort, TermPort, ZoneStrip};
use core_zone::ZoneId;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;

use demo::{Breathe, Chase};

const LOG_FILE: &str = "lumen.log";
const MANUAL_TTL: Duration = Duration::from_secs(30);

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "lumen", version, about = "Multi-zone LED frame compositor")]
struct Args {
    /// Configuration file path (overrides discovery of `lumen.toml`).
    #[arg(long = "config")]
    config: Option<PathBuf>,
    /// Override the configured render cadence.
    #[arg(long = "fps")]
    fps: Option<u32>,
    /// Force in-memory ports regardless of configuration (headless runs).
    #[arg(long = "memory")]
    memory: bool,
    /// Exit after this many seconds instead of waiting for Ctrl-C.
    #[arg(long = "duration")]
    duration: Option<u64>,
}

fn configure_logging() -> Option<WorkerGuard> {
    let file_appender = tracing_appender::rolling::never(".", LOG_FILE);
    let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
    match tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(nb_writer)
        .with_ansi(false)
        .try_init()
    {
        Ok(_) => Some(guard),
        Err(_err) => {
            // Global tracing subscriber already installed; drop guard so
            // the writer shuts down.
            None
        }
    }
}

fn install_panic_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            tracing::error!(target: "runtime.panic", ?info, "panic");
            default_panic(info);
        }));
    });
}

fn build_port(kind: PortKind, pixels: usize, row: u16) -> Box<dyn StripPort> {
    match kind {
        PortKind::Term => Box::new(TermPort::new(pixels, row)),
        PortKind::Memory => Box::new(MemoryPort::new(pixels)),
    }
}

fn spawn_event_log(bus: &EventBus, registry: &TaskRegistry) {
    let mut rx = bus.subscribe();
    let handle = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => info!(target: "runtime.events", ?event, "animation_event"),
                Err(RecvError::Lagged(missed)) => {
                    warn!(target: "runtime.events", missed, "event_log_lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
    registry.register("event-log", handle);
}

/// Kick off demo producers on whatever zones the layout actually carries.
/// The global brightness percentage is applied to the producer colors
/// here; the core never rescales pixels.
async fn start_demo(
    config: &Config,
    manager: &FrameManager,
    service: &AnimationService,
) -> Result<()> {
    let brightness = config.output.brightness;
    for layout in &config.strips {
        if let Some(span) = layout.map.span(ZoneId::Floor) {
            let color = Color::rgb(0, 120, 255).scaled(brightness);
            service
                .start(
                    ZoneId::Floor,
                    Box::new(Chase::new(ZoneId::Floor, span.len, color)),
                )
                .await;
        }
        if layout.map.contains(ZoneId::Lamp) {
            let color = Color::rgb(255, 140, 20).scaled(brightness);
            service
                .start(ZoneId::Lamp, Box::new(Breathe::new(ZoneId::Lamp, color)))
                .await;
        }
        if layout.map.contains(ZoneId::Preview) {
            let color = Color::rgb(40, 255, 90).scaled(brightness);
            service
                .start(
                    ZoneId::Preview,
                    Box::new(Breathe::new(ZoneId::Preview, color)),
                )
                .await;
        }
        // Static side zones exercise the manual submission shape.
        let mut statics = Vec::new();
        if layout.map.contains(ZoneId::Left) {
            statics.push((ZoneId::Left, Color::rgb(90, 0, 160).scaled(brightness)));
        }
        if layout.map.contains(ZoneId::Top) {
            statics.push((ZoneId::Top, Color::rgb(160, 160, 160).scaled(brightness)));
        }
        if !statics.is_empty() {
            let frame = Frame::multi(
                statics,
                FramePriority::Manual,
                FrameSource::Manual,
                MANUAL_TTL,
            )?;
            manager.submit(frame).await?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let _log_guard = configure_logging();
    install_panic_hook();
    info!(target: "runtime", "startup");

    let args = Args::parse();
    let mut config = load_from(args.config.clone())?;
    if let Some(fps) = args.fps {
        config.settings.fps = fps;
    }
    let port_kind = if args.memory {
        PortKind::Memory
    } else {
        config.output.port
    };
    info!(
        target: "runtime.startup",
        fps = config.settings.fps,
        strips = config.strips.len(),
        port = ?port_kind,
        config_override = args.config.is_some(),
        "bootstrap_complete"
    );

    let registry = Arc::new(TaskRegistry::new());
    let bus = EventBus::new();
    let settings: RenderSettings = config.settings.clone();
    let manager = FrameManager::new(settings, registry.clone());

    for (row, layout) in config.strips.iter().enumerate() {
        let port = build_port(port_kind, layout.map.pixel_count(), row as u16);
        let strip = ZoneStrip::new(layout.id, layout.map.clone(), port)?;
        manager.register_strip(strip)?;
    }

    spawn_event_log(&bus, &registry);
    manager.start();
    let service = AnimationService::new(manager.clone(), bus.clone(), registry.clone());
    start_demo(&config, &manager, &service).await?;

    match args.duration {
        Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
        None => {
            tokio::signal::ctrl_c().await?;
            info!(target: "runtime", "ctrl_c_received");
        }
    }

    service.stop_all().await;
    manager.stop().await;
    registry.shutdown(Duration::from_secs(2)).await;

    let metrics = manager.metrics();
    info!(
        target: "runtime",
        submitted = metrics.submitted,
        rendered = metrics.rendered,
        commits_skipped = metrics.commits_skipped,
        drops_expired = metrics.drops_expired,
        drops_overflow = metrics.drops_overflow,
        drain_timeouts = metrics.drain_timeouts,
        hw_failures = metrics.hw_failures,
        "shutdown_complete"
    );
    Ok(())
}
