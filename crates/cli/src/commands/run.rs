//! The `run` command: drive the pipeline against the configured device.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use config_loader::{AppConfig, ConfigLoader};
use device::DeviceFactory;
use pipeline::PipelineOrchestrator;
use tracing::{debug, info, warn};

use crate::cli::RunArgs;
use crate::stats::{compressed_payload_bytes, RunStats};

/// Load the configuration, falling back to defaults when the file is absent
fn load_config(args: &RunArgs) -> Result<AppConfig> {
    if args.config.exists() {
        ConfigLoader::load_from_path(&args.config)
            .with_context(|| format!("Failed to load {}", args.config.display()))
    } else {
        info!(path = %args.config.display(), "config file absent, using defaults");
        Ok(AppConfig::default())
    }
}

fn apply_overrides(config: &mut AppConfig, args: &RunArgs) {
    if let Some(framerate) = args.framerate {
        config.device.framerate = framerate;
    }
    if let Some(delay_ms) = args.delay_ms {
        config.pipeline.delay.delay_ms = delay_ms;
    }
}

/// Run the capture pipeline until interrupted or a limit is reached
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    let mut config = load_config(args)?;
    apply_overrides(&mut config, args);

    if args.dry_run {
        println!("Configuration OK (dry run)");
        return Ok(());
    }

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
        info!("Metrics endpoint available on port {}", args.metrics_port);
    }

    // Open the device and wire up the pipeline
    let device = DeviceFactory::create(&config.device).context("Failed to open capture device")?;
    info!(
        mode = ?config.device.mode,
        framerate = config.device.framerate,
        "Device opened"
    );

    let mut orchestrator = PipelineOrchestrator::new(device, config.pipeline.clone());

    // Emission callbacks must not block the pipeline thread; bridge them
    // into bounded channels and consume on the runtime.
    let (frame_tx, frame_rx) = async_channel::bounded(args.buffer_size);
    let (compressed_tx, compressed_rx) = async_channel::bounded(args.buffer_size);

    orchestrator.on_frame(Arc::new(move |frame| {
        if frame_tx.try_send(frame).is_err() {
            warn!("frame consumer falling behind, dropping");
        }
    }));
    orchestrator.on_compressed_frame(Arc::new(move |frame| {
        if compressed_tx.try_send(frame).is_err() {
            warn!("compressed consumer falling behind, dropping");
        }
    }));

    orchestrator.start().context("Failed to start pipeline")?;
    info!(max_frames = args.max_frames, duration_s = args.duration, "Pipeline running");

    let started = Instant::now();
    let mut stats = RunStats::default();

    let deadline = if args.duration > 0 {
        tokio::time::Instant::now() + Duration::from_secs(args.duration)
    } else {
        tokio::time::Instant::now() + Duration::from_secs(365 * 24 * 3600)
    };
    let shutdown = tokio::time::sleep_until(deadline);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            frame = frame_rx.recv() => {
                match frame {
                    Ok(frame) => {
                        stats.frames_received += 1;
                        stats.vertices_stats.push(frame.valid_vertices() as f64);
                        debug!(
                            id_capture = frame.id_capture,
                            vertices = frame.valid_vertices(),
                            "frame received"
                        );
                    }
                    Err(_) => break,
                }
            }
            compressed = compressed_rx.recv() => {
                match compressed {
                    Ok(frame) => {
                        stats.compressed_received += 1;
                        stats.compressed_bytes += compressed_payload_bytes(&frame);
                        stats.last_valid_vertices = frame.valid_vertices_count;
                    }
                    Err(_) => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupt received, shutting down");
                break;
            }
            _ = &mut shutdown => {
                info!("Run duration reached, shutting down");
                break;
            }
        }

        if args.max_frames > 0 && stats.frames_received >= args.max_frames {
            info!(frames = stats.frames_received, "Reached max frames limit");
            break;
        }
        if orchestrator.is_halted() {
            warn!("Pipeline halted after capture-layer failure");
            break;
        }
    }

    orchestrator.stop();
    stats.duration = started.elapsed();
    stats.print_summary();

    Ok(())
}
