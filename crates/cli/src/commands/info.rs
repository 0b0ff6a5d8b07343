//! The `info` command: display the effective configuration.

use anyhow::Result;
use config_loader::{AppConfig, ConfigLoader};

use crate::cli::InfoArgs;

/// Print the effective configuration and mode geometry
pub fn run_info(args: &InfoArgs) -> Result<()> {
    let config = if args.config.exists() {
        ConfigLoader::load_from_path(&args.config)?
    } else {
        AppConfig::default()
    };

    if args.json {
        println!("{}", ConfigLoader::to_json(&config)?);
        return Ok(());
    }

    let info = config.device.mode.info(config.device.framerate);
    println!("Device: {:?} ({:?})", config.device.kind, config.device.mode);
    println!(
        "  color: {}x{} {:?}",
        info.color_width, info.color_height, info.color_format
    );
    println!(
        "  depth: {}x{}, range {:.0}-{:.0} mm",
        info.depth_width, info.depth_height, info.depth_range_mm[0], info.depth_range_mm[1]
    );
    println!("  framerate: {} fps", info.framerate);
    println!(
        "  capture timeout: {} ms",
        info.capture_timeout().as_millis()
    );

    let data = &config.pipeline.data;
    println!("Capture: color={} depth={} infra={}", data.capture.color, data.capture.depth, data.capture.infra);
    println!(
        "Generation: cloud={} depth_image={} ({:?})",
        data.generation.cloud, data.generation.depth_image, data.generation.cloud_color_mode
    );
    println!(
        "Compression: depth={} depth_sized_color={} cloud={} quality={}",
        data.compression.depth,
        data.compression.depth_sized_color,
        data.compression.cloud,
        data.compression.jpeg_quality
    );
    println!(
        "Delay: {} ms, buffer capacity {}",
        config.pipeline.delay.delay_ms, config.pipeline.delay.buffer_capacity
    );

    Ok(())
}
