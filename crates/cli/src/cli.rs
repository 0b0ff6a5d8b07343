//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// ToF Pipeline - depth-camera capture-to-frame processing pipeline
#[derive(Parser, Debug)]
#[command(
    name = "tof-pipeline",
    author,
    version,
    about = "Depth-camera capture-to-frame processing pipeline",
    long_about = "Captures per-frame depth/color/infrared data from a time-of-flight\n\
                  camera, filters noisy depth, reconstructs a colored point cloud and\n\
                  emits locally-displayable and compressed frames per cycle."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "TOF_PIPELINE_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "compact",
        global = true,
        env = "TOF_PIPELINE_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the capture pipeline
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration and mode information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON); defaults apply when absent
    #[arg(short, long, default_value = "pipeline.toml", env = "TOF_PIPELINE_CONFIG")]
    pub config: PathBuf,

    /// Maximum number of emitted frames before stopping (0 = unlimited)
    #[arg(long, default_value = "0", env = "TOF_PIPELINE_MAX_FRAMES")]
    pub max_frames: u64,

    /// Run duration in seconds (0 = until interrupted)
    #[arg(long, default_value = "0", env = "TOF_PIPELINE_DURATION")]
    pub duration: u64,

    /// Override the configured device framerate
    #[arg(long, env = "TOF_PIPELINE_FRAMERATE")]
    pub framerate: Option<u32>,

    /// Override the configured emission delay in milliseconds
    #[arg(long, env = "TOF_PIPELINE_DELAY_MS")]
    pub delay_ms: Option<i64>,

    /// Validate configuration and exit without running
    #[arg(long)]
    pub dry_run: bool,

    /// Consumer channel capacity
    #[arg(long, default_value = "64", env = "TOF_PIPELINE_BUFFER_SIZE")]
    pub buffer_size: usize,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "TOF_PIPELINE_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "pipeline.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "pipeline.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum LogFormat {
    /// JSON structured logs
    Json,
    /// Human-readable multi-line format
    Pretty,
    /// Compact single-line format
    Compact,
}
