//! Run statistics collected from the emission channels.

use std::time::Duration;

use contracts::CompressedFrame;
use observability::RunningStats;

/// Statistics from one pipeline run
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    /// Local frames received on the frame channel
    pub frames_received: u64,

    /// Compressed frames received on the compressed channel
    pub compressed_received: u64,

    /// Total compressed payload bytes
    pub compressed_bytes: u64,

    /// Valid-vertex count of the last compressed frame
    pub last_valid_vertices: usize,

    /// Total duration of the run
    pub duration: Duration,

    /// Valid-vertex statistics over the frame stream
    pub vertices_stats: RunningStats,
}

impl RunStats {
    /// Frames per second over the run
    pub fn fps(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.frames_received as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Mean compressed frame size in kilobytes
    pub fn mean_compressed_kb(&self) -> f64 {
        if self.compressed_received > 0 {
            self.compressed_bytes as f64 / self.compressed_received as f64 / 1024.0
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n=== Pipeline Run ===");
        println!("Duration: {:.2}s", self.duration.as_secs_f64());
        println!("Frames received: {}", self.frames_received);
        println!("Compressed frames received: {}", self.compressed_received);
        println!("FPS: {:.2}", self.fps());
        println!("Mean compressed size: {:.1} KiB", self.mean_compressed_kb());
        println!("Last valid-vertex count: {}", self.last_valid_vertices);
        if self.vertices_stats.count() > 0 {
            println!(
                "Valid vertices: min={:.0}, max={:.0}, mean={:.0}",
                self.vertices_stats.min(),
                self.vertices_stats.max(),
                self.vertices_stats.mean()
            );
        }
    }
}

/// Total payload bytes carried by one compressed frame
pub fn compressed_payload_bytes(frame: &CompressedFrame) -> u64 {
    (frame.color.data.len()
        + frame.depth_sized_color.data.len()
        + frame.depth.data.len()
        + frame.infra.data.len()
        + frame.cloud.coords.len()
        + frame.cloud.colors.data.len()
        + frame.bodies_id_map.data.len()
        + frame.calibration.len()
        + frame.audio.samples.len() * 4) as u64
}
