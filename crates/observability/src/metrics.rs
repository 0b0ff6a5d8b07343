//! Pipeline metric collection
//!
//! Recorded once per capture cycle on the device thread; aggregation lives
//! in memory for run summaries, the raw series go to the Prometheus
//! recorder.

use metrics::{counter, gauge, histogram};

/// Record a fully processed cycle
pub fn record_cycle_processed(valid_vertices: usize, cycle_us: u64) {
    counter!("tof_pipeline_cycles_total", "outcome" => "processed").increment(1);
    gauge!("tof_pipeline_valid_vertices").set(valid_vertices as f64);
    histogram!("tof_pipeline_valid_vertices_hist").record(valid_vertices as f64);
    histogram!("tof_pipeline_cycle_us").record(cycle_us as f64);
}

/// Record an abandoned cycle (capture timeout, missing substream, ...)
pub fn record_cycle_skipped(reason: &'static str) {
    counter!("tof_pipeline_cycles_total", "outcome" => reason).increment(1);
}

/// Record one emitted frame on a channel ("frame" / "compressed")
pub fn record_frame_emitted(channel: &'static str) {
    counter!("tof_pipeline_frames_emitted_total", "channel" => channel).increment(1);
}

/// Record delay-buffer drops on a channel
pub fn record_frames_dropped(channel: &'static str, dropped: u64) {
    if dropped > 0 {
        counter!("tof_pipeline_frames_dropped_total", "channel" => channel).increment(dropped);
    }
}

/// Record one processing stage's duration
pub fn record_stage_duration_us(stage: &'static str, micros: u64) {
    histogram!("tof_pipeline_stage_us", "stage" => stage).record(micros as f64);
}

/// In-memory cycle aggregation for run summaries
#[derive(Debug, Clone, Default)]
pub struct PipelineMetricsAggregator {
    /// Fully processed cycles
    pub processed_cycles: u64,
    /// Abandoned cycles (timeouts, missing substreams)
    pub skipped_cycles: u64,
    /// Emitted local frames
    pub frames_emitted: u64,
    /// Emitted compressed frames
    pub compressed_emitted: u64,
    /// Frames dropped by delay-buffer overflow
    pub frames_dropped: u64,
    /// Valid-vertex statistics
    pub vertices_stats: RunningStats,
    /// Cycle duration statistics (microseconds)
    pub cycle_stats: RunningStats,
}

impl PipelineMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one processed cycle into the aggregate
    pub fn update_cycle(&mut self, valid_vertices: usize, cycle_us: u64) {
        self.processed_cycles += 1;
        self.vertices_stats.push(valid_vertices as f64);
        self.cycle_stats.push(cycle_us as f64);
    }

    pub fn update_skipped(&mut self) {
        self.skipped_cycles += 1;
    }

    /// Build a summary report
    pub fn summary(&self) -> MetricsSummary {
        let total = self.processed_cycles + self.skipped_cycles;
        MetricsSummary {
            processed_cycles: self.processed_cycles,
            skipped_cycles: self.skipped_cycles,
            frames_emitted: self.frames_emitted,
            compressed_emitted: self.compressed_emitted,
            frames_dropped: self.frames_dropped,
            skip_rate: if total > 0 {
                self.skipped_cycles as f64 / total as f64 * 100.0
            } else {
                0.0
            },
            valid_vertices: StatsSummary::from(&self.vertices_stats),
            cycle_us: StatsSummary::from(&self.cycle_stats),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Summary report for one run
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub processed_cycles: u64,
    pub skipped_cycles: u64,
    pub frames_emitted: u64,
    pub compressed_emitted: u64,
    pub frames_dropped: u64,
    pub skip_rate: f64,
    pub valid_vertices: StatsSummary,
    pub cycle_us: StatsSummary,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Pipeline Summary ===")?;
        writeln!(f, "Processed cycles: {}", self.processed_cycles)?;
        writeln!(
            f,
            "Skipped cycles: {} ({:.2}%)",
            self.skipped_cycles, self.skip_rate
        )?;
        writeln!(f, "Frames emitted: {}", self.frames_emitted)?;
        writeln!(f, "Compressed frames emitted: {}", self.compressed_emitted)?;
        writeln!(f, "Frames dropped: {}", self.frames_dropped)?;
        writeln!(f, "Valid vertices: {}", self.valid_vertices)?;
        writeln!(f, "Cycle time (us): {}", self.cycle_us)?;
        Ok(())
    }
}

/// Statistics summary
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count(),
            min: stats.min(),
            max: stats.max(),
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.1}, max={:.1}, mean={:.1}, std={:.1} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// Add a new value
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();

        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(v);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_update() {
        let mut aggregator = PipelineMetricsAggregator::new();

        aggregator.update_cycle(120_000, 8_000);
        aggregator.update_cycle(118_000, 9_000);
        aggregator.update_skipped();

        let summary = aggregator.summary();
        assert_eq!(summary.processed_cycles, 2);
        assert_eq!(summary.skipped_cycles, 1);
        assert!((summary.skip_rate - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(summary.valid_vertices.count, 2);
    }

    #[test]
    fn test_summary_display() {
        let mut aggregator = PipelineMetricsAggregator::new();
        aggregator.update_cycle(1000, 500);
        aggregator.frames_emitted = 10;

        let output = format!("{}", aggregator.summary());
        assert!(output.contains("Processed cycles: 1"));
        assert!(output.contains("Frames emitted: 10"));
    }
}
