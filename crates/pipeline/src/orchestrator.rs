//! Pipeline orchestrator - per-device capture cycle state machine
//!
//! One dedicated background thread per device. Each cycle snapshots the
//! settings under a lock, captures with a framerate-scaled timeout, runs the
//! per-pixel engines as sequential stages of data-parallel loops, and emits
//! through two independent, settings-gated, delay-buffered channels.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use codec::FrameCodec;
use contracts::{
    ColorSettings, CompressedFrame, CompressedFrameCallback, ContractError, DataSelectionSettings,
    DelaySettings, DepthCaptureDevice, FilterSettings, Frame, FrameCallback, ImageBuffer,
    ModeInfo, PipelineSettings, PointCloud, RawFrame, Rgb8, Rgba8, Unprojector,
};
use observability::{
    record_cycle_processed, record_cycle_skipped, record_frame_emitted, record_frames_dropped,
    record_stage_duration_us,
};
use processing::{
    depth_gradient_color, CloudReconstructor, ColorConverter, DepthFilterEngine, DepthIndices,
    FilterReport,
};
use rayon::prelude::*;
use tracing::{debug, error, info, warn};

use crate::DelayBuffer;

/// Stages of the per-cycle state machine, for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStage {
    Idle,
    Capturing,
    Validating,
    Converting,
    Filtering,
    Reconstructing,
    Encoding,
    Buffering,
    Emitting,
}

impl CycleStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Capturing => "capturing",
            Self::Validating => "validating",
            Self::Converting => "converting",
            Self::Filtering => "filtering",
            Self::Reconstructing => "reconstructing",
            Self::Encoding => "encoding",
            Self::Buffering => "buffering",
            Self::Emitting => "emitting",
        }
    }
}

enum CycleOutcome {
    Processed { valid_vertices: usize, cycle_us: u64 },
    Skipped(&'static str),
    Fatal,
}

fn now_ns() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}

/// Sequences the capture-to-frame cycle for one device
///
/// Stopping flips an atomic flag and joins the thread; stop latency is
/// bounded by the in-flight capture timeout. A capture-layer error halts
/// the loop permanently; construct a new orchestrator to restart.
pub struct PipelineOrchestrator {
    device: Option<Box<dyn DepthCaptureDevice>>,
    settings: Arc<Mutex<PipelineSettings>>,
    running: Arc<AtomicBool>,
    halted: Arc<AtomicBool>,
    on_frame: Option<FrameCallback>,
    on_compressed_frame: Option<CompressedFrameCallback>,
    worker: Option<JoinHandle<()>>,
}

impl PipelineOrchestrator {
    pub fn new(device: Box<dyn DepthCaptureDevice>, settings: PipelineSettings) -> Self {
        Self {
            device: Some(device),
            settings: Arc::new(Mutex::new(settings)),
            running: Arc::new(AtomicBool::new(false)),
            halted: Arc::new(AtomicBool::new(false)),
            on_frame: None,
            on_compressed_frame: None,
            worker: None,
        }
    }

    /// Register the local-frame consumer. Must be set before `start`.
    pub fn on_frame(&mut self, callback: FrameCallback) {
        self.on_frame = Some(callback);
    }

    /// Register the compressed-frame consumer. Must be set before `start`.
    pub fn on_compressed_frame(&mut self, callback: CompressedFrameCallback) {
        self.on_compressed_frame = Some(callback);
    }

    /// Spawn the device thread and start cycling
    pub fn start(&mut self) -> Result<(), ContractError> {
        if self.device.is_none() {
            return Err(ContractError::PipelineState {
                message: "device already consumed; construct a new pipeline to restart".into(),
            });
        }
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(ContractError::PipelineState {
                message: "pipeline already running".into(),
            });
        }
        self.halted.store(false, Ordering::SeqCst);

        let device = match self.device.take() {
            Some(device) => device,
            None => unreachable!("checked above"),
        };
        let mode = device.mode_info().clone();
        let buffer_capacity = self.settings_snapshot().delay.buffer_capacity;

        let worker = CycleWorker {
            device,
            mode,
            indices: DepthIndices::new(),
            converter: ColorConverter::new(),
            filter: DepthFilterEngine::new(),
            reconstructor: CloudReconstructor::new(),
            codec: FrameCodec::new(),
            frames: DelayBuffer::new(buffer_capacity),
            compressed: DelayBuffer::new(buffer_capacity),
            depth_sized_color: ImageBuffer::new(),
            cloud: PointCloud::default(),
            id_capture: 0,
            frames_dropped_seen: 0,
            compressed_dropped_seen: 0,
            on_frame: self.on_frame.clone(),
            on_compressed_frame: self.on_compressed_frame.clone(),
        };

        let running = self.running.clone();
        let halted = self.halted.clone();
        let settings = self.settings.clone();

        let handle = thread::Builder::new()
            .name("tof-pipeline".into())
            .spawn(move || worker.run(running, halted, settings))?;
        self.worker = Some(handle);
        Ok(())
    }

    /// Flip the stop flag and join the device thread
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("pipeline thread panicked");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// True after a fatal capture-layer failure stopped the loop
    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Relaxed)
    }

    pub fn set_filters_settings(&self, filters: FilterSettings) {
        self.with_settings(|s| s.filters = filters);
    }

    pub fn set_data_settings(&self, data: DataSelectionSettings) {
        self.with_settings(|s| s.data = data);
    }

    pub fn set_delay_settings(&self, delay: DelaySettings) {
        self.with_settings(|s| s.delay = delay);
    }

    pub fn set_color_settings(&self, color: ColorSettings) {
        self.with_settings(|s| s.color = color);
    }

    /// Current settings snapshot
    pub fn settings_snapshot(&self) -> PipelineSettings {
        match self.settings.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn with_settings(&self, apply: impl FnOnce(&mut PipelineSettings)) {
        match self.settings.lock() {
            Ok(mut guard) => apply(&mut guard),
            Err(poisoned) => apply(&mut poisoned.into_inner()),
        }
    }
}

impl Drop for PipelineOrchestrator {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Per-thread cycle state: device, engines and reusable buffers
struct CycleWorker {
    device: Box<dyn DepthCaptureDevice>,
    mode: ModeInfo,
    indices: DepthIndices,
    converter: ColorConverter,
    filter: DepthFilterEngine,
    reconstructor: CloudReconstructor,
    codec: FrameCodec,
    frames: DelayBuffer<Arc<Frame>>,
    compressed: DelayBuffer<Arc<CompressedFrame>>,
    depth_sized_color: ImageBuffer<Rgba8>,
    cloud: PointCloud,
    id_capture: i32,
    frames_dropped_seen: u64,
    compressed_dropped_seen: u64,
    on_frame: Option<FrameCallback>,
    on_compressed_frame: Option<CompressedFrameCallback>,
}

impl CycleWorker {
    fn run(
        mut self,
        running: Arc<AtomicBool>,
        halted: Arc<AtomicBool>,
        settings: Arc<Mutex<PipelineSettings>>,
    ) {
        info!(mode = ?self.mode.mode, framerate = self.mode.framerate, "pipeline thread started");
        self.indices
            .build(self.mode.depth_width, self.mode.depth_height);

        while running.load(Ordering::Relaxed) {
            // snapshot settings so mid-cycle changes never apply partially
            let snapshot = match settings.lock() {
                Ok(guard) => guard.clone(),
                Err(poisoned) => poisoned.into_inner().clone(),
            };

            match self.cycle(&snapshot) {
                CycleOutcome::Processed {
                    valid_vertices,
                    cycle_us,
                } => record_cycle_processed(valid_vertices, cycle_us),
                CycleOutcome::Skipped(reason) => record_cycle_skipped(reason),
                CycleOutcome::Fatal => {
                    halted.store(true, Ordering::SeqCst);
                    break;
                }
            }
        }

        running.store(false, Ordering::SeqCst);
        info!("pipeline thread stopped");
    }

    fn cycle(&mut self, settings: &PipelineSettings) -> CycleOutcome {
        let cycle_start = Instant::now();

        // Capturing
        self.device.apply_color_settings(&settings.color);
        let timeout = self.mode.capture_timeout();
        match self.device.capture(timeout) {
            Ok(true) => {}
            Ok(false) => {
                warn!(
                    stage = CycleStage::Capturing.as_str(),
                    timeout_ms = timeout.as_millis() as u64,
                    "capture timed out, abandoning cycle"
                );
                return CycleOutcome::Skipped("capture_timeout");
            }
            Err(e) => {
                error!(stage = CycleStage::Capturing.as_str(), error = %e, "capture layer failure, halting pipeline");
                return CycleOutcome::Fatal;
            }
        }
        let after_capture_ts = now_ns();

        // Validating: read enabled substreams, abort on any empty image stream
        let capture = &settings.data.capture;
        let mut raw = RawFrame::default();
        if capture.color && self.mode.has_color() {
            raw.color = self.device.read_color();
            if raw.color.is_none() {
                warn!(stage = CycleStage::Validating.as_str(), "enabled color substream empty, abandoning cycle");
                return CycleOutcome::Skipped("missing_color");
            }
        }
        if capture.depth && self.mode.has_depth() {
            raw.depth = self.device.read_depth();
            if raw.depth.is_none() {
                warn!(stage = CycleStage::Validating.as_str(), "enabled depth substream empty, abandoning cycle");
                return CycleOutcome::Skipped("missing_depth");
            }
        }
        if capture.infra && self.mode.has_infra() {
            raw.infra = self.device.read_infra();
            if raw.infra.is_none() {
                warn!(stage = CycleStage::Validating.as_str(), "enabled infra substream empty, abandoning cycle");
                return CycleOutcome::Skipped("missing_infra");
            }
        }
        if capture.imu {
            raw.imu = self.device.read_imu();
        }
        if capture.audio {
            raw.audio = self.device.read_audio();
        }
        if capture.bodies {
            raw.bodies = self.device.read_bodies();
        }
        raw.calibration = self.device.calibration();

        // Converting
        let stage_start = Instant::now();
        if let Some(color) = &raw.color {
            if let Err(e) = self.converter.convert(color, &self.mode) {
                warn!(component = "color_converter", stage = CycleStage::Converting.as_str(), error = %e, "conversion failed, cycle continues color-less");
            }
        } else {
            // a stale image must never leak into this cycle
            self.converter.reset();
        }
        self.depth_sized_color.reset();
        if !self.converter.output().is_empty() && raw.depth.is_some() {
            self.device
                .align_color_to_depth(&self.converter.output().data, &mut self.depth_sized_color);
        }
        record_stage_duration_us(
            CycleStage::Converting.as_str(),
            stage_start.elapsed().as_micros() as u64,
        );

        // Filtering
        let mut report = FilterReport {
            valid_count: 0,
            centroid_id: None,
        };
        if let Some(depth) = raw.depth.as_mut() {
            let stage_start = Instant::now();
            let color = if self.depth_sized_color.is_empty() {
                None
            } else {
                Some(self.depth_sized_color.data.as_mut_slice())
            };
            match self.filter.apply(
                &self.mode,
                &settings.filters,
                &mut self.indices,
                depth,
                color,
                raw.infra.as_deref_mut(),
            ) {
                Ok(r) => report = r,
                Err(e) => {
                    warn!(component = "depth_filter", stage = CycleStage::Filtering.as_str(), error = %e, "abandoning cycle");
                    return CycleOutcome::Skipped("filter_mismatch");
                }
            }
            record_stage_duration_us(
                CycleStage::Filtering.as_str(),
                stage_start.elapsed().as_micros() as u64,
            );
        }

        // Reconstructing
        let generation = &settings.data.generation;
        let compression = &settings.data.compression;
        self.cloud.clear();
        if generation.cloud || compression.cloud {
            if let Some(depth) = raw.depth.as_deref() {
                let stage_start = Instant::now();
                let color = if self.depth_sized_color.is_empty() {
                    None
                } else {
                    Some(self.depth_sized_color.data.as_slice())
                };
                let unprojector: &dyn Unprojector = self.device.as_ref();
                self.reconstructor.reconstruct(
                    &self.mode,
                    &self.indices,
                    depth,
                    color,
                    generation.cloud_color_mode,
                    unprojector,
                    &mut self.cloud,
                );
                record_stage_duration_us(
                    CycleStage::Reconstructing.as_str(),
                    stage_start.elapsed().as_micros() as u64,
                );
            }
        }

        let frame = self.build_frame(settings, &mut raw, after_capture_ts);

        // Encoding + Buffering + Emitting, compressed channel first
        let delay_ms = settings.delay.delay_ms;
        if compression.has_data_to_compress() && self.on_compressed_frame.is_some() {
            let stage_start = Instant::now();
            let cframe = self
                .codec
                .compress(&frame, compression, report.valid_count);
            record_stage_duration_us(
                CycleStage::Encoding.as_str(),
                stage_start.elapsed().as_micros() as u64,
            );

            self.compressed.push(after_capture_ts, Arc::new(cframe));
            let dropped = self.compressed.dropped_count() - self.compressed_dropped_seen;
            self.compressed_dropped_seen = self.compressed.dropped_count();
            record_frames_dropped("compressed", dropped);

            if let Some(ready) = self.compressed.release_ready(after_capture_ts, delay_ms) {
                if let Some(callback) = &self.on_compressed_frame {
                    callback(ready);
                    record_frame_emitted("compressed");
                }
            }
        }

        if settings.data.generation.has_data_to_generate() && self.on_frame.is_some() {
            self.frames.push(after_capture_ts, Arc::new(frame));
            let dropped = self.frames.dropped_count() - self.frames_dropped_seen;
            self.frames_dropped_seen = self.frames.dropped_count();
            record_frames_dropped("frame", dropped);

            if let Some(ready) = self.frames.release_ready(after_capture_ts, delay_ms) {
                if let Some(callback) = &self.on_frame {
                    callback(ready);
                    record_frame_emitted("frame");
                }
            }
        }

        debug!(
            stage = CycleStage::Emitting.as_str(),
            id_capture = self.id_capture,
            valid_vertices = report.valid_count,
            centroid = ?report.centroid_id,
            "cycle complete"
        );
        self.id_capture += 1;

        CycleOutcome::Processed {
            valid_vertices: report.valid_count,
            cycle_us: cycle_start.elapsed().as_micros() as u64,
        }
    }

    /// Assemble the immutable frame for both output channels.
    ///
    /// A buffer is filled when either the generation or the compression
    /// selection needs it, so the channels never starve each other.
    fn build_frame(
        &mut self,
        settings: &PipelineSettings,
        raw: &mut RawFrame,
        after_capture_ts: i64,
    ) -> Frame {
        let generation = &settings.data.generation;
        let compression = &settings.data.compression;

        let mut frame = Frame {
            id_capture: self.id_capture,
            after_capture_ts,
            received_ts: after_capture_ts,
            mode: self.mode.mode,
            ..Default::default()
        };

        if (generation.color_image || compression.color) && !self.converter.output().is_empty() {
            frame.rgba_color = self.converter.output().clone();
        }
        if (generation.depth_sized_color_image || compression.depth_sized_color)
            && !self.depth_sized_color.is_empty()
        {
            frame.rgba_depth_sized_color = self.depth_sized_color.clone();
        }

        if let Some(depth) = raw.depth.take() {
            if generation.depth || generation.depth_image || compression.depth {
                frame.depth =
                    ImageBuffer::from_data(self.mode.depth_width, self.mode.depth_height, depth);
            }
        }
        if generation.depth_image && !frame.depth.is_empty() {
            frame.rgb_depth = depth_visualization(&self.mode, &frame.depth);
        }

        if let Some(infra) = raw.infra.take() {
            if generation.infra || generation.infra_image || compression.infra {
                frame.infra =
                    ImageBuffer::from_data(self.mode.infra_width, self.mode.infra_height, infra);
            }
        }
        if generation.infra_image && !frame.infra.is_empty() {
            frame.rgb_infra = infra_visualization(&frame.infra);
        }

        if (generation.cloud || compression.cloud) && !self.cloud.is_empty() {
            frame.cloud = self.cloud.clone();
        }

        if let Some(bodies) = raw.bodies.take() {
            if generation.bodies_id_map || compression.bodies_id_map {
                frame.gray_bodies_id_map = bodies.id_map;
                frame.body_ids = bodies.ids;
            }
        }
        if generation.imu || compression.imu {
            frame.imu = raw.imu;
        }
        if let Some(audio) = raw.audio.take() {
            if generation.audio || compression.audio {
                frame.audio = audio;
            }
        }
        if (generation.calibration || compression.calibration) && !raw.calibration.is_empty() {
            frame.calibration = raw.calibration.clone();
        }

        frame
    }
}

/// 5-stop gradient visualization of a depth image; sentinel pixels go black
fn depth_visualization(mode: &ModeInfo, depth: &ImageBuffer<u16>) -> ImageBuffer<Rgb8> {
    let mut image = ImageBuffer::sized(depth.width, depth.height);
    let min = mode.depth_range_mm[0];
    let span = mode.depth_range_span();
    let sentinel = mode.depth_sentinel;

    image
        .data
        .par_iter_mut()
        .zip(depth.data.par_iter())
        .for_each(|(px, &d)| {
            if d == sentinel {
                *px = [0, 0, 0];
                return;
            }
            let c = depth_gradient_color(d as f32, min, span);
            *px = [
                (c.x * 255.0) as u8,
                (c.y * 255.0) as u8,
                (c.z * 255.0) as u8,
            ];
        });
    image
}

/// Normalized grayscale visualization of an infra image
fn infra_visualization(infra: &ImageBuffer<u16>) -> ImageBuffer<Rgb8> {
    const MAX_INFRA: f32 = 2000.0;

    let mut image = ImageBuffer::sized(infra.width, infra.height);
    image
        .data
        .par_iter_mut()
        .zip(infra.data.par_iter())
        .for_each(|(px, &v)| {
            let normalized = (v as f32).min(MAX_INFRA) / MAX_INFRA;
            let gray = (255.0 * normalized) as u8;
            *px = [gray, gray, gray];
        });
    image
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::CaptureMode;
    use device::MockToFDevice;
    use std::sync::atomic::AtomicU64;
    use std::time::Duration;

    fn wait_for(counter: &AtomicU64, at_least: u64) -> bool {
        for _ in 0..200 {
            if counter.load(Ordering::Relaxed) >= at_least {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }

    #[test]
    fn test_pipeline_emits_on_both_channels() {
        let device = MockToFDevice::new(CaptureMode::NarrowFovBinned720p, 30);
        let mut orchestrator =
            PipelineOrchestrator::new(Box::new(device), PipelineSettings::default());

        let frames = Arc::new(AtomicU64::new(0));
        let compressed = Arc::new(AtomicU64::new(0));

        let frames_seen = frames.clone();
        orchestrator.on_frame(Arc::new(move |frame| {
            assert!(!frame.depth.is_empty());
            assert_eq!(frame.cloud.vertices.len(), frame.cloud.normals.len());
            frames_seen.fetch_add(1, Ordering::Relaxed);
        }));

        let compressed_seen = compressed.clone();
        orchestrator.on_compressed_frame(Arc::new(move |cframe| {
            assert!(!cframe.depth.is_empty());
            compressed_seen.fetch_add(1, Ordering::Relaxed);
        }));

        orchestrator.start().unwrap();
        assert!(orchestrator.is_running());
        assert!(wait_for(&frames, 3));
        assert!(wait_for(&compressed, 3));
        orchestrator.stop();

        assert!(!orchestrator.is_running());
        assert!(!orchestrator.is_halted());
    }

    #[test]
    fn test_double_start_rejected() {
        let device = MockToFDevice::new(CaptureMode::NarrowFovBinned720p, 30);
        let mut orchestrator =
            PipelineOrchestrator::new(Box::new(device), PipelineSettings::default());

        orchestrator.start().unwrap();
        let device2 = MockToFDevice::new(CaptureMode::NarrowFovBinned720p, 30);
        let mut second = PipelineOrchestrator::new(Box::new(device2), PipelineSettings::default());
        second.start().unwrap();
        assert!(second.start().is_err());

        orchestrator.stop();
        second.stop();
    }

    #[test]
    fn test_settings_hot_swap() {
        let device = MockToFDevice::new(CaptureMode::NarrowFovBinned720p, 30);
        let orchestrator = PipelineOrchestrator::new(Box::new(device), PipelineSettings::default());

        let filters = FilterSettings {
            keep_largest_component: true,
            ..Default::default()
        };
        orchestrator.set_filters_settings(filters.clone());
        assert_eq!(orchestrator.settings_snapshot().filters, filters);
    }
}
