//! # Integration Tests
//!
//! Cross-crate and end-to-end tests.
//!
//! Covers:
//! - the full mock-device pipeline (capture -> filter -> cloud -> codecs -> emission)
//! - frame invariants across module boundaries
//! - wire round trips of emitted compressed frames

#[cfg(test)]
mod e2e_tests {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;

    use codec::{decode_frame, decode_u16, encode_frame};
    use contracts::{
        CaptureMode, CompressedFrame, CompressionSelection, Frame, PipelineSettings,
    };
    use device::{DeviceConfig, DeviceFactory, MockDeviceConfig, MockToFDevice};
    use pipeline::PipelineOrchestrator;

    fn fast_settings() -> PipelineSettings {
        let mut settings = PipelineSettings::default();
        settings.data.capture.infra = true;
        settings.data.capture.imu = true;
        settings.data.generation.infra = true;
        settings.data.generation.infra_image = true;
        settings.data.compression = CompressionSelection {
            color: false,
            depth_sized_color: true,
            depth: true,
            infra: true,
            cloud: true,
            imu: true,
            calibration: true,
            ..Default::default()
        };
        settings
    }

    fn wait_for(counter: &AtomicU64, at_least: u64, timeout: Duration) -> bool {
        let start = std::time::Instant::now();
        while start.elapsed() < timeout {
            if counter.load(Ordering::Relaxed) >= at_least {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    /// End-to-end: MockToFDevice -> PipelineOrchestrator -> both channels
    ///
    /// Checks the full data flow:
    /// 1. mock device produces synthetic depth/color/infra
    /// 2. the orchestrator filters, reconstructs and encodes per cycle
    /// 3. both emission channels deliver frames honoring the invariants
    #[test]
    fn test_e2e_mock_pipeline() {
        let device = MockToFDevice::with_config(MockDeviceConfig {
            mode: CaptureMode::NarrowFovBinned720p,
            framerate: 60,
            ..Default::default()
        });

        let mut orchestrator =
            PipelineOrchestrator::new(Box::new(device), fast_settings());

        let frames: Arc<Mutex<Vec<Arc<Frame>>>> = Arc::new(Mutex::new(Vec::new()));
        let frame_count = Arc::new(AtomicU64::new(0));
        let compressed: Arc<Mutex<Vec<Arc<CompressedFrame>>>> = Arc::new(Mutex::new(Vec::new()));
        let compressed_count = Arc::new(AtomicU64::new(0));

        let frames_sink = frames.clone();
        let frame_counter = frame_count.clone();
        orchestrator.on_frame(Arc::new(move |frame| {
            frames_sink.lock().unwrap().push(frame);
            frame_counter.fetch_add(1, Ordering::Relaxed);
        }));

        let compressed_sink = compressed.clone();
        let compressed_counter = compressed_count.clone();
        orchestrator.on_compressed_frame(Arc::new(move |frame| {
            compressed_sink.lock().unwrap().push(frame);
            compressed_counter.fetch_add(1, Ordering::Relaxed);
        }));

        orchestrator.start().unwrap();
        assert!(wait_for(&frame_count, 5, Duration::from_secs(10)));
        assert!(wait_for(&compressed_count, 5, Duration::from_secs(10)));
        orchestrator.stop();
        assert!(!orchestrator.is_halted());

        let frames = frames.lock().unwrap();
        let info = CaptureMode::NarrowFovBinned720p.info(60);
        for frame in frames.iter() {
            // depth, depth-sized color and infra share the depth geometry
            assert_eq!(frame.depth.len(), info.depth_size());
            if !frame.rgba_depth_sized_color.is_empty() {
                assert_eq!(frame.rgba_depth_sized_color.len(), info.depth_size());
            }
            if !frame.infra.is_empty() {
                assert_eq!(frame.infra.len(), info.depth_size());
            }

            // cloud arrays are parallel and sized to the surviving pixels
            let survivors = frame
                .depth
                .data
                .iter()
                .filter(|&&d| d != info.depth_sentinel)
                .count();
            assert_eq!(frame.cloud.len(), survivors);
            assert_eq!(frame.cloud.colors.len(), survivors);
            assert_eq!(frame.cloud.normals.len(), survivors);
        }

        // capture ids increase monotonically across emitted frames
        for pair in frames.windows(2) {
            assert!(pair[1].id_capture > pair[0].id_capture);
        }

        let compressed = compressed.lock().unwrap();
        for cframe in compressed.iter() {
            assert_eq!(cframe.mode, CaptureMode::NarrowFovBinned720p);
            assert!(!cframe.depth.is_empty());
            assert_eq!(cframe.calibration.as_ref(), b"mock-pinhole-v1");

            // compressed depth decodes back to the full geometry
            let depth = decode_u16(&cframe.depth.data).unwrap();
            assert_eq!(depth.len(), info.depth_size());
            let survivors = depth.iter().filter(|&&d| d != info.depth_sentinel).count();
            assert_eq!(cframe.valid_vertices_count, survivors);
        }
    }

    /// Emitted compressed frames survive the wire layout byte-for-byte
    #[test]
    fn test_e2e_wire_roundtrip() {
        let device = MockToFDevice::with_config(MockDeviceConfig {
            mode: CaptureMode::NarrowFovBinned720p,
            framerate: 60,
            ..Default::default()
        });
        let mut orchestrator = PipelineOrchestrator::new(Box::new(device), fast_settings());

        let captured: Arc<Mutex<Option<Arc<CompressedFrame>>>> = Arc::new(Mutex::new(None));
        let count = Arc::new(AtomicU64::new(0));
        let sink = captured.clone();
        let counter = count.clone();
        orchestrator.on_compressed_frame(Arc::new(move |frame| {
            sink.lock().unwrap().replace(frame);
            counter.fetch_add(1, Ordering::Relaxed);
        }));

        orchestrator.start().unwrap();
        assert!(wait_for(&count, 1, Duration::from_secs(10)));
        orchestrator.stop();

        let cframe = captured.lock().unwrap().take().unwrap();
        let bytes = encode_frame(&cframe);
        let decoded = decode_frame(&bytes).unwrap();

        assert_eq!(decoded.id_capture, cframe.id_capture);
        assert_eq!(decoded.valid_vertices_count, cframe.valid_vertices_count);
        assert_eq!(decoded.depth, cframe.depth);
        assert_eq!(decoded.cloud, cframe.cloud);
        assert_eq!(decoded.imu, cframe.imu);
    }

    /// A fatal capture-layer failure halts the loop; restart needs a new pipeline
    #[test]
    fn test_e2e_fatal_capture_halts() {
        let device = MockToFDevice::with_config(MockDeviceConfig {
            mode: CaptureMode::NarrowFovBinned720p,
            framerate: 500,
            fail_after: Some(3),
            ..Default::default()
        });
        let mut orchestrator =
            PipelineOrchestrator::new(Box::new(device), PipelineSettings::default());
        orchestrator.start().unwrap();

        let start = std::time::Instant::now();
        while !orchestrator.is_halted() && start.elapsed() < Duration::from_secs(10) {
            thread::sleep(Duration::from_millis(10));
        }
        assert!(orchestrator.is_halted());

        orchestrator.stop();
        assert!(orchestrator.start().is_err());
    }

    /// Capture timeouts are transient: the loop skips and keeps producing
    #[test]
    fn test_e2e_timeout_is_transient() {
        let device = MockToFDevice::with_config(MockDeviceConfig {
            mode: CaptureMode::NarrowFovBinned720p,
            framerate: 200,
            timeout_every: Some(3),
            ..Default::default()
        });
        let mut orchestrator =
            PipelineOrchestrator::new(Box::new(device), PipelineSettings::default());

        let count = Arc::new(AtomicU64::new(0));
        let counter = count.clone();
        orchestrator.on_frame(Arc::new(move |_| {
            counter.fetch_add(1, Ordering::Relaxed);
        }));

        orchestrator.start().unwrap();
        assert!(wait_for(&count, 6, Duration::from_secs(10)));
        orchestrator.stop();
        assert!(!orchestrator.is_halted());
    }

    /// Emission honors the configured delay
    #[test]
    fn test_e2e_delay_holds_frames_back() {
        let device = MockToFDevice::with_config(MockDeviceConfig {
            mode: CaptureMode::NarrowFovBinned720p,
            framerate: 100,
            ..Default::default()
        });

        let mut settings = PipelineSettings::default();
        settings.delay.delay_ms = 10_000;
        let mut orchestrator = PipelineOrchestrator::new(Box::new(device), settings);

        let count = Arc::new(AtomicU64::new(0));
        let counter = count.clone();
        orchestrator.on_frame(Arc::new(move |_| {
            counter.fetch_add(1, Ordering::Relaxed);
        }));

        orchestrator.start().unwrap();
        thread::sleep(Duration::from_millis(300));
        orchestrator.stop();

        // nothing can age past a 10 s delay inside 300 ms
        assert_eq!(count.load(Ordering::Relaxed), 0);
    }

    /// Factory-built devices plug into the same pipeline path
    #[test]
    fn test_factory_device_runs() {
        let config = DeviceConfig {
            mode: CaptureMode::NarrowFovBinned720p,
            framerate: 100,
            ..Default::default()
        };
        let device = DeviceFactory::create(&config).unwrap();
        let mut orchestrator =
            PipelineOrchestrator::new(device, PipelineSettings::default());

        let count = Arc::new(AtomicU64::new(0));
        let counter = count.clone();
        orchestrator.on_frame(Arc::new(move |_| {
            counter.fetch_add(1, Ordering::Relaxed);
        }));

        orchestrator.start().unwrap();
        assert!(wait_for(&count, 2, Duration::from_secs(10)));
        orchestrator.stop();
    }
}

#[cfg(test)]
mod engine_tests {
    use std::time::Duration;

    use contracts::{CaptureMode, CloudColorMode, DepthCaptureDevice, FilterSettings, PointCloud};
    use device::MockToFDevice;
    use processing::{CloudReconstructor, DepthFilterEngine, DepthIndices};

    /// Filter + reconstruct straight over mock-device output, no orchestrator
    #[test]
    fn test_filtered_mock_depth_reconstructs_in_range() {
        let mut device = MockToFDevice::new(CaptureMode::NarrowFovBinned720p, 1000);
        assert!(device.capture(Duration::from_millis(50)).unwrap());
        let mut depth = device.read_depth().unwrap();

        let info = device.mode_info().clone();
        let mut indices = DepthIndices::new();
        indices.build(info.depth_width, info.depth_height);

        let settings = FilterSettings {
            min_depth_f: 0.1,
            max_depth_f: 0.9,
            keep_largest_component: true,
            ..Default::default()
        };
        let report = DepthFilterEngine::new()
            .apply(&info, &settings, &mut indices, &mut depth, None, None)
            .unwrap();
        assert!(report.valid_count > 0);

        let mut cloud = PointCloud::default();
        CloudReconstructor::new().reconstruct(
            &info,
            &indices,
            &depth,
            None,
            CloudColorMode::DepthGradient,
            &device,
            &mut cloud,
        );

        assert_eq!(cloud.len(), report.valid_count);
        let span = info.depth_range_span();
        let min_m = (info.depth_range_mm[0] + 0.1 * span) * 1e-3;
        let max_m = (info.depth_range_mm[0] + 0.9 * span) * 1e-3;
        for v in &cloud.vertices {
            assert!(v.z >= min_m - 1e-3 && v.z <= max_m + 1e-3, "z = {}", v.z);
        }
    }
}

#[cfg(test)]
mod config_tests {
    use config_loader::{ConfigFormat, ConfigLoader};

    #[test]
    fn test_config_feeds_pipeline_settings() {
        let toml = r#"
[device]
mode = "wide_fov720p"
framerate = 15

[pipeline.filters]
keep_largest_component = true
erosion_enabled = true
erosion_loops = 2

[pipeline.data.compression]
cloud = true
jpeg_quality = 90
"#;
        let config = ConfigLoader::load_from_str(toml, ConfigFormat::Toml).unwrap();
        assert!(config.pipeline.filters.keep_largest_component);
        assert_eq!(config.pipeline.filters.erosion_loops, 2);
        assert_eq!(config.pipeline.data.compression.jpeg_quality, 90);
        assert_eq!(config.device.framerate, 15);
    }
}
