//! Mock ToF device
//!
//! Implements `DepthCaptureDevice` with a synthetic scene: a smooth depth
//! surface with sparse sentinel holes, a gradient color image in the mode's
//! native encoding, and a pinhole unprojection model. Capture blocks for
//! one frame period, so pipelines driven by this adapter run at roughly the
//! configured framerate.

use std::thread;
use std::time::Duration;

use bytes::Bytes;
use contracts::{
    AudioFrames, BodyData, CaptureMode, ColorFormat, ContractError, DepthCaptureDevice,
    ImuSample, ModeInfo, Unprojector,
};
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder};
use nalgebra::Vector3;
use tracing::debug;

/// Mock device configuration
#[derive(Debug, Clone)]
pub struct MockDeviceConfig {
    pub mode: CaptureMode,
    pub framerate: u32,
    /// Depth of the synthetic surface at its center (mm)
    pub base_depth_mm: f32,
    /// Amplitude of the surface undulation (mm)
    pub amplitude_mm: f32,
    /// Return `Ok(false)` (timeout) every Nth capture
    pub timeout_every: Option<u64>,
    /// Fail fatally after N successful captures
    pub fail_after: Option<u64>,
}

impl Default for MockDeviceConfig {
    fn default() -> Self {
        Self {
            mode: CaptureMode::NarrowFov720p,
            framerate: 30,
            base_depth_mm: 1500.0,
            amplitude_mm: 300.0,
            timeout_every: None,
            fail_after: None,
        }
    }
}

/// Synthetic-scene depth camera
pub struct MockToFDevice {
    info: ModeInfo,
    config: MockDeviceConfig,
    captures: u64,
    has_capture: bool,
}

impl MockToFDevice {
    pub fn new(mode: CaptureMode, framerate: u32) -> Self {
        Self::with_config(MockDeviceConfig {
            mode,
            framerate,
            ..Default::default()
        })
    }

    pub fn with_config(config: MockDeviceConfig) -> Self {
        Self {
            info: config.mode.info(config.framerate),
            config,
            captures: 0,
            has_capture: false,
        }
    }

    fn focal_length(&self) -> f32 {
        self.info.depth_width.max(1) as f32
    }

    /// Synthetic surface depth for one pixel, sentinel for sparse holes
    fn scene_depth(&self, x: usize, y: usize) -> u16 {
        if (x * 31 + y * 17 + self.captures as usize) % 101 == 0 {
            return self.info.depth_sentinel;
        }
        let phase = self.captures as f32 * 0.02;
        let surface = (x as f32 * 0.05 + phase).sin() * (y as f32 * 0.05).cos();
        let depth = self.config.base_depth_mm + self.config.amplitude_mm * surface;
        let range = self.info.depth_range_mm;
        depth.clamp(range[0], range[1]) as u16
    }

    fn scene_rgb(&self, x: usize, y: usize) -> [u8; 3] {
        let w = self.info.color_width.max(1);
        let h = self.info.color_height.max(1);
        [
            (x * 255 / w) as u8,
            (y * 255 / h) as u8,
            (self.captures % 256) as u8,
        ]
    }

    fn raw_color(&self) -> Option<Bytes> {
        let (w, h) = (self.info.color_width, self.info.color_height);
        if w == 0 || h == 0 {
            return None;
        }

        let buffer = match self.info.color_format {
            ColorFormat::Bgra => {
                let mut out = Vec::with_capacity(w * h * 4);
                for y in 0..h {
                    for x in 0..w {
                        let [r, g, b] = self.scene_rgb(x, y);
                        out.extend_from_slice(&[b, g, r, 255]);
                    }
                }
                out
            }
            ColorFormat::Nv12 => {
                let mut out = Vec::with_capacity(w * h * 3 / 2);
                for y in 0..h {
                    for x in 0..w {
                        // luma from the red gradient, neutral chroma
                        out.push(self.scene_rgb(x, y)[0]);
                    }
                }
                out.resize(w * h * 3 / 2, 128);
                out
            }
            ColorFormat::Yuy2 => {
                let mut out = Vec::with_capacity(w * h * 2);
                for y in 0..h {
                    for x in (0..w).step_by(2) {
                        out.push(self.scene_rgb(x, y)[0]);
                        out.push(128);
                        out.push(self.scene_rgb((x + 1).min(w - 1), y)[0]);
                        out.push(128);
                    }
                }
                out
            }
            ColorFormat::Mjpeg => {
                let mut rgb = Vec::with_capacity(w * h * 3);
                for y in 0..h {
                    for x in 0..w {
                        rgb.extend_from_slice(&self.scene_rgb(x, y));
                    }
                }
                let mut jpeg = Vec::new();
                JpegEncoder::new_with_quality(&mut jpeg, 85)
                    .write_image(&rgb, w as u32, h as u32, ExtendedColorType::Rgb8)
                    .ok()?;
                jpeg
            }
        };
        Some(Bytes::from(buffer))
    }
}

impl Unprojector for MockToFDevice {
    fn unproject(&self, x: usize, y: usize, depth_mm: u16) -> Option<Vector3<f32>> {
        if depth_mm == self.info.depth_sentinel {
            return None;
        }
        let f = self.focal_length();
        let cx = self.info.depth_width as f32 / 2.0;
        let cy = self.info.depth_height as f32 / 2.0;
        let z = depth_mm as f32;
        Some(Vector3::new(
            (x as f32 - cx) * z / f,
            (y as f32 - cy) * z / f,
            z,
        ))
    }
}

impl DepthCaptureDevice for MockToFDevice {
    fn mode_info(&self) -> &ModeInfo {
        &self.info
    }

    fn capture(&mut self, _timeout: Duration) -> Result<bool, ContractError> {
        if let Some(limit) = self.config.fail_after {
            if self.captures >= limit {
                return Err(ContractError::device_capture(
                    "mock",
                    "simulated capture-layer failure",
                ));
            }
        }

        if self.info.framerate > 0 {
            thread::sleep(Duration::from_millis(1000 / self.info.framerate as u64));
        }
        self.captures += 1;

        if let Some(every) = self.config.timeout_every {
            if every > 0 && self.captures % every == 0 {
                debug!(capture = self.captures, "mock capture timeout");
                self.has_capture = false;
                return Ok(false);
            }
        }

        self.has_capture = true;
        Ok(true)
    }

    fn read_color(&mut self) -> Option<Bytes> {
        if !self.has_capture {
            return None;
        }
        self.raw_color()
    }

    fn read_depth(&mut self) -> Option<Vec<u16>> {
        if !self.has_capture || !self.info.has_depth() {
            return None;
        }
        let (w, h) = (self.info.depth_width, self.info.depth_height);
        let mut depth = Vec::with_capacity(w * h);
        for y in 0..h {
            for x in 0..w {
                depth.push(self.scene_depth(x, y));
            }
        }
        Some(depth)
    }

    fn read_infra(&mut self) -> Option<Vec<u16>> {
        if !self.has_capture || !self.info.has_infra() {
            return None;
        }
        let (w, h) = (self.info.infra_width, self.info.infra_height);
        let mut infra = Vec::with_capacity(w * h);
        for y in 0..h {
            for x in 0..w {
                infra.push(((x + y) * 2000 / (w + h).max(1)) as u16);
            }
        }
        Some(infra)
    }

    fn read_imu(&mut self) -> Option<ImuSample> {
        if !self.has_capture {
            return None;
        }
        let t = self.captures as f32 * 0.03;
        Some(ImuSample {
            accelerometer: [0.0, 0.0, 9.81],
            gyroscope: [t.sin() * 0.01, t.cos() * 0.01, 0.0],
            temperature: 31.0,
            acc_timestamp_ns: self.captures as i64 * 33_000_000,
            gyr_timestamp_ns: self.captures as i64 * 33_000_000,
        })
    }

    fn read_audio(&mut self) -> Option<AudioFrames> {
        if !self.has_capture {
            return None;
        }
        const CHANNELS: usize = 7;
        const FRAMES: usize = 256;
        let mut samples = Vec::with_capacity(CHANNELS * FRAMES);
        for frame in 0..FRAMES {
            let value = (frame as f32 * 0.1).sin() * 0.2;
            for _ in 0..CHANNELS {
                samples.push(value);
            }
        }
        Some(AudioFrames {
            channels: CHANNELS,
            samples,
        })
    }

    fn read_bodies(&mut self) -> Option<BodyData> {
        None
    }

    fn calibration(&self) -> Bytes {
        Bytes::from_static(b"mock-pinhole-v1")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_then_read() {
        let mut device = MockToFDevice::new(CaptureMode::NarrowFovBinned720p, 1000);
        assert!(device.read_depth().is_none());

        assert!(device.capture(Duration::from_millis(100)).unwrap());
        let depth = device.read_depth().unwrap();
        assert_eq!(depth.len(), 320 * 288);

        let range = device.mode_info().depth_range_mm;
        for &d in &depth {
            if d != device.mode_info().depth_sentinel {
                assert!((d as f32) >= range[0] && (d as f32) <= range[1]);
            }
        }
    }

    #[test]
    fn test_color_matches_mode_format() {
        let mut device = MockToFDevice::new(CaptureMode::NarrowFovBinned720p, 1000);
        device.capture(Duration::from_millis(100)).unwrap();

        // YUY2 is 2 bytes per pixel
        let color = device.read_color().unwrap();
        assert_eq!(color.len(), 1280 * 720 * 2);
    }

    #[test]
    fn test_unproject_center_is_on_axis() {
        let device = MockToFDevice::new(CaptureMode::NarrowFovBinned720p, 30);
        let p = device.unproject(160, 144, 1000).unwrap();
        assert_eq!(p, Vector3::new(0.0, 0.0, 1000.0));
        assert!(device.unproject(0, 0, 0).is_none());
    }

    #[test]
    fn test_simulated_timeout() {
        let mut device = MockToFDevice::with_config(MockDeviceConfig {
            mode: CaptureMode::NarrowFovBinned720p,
            framerate: 1000,
            timeout_every: Some(2),
            ..Default::default()
        });

        assert!(device.capture(Duration::from_millis(10)).unwrap());
        assert!(!device.capture(Duration::from_millis(10)).unwrap());
        assert!(device.read_depth().is_none());
    }

    #[test]
    fn test_simulated_fatal_failure() {
        let mut device = MockToFDevice::with_config(MockDeviceConfig {
            mode: CaptureMode::NarrowFovBinned720p,
            framerate: 1000,
            fail_after: Some(1),
            ..Default::default()
        });

        assert!(device.capture(Duration::from_millis(10)).unwrap());
        assert!(device.capture(Duration::from_millis(10)).is_err());
    }

    #[test]
    fn test_color_alignment_has_depth_geometry() {
        let mut device = MockToFDevice::new(CaptureMode::NarrowFov1080p, 1000);
        device.capture(Duration::from_millis(10)).unwrap();

        let rgba = vec![[10u8, 20, 30, 255]; 1920 * 1080];
        let mut aligned = contracts::ImageBuffer::new();
        device.align_color_to_depth(&rgba, &mut aligned);
        assert_eq!((aligned.width, aligned.height), (640, 576));
        assert_eq!(aligned.data[0], [10, 20, 30, 255]);
    }
}
