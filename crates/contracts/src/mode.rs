//! Capture modes - named resolution/format combinations
//!
//! A mode fixes the color/depth/infra stream geometry, the raw color
//! encoding and the usable depth range for one device session.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Raw color stream encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorFormat {
    /// Planar 4:2:0 luma/chroma
    Nv12,
    /// Packed 4:2:2
    Yuy2,
    /// Motion-JPEG
    Mjpeg,
    /// Packed 8-bit BGRA
    Bgra,
}

/// Named capture mode
///
/// Each variant maps to a fixed [`ModeInfo`]. `Merged` identifies fused
/// multi-device clouds, which use a different coordinate bias on the wire
/// and carry no native image streams.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum CaptureMode {
    #[default]
    Invalid = 0,
    /// 1280x720 NV12 color, 640x576 depth/infra
    NarrowFov720p = 1,
    /// 1280x720 MJPG color, 512x512 depth/infra
    WideFov720p = 2,
    /// 1920x1080 BGRA color, 640x576 depth/infra
    NarrowFov1080p = 3,
    /// 1280x720 YUY2 color, 320x288 binned depth/infra
    NarrowFovBinned720p = 4,
    /// Fused multi-device cloud, no native streams
    Merged = 5,
}

impl CaptureMode {
    /// Decode a wire tag back into a mode
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Invalid),
            1 => Some(Self::NarrowFov720p),
            2 => Some(Self::WideFov720p),
            3 => Some(Self::NarrowFov1080p),
            4 => Some(Self::NarrowFovBinned720p),
            5 => Some(Self::Merged),
            _ => None,
        }
    }

    /// Session descriptor for this mode at the given framerate
    pub fn info(self, framerate: u32) -> ModeInfo {
        let (cw, ch, format, dw, dh, range) = match self {
            Self::Invalid => (0, 0, ColorFormat::Bgra, 0, 0, [0.0, 0.0]),
            Self::NarrowFov720p => (1280, 720, ColorFormat::Nv12, 640, 576, [500.0, 3860.0]),
            Self::WideFov720p => (1280, 720, ColorFormat::Mjpeg, 512, 512, [250.0, 2880.0]),
            Self::NarrowFov1080p => (1920, 1080, ColorFormat::Bgra, 640, 576, [500.0, 3860.0]),
            Self::NarrowFovBinned720p => (1280, 720, ColorFormat::Yuy2, 320, 288, [500.0, 5460.0]),
            Self::Merged => (0, 0, ColorFormat::Bgra, 0, 0, [0.0, 10000.0]),
        };
        ModeInfo {
            mode: self,
            color_width: cw,
            color_height: ch,
            color_format: format,
            depth_width: dw,
            depth_height: dh,
            infra_width: dw,
            infra_height: dh,
            depth_range_mm: range,
            depth_sentinel: INVALID_DEPTH_VALUE,
            framerate,
        }
    }
}

/// Reserved depth value meaning "no measurement"
pub const INVALID_DEPTH_VALUE: u16 = 0;

/// Reserved infra value written for invalidated pixels
pub const INVALID_INFRA_VALUE: u16 = 0;

/// Per-session stream descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeInfo {
    pub mode: CaptureMode,
    pub color_width: usize,
    pub color_height: usize,
    pub color_format: ColorFormat,
    pub depth_width: usize,
    pub depth_height: usize,
    pub infra_width: usize,
    pub infra_height: usize,
    /// Usable depth range [min, max] in millimetres
    pub depth_range_mm: [f32; 2],
    /// Depth value meaning "no measurement"
    pub depth_sentinel: u16,
    pub framerate: u32,
}

impl ModeInfo {
    pub fn has_color(&self) -> bool {
        self.color_width > 0 && self.color_height > 0
    }

    pub fn has_depth(&self) -> bool {
        self.depth_width > 0 && self.depth_height > 0
    }

    pub fn has_infra(&self) -> bool {
        self.infra_width > 0 && self.infra_height > 0
    }

    /// Pixel count of the color image
    pub fn color_size(&self) -> usize {
        self.color_width * self.color_height
    }

    /// Pixel count of the depth image
    pub fn depth_size(&self) -> usize {
        self.depth_width * self.depth_height
    }

    /// Pixel count of the infra image
    pub fn infra_size(&self) -> usize {
        self.infra_width * self.infra_height
    }

    /// Width of the usable depth range in millimetres
    pub fn depth_range_span(&self) -> f32 {
        self.depth_range_mm[1] - self.depth_range_mm[0]
    }

    /// Capture timeout: two frame periods at the configured framerate
    pub fn capture_timeout(&self) -> Duration {
        if self.framerate == 0 {
            return Duration::from_millis(100);
        }
        Duration::from_millis(2000 / self.framerate as u64)
    }
}
