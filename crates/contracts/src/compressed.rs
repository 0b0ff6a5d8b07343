//! Wire/storage frame form
//!
//! Every payload is independently present or absent; an empty buffer means
//! "not produced this cycle" and is never an error for consumers.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{AudioFrames, CaptureMode, ImuSample};

/// How one logical buffer was compressed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum CompressionMode {
    /// Raw bytes, no codec applied
    #[default]
    None = 0,
    /// Quality-parameterized image codec (JPEG, or lossless PNG at quality 100)
    ImageCodec = 1,
    /// Lossless block bit-packing codec for u16 arrays
    IntegerCodec = 2,
}

impl CompressionMode {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            1 => Some(Self::ImageCodec),
            2 => Some(Self::IntegerCodec),
            _ => None,
        }
    }
}

/// One compressed image payload with its geometry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompressedImage {
    pub width: usize,
    pub height: usize,
    pub mode: CompressionMode,
    pub data: Vec<u8>,
}

impl CompressedImage {
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn reset(&mut self) {
        self.width = 0;
        self.height = 0;
        self.mode = CompressionMode::None;
        self.data.clear();
    }
}

/// Flattened colored cloud: bit-packed coordinate planes plus an image-codec
/// color plane reshaped into a synthetic rectangle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompressedCloud {
    /// XXYYZZ u16 planes through the integer codec
    pub coords: Vec<u8>,
    /// RGB plane through the image codec
    pub colors: CompressedImage,
}

impl CompressedCloud {
    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    pub fn reset(&mut self) {
        self.coords.clear();
        self.colors.reset();
    }
}

/// Compactly-compressed wire/storage frame
#[derive(Debug, Clone, Default)]
pub struct CompressedFrame {
    pub id_capture: i32,
    pub after_capture_ts: i64,
    pub received_ts: i64,
    pub mode: CaptureMode,
    /// Pixels surviving all filter stages this cycle
    pub valid_vertices_count: usize,
    /// Opaque calibration blob, uncompressed
    pub calibration: Bytes,

    pub color: CompressedImage,
    pub depth_sized_color: CompressedImage,
    pub depth: CompressedImage,
    pub infra: CompressedImage,
    pub cloud: CompressedCloud,
    pub bodies_id_map: CompressedImage,

    pub imu: Option<ImuSample>,
    pub audio: AudioFrames,
    pub body_ids: Vec<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compression_mode_roundtrip() {
        for mode in [
            CompressionMode::None,
            CompressionMode::ImageCodec,
            CompressionMode::IntegerCodec,
        ] {
            assert_eq!(CompressionMode::from_u8(mode as u8), Some(mode));
        }
        assert_eq!(CompressionMode::from_u8(3), None);
    }

    #[test]
    fn test_empty_payloads() {
        let frame = CompressedFrame::default();
        assert!(frame.color.is_empty());
        assert!(frame.cloud.is_empty());
        assert_eq!(frame.valid_vertices_count, 0);
    }
}
