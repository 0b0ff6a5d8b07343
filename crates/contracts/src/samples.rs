//! Non-image capture samples: IMU, audio, body tracking

use serde::{Deserialize, Serialize};

use crate::ImageBuffer;

/// Body index map value for pixels belonging to no tracked body
pub const BODY_BACKGROUND_ID: u8 = 255;

/// One inertial sample captured alongside a frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ImuSample {
    /// Accelerometer reading (m/s²)
    pub accelerometer: [f32; 3],
    /// Gyroscope reading (rad/s)
    pub gyroscope: [f32; 3],
    /// Sensor temperature (°C)
    pub temperature: f32,
    pub acc_timestamp_ns: i64,
    pub gyr_timestamp_ns: i64,
}

/// Interleaved multi-channel audio captured during one cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioFrames {
    pub channels: usize,
    /// `frame_count * channels` interleaved samples
    pub samples: Vec<f32>,
}

impl AudioFrames {
    pub fn frame_count(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels
        }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Body-tracking output for one cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BodyData {
    /// Tracked body identifiers
    pub ids: Vec<u32>,
    /// Depth-sized gray map of per-pixel body indices
    pub id_map: ImageBuffer<u8>,
}

impl BodyData {
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty() && self.id_map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_frame_count() {
        let audio = AudioFrames {
            channels: 7,
            samples: vec![0.0; 7 * 256],
        };
        assert_eq!(audio.frame_count(), 256);

        let silent = AudioFrames::default();
        assert_eq!(silent.frame_count(), 0);
        assert!(silent.is_empty());
    }
}
