//! Locally-displayable frame and per-cycle raw capture output

use bytes::Bytes;
use nalgebra::Vector3;

use crate::{AudioFrames, BodyData, CaptureMode, ImageBuffer, ImuSample, Rgb8, Rgba8};

/// Colored point cloud with per-vertex normals
///
/// The three arrays are parallel; their shared length equals the cycle's
/// valid-vertex count.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    /// Vertex positions in metres
    pub vertices: Vec<Vector3<f32>>,
    /// Vertex colors in [0, 1]
    pub colors: Vec<Vector3<f32>>,
    /// Unit normals, or zero where undefined
    pub normals: Vec<Vector3<f32>>,
}

impl PointCloud {
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
        self.colors.clear();
        self.normals.clear();
    }
}

/// Ephemeral per-cycle capture output
///
/// Created by the pipeline thread from the device substream reads and
/// discarded at the end of the cycle. Absent substreams stay `None`.
#[derive(Debug, Default)]
pub struct RawFrame {
    /// Raw color bytes in the mode's [`crate::ColorFormat`]
    pub color: Option<Bytes>,
    /// Depth image, millimetres, sentinel = invalid
    pub depth: Option<Vec<u16>>,
    /// Infrared image
    pub infra: Option<Vec<u16>>,
    pub imu: Option<ImuSample>,
    pub audio: Option<AudioFrames>,
    pub bodies: Option<BodyData>,
    /// Opaque device calibration blob
    pub calibration: Bytes,
}

/// Fully derived, locally-displayable frame
///
/// Immutable once built; ownership transfers to the consumer callback.
/// Every buffer is independently optional (empty = absent for this cycle).
#[derive(Debug, Clone, Default)]
pub struct Frame {
    pub id_capture: i32,
    /// Nanoseconds since epoch, stamped right after capture
    pub after_capture_ts: i64,
    /// Defaults to `after_capture_ts`; consumers overwrite on reception
    pub received_ts: i64,
    pub mode: CaptureMode,

    /// Full-resolution RGBA color
    pub rgba_color: ImageBuffer<Rgba8>,
    /// Color mapped onto the depth geometry
    pub rgba_depth_sized_color: ImageBuffer<Rgba8>,
    /// Filtered depth, millimetres
    pub depth: ImageBuffer<u16>,
    /// Depth visualization (5-stop gradient over the mode range)
    pub rgb_depth: ImageBuffer<Rgb8>,
    /// Infrared image
    pub infra: ImageBuffer<u16>,
    /// Infra visualization (normalized grayscale)
    pub rgb_infra: ImageBuffer<Rgb8>,
    /// Gray map of per-pixel body indices
    pub gray_bodies_id_map: ImageBuffer<u8>,

    pub cloud: PointCloud,

    pub imu: Option<ImuSample>,
    pub audio: AudioFrames,
    pub body_ids: Vec<u32>,
    /// Opaque calibration blob, passed through untouched
    pub calibration: Bytes,
}

impl Frame {
    /// Valid-vertex count of this cycle
    pub fn valid_vertices(&self) -> usize {
        self.cloud.len()
    }
}
