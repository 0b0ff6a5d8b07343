//! DepthCaptureDevice trait - capture hardware abstraction
//!
//! Defines a unified interface over vendor capture SDKs, decoupling the
//! pipeline from concrete device families. One adapter per physical device
//! family; the mock adapter serves tests and development.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use nalgebra::Vector3;

use crate::{
    AudioFrames, BodyData, ColorSettings, CompressedFrame, ContractError, Frame, ImageBuffer,
    ImuSample, ModeInfo, Rgba8,
};

/// Local-frame emission callback, invoked on the pipeline thread
///
/// Consumers must not block; heavy work belongs on the consumer's side of a
/// channel.
pub type FrameCallback = Arc<dyn Fn(Arc<Frame>) + Send + Sync>;

/// Compressed-frame emission callback, invoked on the pipeline thread
pub type CompressedFrameCallback = Arc<dyn Fn(Arc<CompressedFrame>) + Send + Sync>;

/// Depth pixel to 3D unprojection capability
///
/// Split from [`DepthCaptureDevice`] so that the cloud reconstructor can be
/// exercised against lightweight projection models in tests.
pub trait Unprojector: Send + Sync {
    /// Unproject one depth pixel to a 3D point in millimetres, in the
    /// device's native axis convention. `None` for pixels the calibration
    /// cannot resolve.
    fn unproject(&self, x: usize, y: usize, depth_mm: u16) -> Option<Vector3<f32>>;
}

/// Capture hardware abstraction
///
/// # Design Principles
///
/// 1. **Decoupling**: the pipeline never sees vendor SDK types
/// 2. **Pull model**: `capture` blocks up to a timeout, then substreams are
///    read conditionally; a substream read returns `None` when nothing was
///    captured for it this cycle
/// 3. **Explicit ownership**: adapters are constructed and owned by their
///    pipeline, never registered in process-wide registries
pub trait DepthCaptureDevice: Unprojector {
    /// Session descriptor for the opened mode
    fn mode_info(&self) -> &ModeInfo;

    /// Block until a capture is available or the timeout elapses.
    ///
    /// `Ok(false)` means timeout (transient, the cycle is abandoned);
    /// `Err` means a capture-layer failure (fatal, the loop stops).
    fn capture(&mut self, timeout: Duration) -> Result<bool, ContractError>;

    /// Raw color bytes of the last capture, in the mode's color format
    fn read_color(&mut self) -> Option<Bytes>;

    /// Depth image of the last capture, millimetres
    fn read_depth(&mut self) -> Option<Vec<u16>>;

    /// Infrared image of the last capture
    fn read_infra(&mut self) -> Option<Vec<u16>>;

    fn read_imu(&mut self) -> Option<ImuSample>;

    fn read_audio(&mut self) -> Option<AudioFrames>;

    fn read_bodies(&mut self) -> Option<BodyData>;

    /// Opaque calibration blob; empty when the device has none
    fn calibration(&self) -> Bytes;

    /// Push color-control settings down to the hardware
    fn apply_color_settings(&mut self, _settings: &ColorSettings) {}

    /// Map the full-resolution RGBA color image onto the depth geometry.
    ///
    /// The default is nearest-neighbour resampling; adapters whose SDK
    /// exposes a calibrated color-to-depth transform should override it.
    fn align_color_to_depth(&self, rgba: &[Rgba8], out: &mut ImageBuffer<Rgba8>) {
        let info = self.mode_info();
        if rgba.len() != info.color_size() || !info.has_depth() || !info.has_color() {
            out.reset();
            return;
        }
        out.resize(info.depth_width, info.depth_height);
        for y in 0..info.depth_height {
            let sy = y * info.color_height / info.depth_height;
            let src_row = sy * info.color_width;
            let dst_row = y * info.depth_width;
            for x in 0..info.depth_width {
                let sx = x * info.color_width / info.depth_width;
                out.data[dst_row + x] = rgba[src_row + sx];
            }
        }
    }
}
