//! Processing error definitions

use contracts::ColorFormat;
use thiserror::Error;

/// Errors raised by the per-pixel engines
///
/// All of these are recoverable at the pipeline level: the cycle's output
/// buffer stays empty and the loop continues.
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// Raw color buffer does not match the mode geometry
    #[error("malformed {format:?} color buffer: expected {expected} bytes, got {actual}")]
    MalformedColorBuffer {
        format: ColorFormat,
        expected: usize,
        actual: usize,
    },

    /// Motion-JPEG payload could not be decoded
    #[error("mjpeg decode error: {0}")]
    MjpegDecode(String),

    /// Decoded image geometry differs from the mode geometry
    #[error("mjpeg geometry mismatch: expected {expected_w}x{expected_h}, got {actual_w}x{actual_h}")]
    MjpegGeometry {
        expected_w: usize,
        expected_h: usize,
        actual_w: usize,
        actual_h: usize,
    },

    /// Correlated substream buffers disagree on length
    #[error("buffer mismatch in {operation}: expected {expected} elements, got {actual}")]
    BufferMismatch {
        operation: &'static str,
        expected: usize,
        actual: usize,
    },
}
