//! Codec error definitions

use thiserror::Error;

/// Errors raised while compressing or decompressing one logical buffer
#[derive(Debug, Error)]
pub enum CodecError {
    /// Payload ends before the declared content
    #[error("truncated payload while reading {context}")]
    Truncated { context: &'static str },

    /// Image codec failure
    #[error("image codec error in {operation}: {message}")]
    Image {
        operation: &'static str,
        message: String,
    },

    /// Integer codec structural failure
    #[error("integer codec error: {message}")]
    Integer { message: String },

    /// Decoded buffer disagrees with its declared geometry
    #[error("geometry mismatch in {context}: expected {expected} elements, got {actual}")]
    Geometry {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Unknown enum tag on the wire
    #[error("unknown {field} tag: {value}")]
    UnknownTag { field: &'static str, value: u8 },
}
