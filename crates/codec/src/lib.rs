//! # Codec
//!
//! Compression and decompression of frame buffers: a lossless block
//! bit-packing codec for integer images, a quality-parameterized image
//! codec for color buffers, the flattened colored-cloud layout and the
//! `CompressedFrame` wire format.
//!
//! Every buffer is compressed independently; a missing or empty payload
//! always yields an empty output, never an error.

mod cloud;
mod error;
mod frame_codec;
mod image_codec;
mod integer;
mod wire;

pub use cloud::{flatten_cloud, unflatten_cloud, CAMERA_BIAS_MM, WORLD_BIAS_MM};
pub use error::CodecError;
pub use frame_codec::FrameCodec;
pub use image_codec::{
    decode_gray, decode_rgb, decode_rgba, encode_gray, encode_rgb, encode_rgba, LOSSLESS_QUALITY,
};
pub use integer::{decode_u16, encode_u16};
pub use wire::{decode_frame, encode_frame};
