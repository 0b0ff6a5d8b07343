//! # Contracts
//!
//! Frozen interface contracts (ICD), defining inter-module data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Capture timestamps are nanoseconds since epoch (i64), stamped by the
//!   pipeline thread right after a successful capture
//! - `id_capture` increments once per completed cycle, used for ordering/diagnostics

mod compressed;
mod device;
mod error;
mod frame;
mod image;
mod mode;
mod samples;
mod settings;

pub use compressed::*;
pub use device::{CompressedFrameCallback, DepthCaptureDevice, FrameCallback, Unprojector};
pub use error::*;
pub use frame::*;
pub use image::*;
pub use mode::*;
pub use samples::*;
pub use settings::*;
