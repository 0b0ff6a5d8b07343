//! # Processing
//!
//! Per-pixel engines of the capture pipeline: pixel adjacency indices,
//! raw-color conversion, the multi-stage depth validity filter and the
//! point-cloud reconstructor.
//!
//! The per-pixel stages are data-parallel (rayon) and never assume a pixel
//! processing order; the connected-component stage is inherently sequential
//! and runs single-threaded.

mod cloud;
mod color;
mod error;
mod filter;
mod indices;

pub use cloud::{depth_gradient_color, CloudReconstructor, DEPTH_GRADIENT};
pub use color::ColorConverter;
pub use error::ProcessingError;
pub use filter::{DepthFilterEngine, FilterReport};
pub use indices::DepthIndices;
