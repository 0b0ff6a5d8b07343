//! # Pipeline
//!
//! Orchestration of the capture-to-frame cycle: one dedicated background
//! thread per device drives capture, conversion, filtering, reconstruction
//! and encoding, then emits through two settings-gated, delay-buffered
//! output channels.

mod delay_buffer;
mod orchestrator;

pub use delay_buffer::DelayBuffer;
pub use orchestrator::{CycleStage, PipelineOrchestrator};
