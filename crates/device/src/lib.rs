//! # Device
//!
//! `DepthCaptureDevice` adapters. The mock adapter generates a synthetic
//! scene for tests and development; real deployments add one adapter module
//! per physical device family behind the same trait.
//!
//! Devices are explicitly constructed and owned by their pipeline; there is
//! no process-wide device registry.

mod factory;
mod mock;

pub use factory::{DeviceConfig, DeviceFactory, DeviceKind};
pub use mock::{MockDeviceConfig, MockToFDevice};
