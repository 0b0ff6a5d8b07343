//! Explicit device construction
//!
//! The factory is a plain, owned object: callers construct it, ask for an
//! adapter and own the result. Adding a device family means adding a
//! `DeviceKind` variant and its constructor arm here.

use contracts::{CaptureMode, ContractError, DepthCaptureDevice};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{MockDeviceConfig, MockToFDevice};

/// Supported device families
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    /// Synthetic-scene adapter for tests and development
    #[default]
    Mock,
}

/// Which device to open, and how
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub kind: DeviceKind,
    pub mode: CaptureMode,
    pub framerate: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            kind: DeviceKind::Mock,
            mode: CaptureMode::NarrowFov720p,
            framerate: 30,
        }
    }
}

/// Builds capture adapters from configuration
pub struct DeviceFactory;

impl DeviceFactory {
    /// Open the configured device
    pub fn create(config: &DeviceConfig) -> Result<Box<dyn DepthCaptureDevice>, ContractError> {
        if matches!(config.mode, CaptureMode::Invalid | CaptureMode::Merged) {
            return Err(ContractError::DeviceOpen {
                device: format!("{:?}", config.kind),
                message: format!("mode {:?} has no capture device", config.mode),
            });
        }
        if config.framerate == 0 {
            return Err(ContractError::DeviceOpen {
                device: format!("{:?}", config.kind),
                message: "framerate must be positive".into(),
            });
        }

        match config.kind {
            DeviceKind::Mock => {
                info!(mode = ?config.mode, framerate = config.framerate, "opening mock device");
                Ok(Box::new(MockToFDevice::with_config(MockDeviceConfig {
                    mode: config.mode,
                    framerate: config.framerate,
                    ..Default::default()
                })))
            }
        }
    }
}
