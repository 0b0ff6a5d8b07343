//! Layered error definitions
//!
//! Categorized by source: config / device / processing / codec / pipeline

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Device Errors =====
    /// Device open error
    #[error("device '{device}' open error: {message}")]
    DeviceOpen { device: String, message: String },

    /// Capture-layer error (fatal, stops the pipeline loop)
    #[error("device '{device}' capture error: {message}")]
    DeviceCapture { device: String, message: String },

    /// Device disconnected
    #[error("device disconnected: {device}")]
    DeviceDisconnected { device: String },

    // ===== Processing Errors =====
    /// Unsupported or malformed raw color buffer
    #[error("color conversion error for format {format}: {message}")]
    ColorConversion { format: String, message: String },

    /// Buffer size mismatch between correlated substreams
    #[error("buffer mismatch in {operation}: expected {expected} elements, got {actual}")]
    BufferMismatch {
        operation: String,
        expected: usize,
        actual: usize,
    },

    // ===== Codec Errors =====
    /// Compression/decompression failure for one logical buffer
    #[error("codec error in {component}/{operation}: {message}")]
    Codec {
        component: String,
        operation: String,
        message: String,
    },

    // ===== Pipeline Errors =====
    /// Pipeline already running / already stopped
    #[error("pipeline state error: {message}")]
    PipelineState { message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create device capture error
    pub fn device_capture(device: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DeviceCapture {
            device: device.into(),
            message: message.into(),
        }
    }

    /// Create codec error
    pub fn codec(
        component: impl Into<String>,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Codec {
            component: component.into(),
            operation: operation.into(),
            message: message.into(),
        }
    }
}
