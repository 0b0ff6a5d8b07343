//! # Config Loader
//!
//! Pipeline configuration loading and parsing.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Validate configuration legality
//! - Produce the [`AppConfig`] consumed by the CLI
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let config = ConfigLoader::load_from_path(Path::new("pipeline.toml")).unwrap();
//! println!("Mode: {:?}", config.device.mode);
//! ```

mod parser;
mod validator;

use std::path::Path;

use contracts::{ContractError, PipelineSettings};
use device::DeviceConfig;
use serde::{Deserialize, Serialize};

pub use parser::ConfigFormat;

/// Observability section of the config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilitySection {
    /// "json" | "pretty" | "compact"
    pub log_format: String,
    /// Prometheus port (None = disabled)
    pub metrics_port: Option<u16>,
    /// Default log level when RUST_LOG is unset
    pub log_level: String,
}

impl Default for ObservabilitySection {
    fn default() -> Self {
        Self {
            log_format: "compact".to_string(),
            metrics_port: None,
            log_level: "info".to_string(),
        }
    }
}

/// Full application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub device: DeviceConfig,
    pub pipeline: PipelineSettings,
    pub observability: ObservabilitySection,
}

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<AppConfig, ContractError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load configuration from string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(content: &str, format: ConfigFormat) -> Result<AppConfig, ContractError> {
        let config = parser::parse(content, format)?;
        validator::validate(&config)?;
        Ok(config)
    }

    /// Serialize a configuration to TOML
    pub fn to_toml(config: &AppConfig) -> Result<String, ContractError> {
        toml::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize a configuration to JSON
    pub fn to_json(config: &AppConfig) -> Result<String, ContractError> {
        serde_json::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    /// Infer configuration format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }

    /// Read configuration file content
    fn read_file(path: &Path) -> Result<String, ContractError> {
        Ok(std::fs::read_to_string(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_TOML: &str = r#"
[device]
kind = "mock"
mode = "narrow_fov_binned720p"
framerate = 15

[pipeline.filters]
min_depth_f = 0.1
max_depth_f = 0.9

[pipeline.delay]
delay_ms = 50
"#;

    #[test]
    fn test_load_minimal_toml() {
        let config = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        assert_eq!(config.device.framerate, 15);
        assert_eq!(config.pipeline.delay.delay_ms, 50);
        assert!((config.pipeline.filters.min_depth_f - 0.1).abs() < 1e-6);
        // unspecified sections fall back to defaults
        assert!(config.pipeline.data.capture.depth);
    }

    #[test]
    fn test_empty_config_is_all_defaults() {
        let config = ConfigLoader::load_from_str("", ConfigFormat::Toml).unwrap();
        assert_eq!(config.observability.log_format, "compact");
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = AppConfig::default();
        let toml = ConfigLoader::to_toml(&config).unwrap();
        let back = ConfigLoader::load_from_str(&toml, ConfigFormat::Toml).unwrap();
        assert_eq!(back.pipeline, config.pipeline);
    }

    #[test]
    fn test_unknown_extension_rejected() {
        assert!(ConfigLoader::load_from_path(Path::new("pipeline.yaml")).is_err());
    }
}
