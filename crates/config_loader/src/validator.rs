//! Configuration validation
//!
//! Rules:
//! - field ranges (fractions in [0,1], quality 1-100, loops >= 1)
//! - fractional bounds ordered (min <= max)
//! - framerate > 0
//! - log_format is a known value

use contracts::ContractError;
use validator::Validate;

use crate::AppConfig;

/// Validate a parsed configuration
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(config: &AppConfig) -> Result<(), ContractError> {
    validate_ranges(config)?;
    validate_bounds_order(config)?;
    validate_device(config)?;
    validate_observability(config)?;
    Ok(())
}

/// Derived range checks on the settings records
fn validate_ranges(config: &AppConfig) -> Result<(), ContractError> {
    config
        .pipeline
        .filters
        .validate()
        .map_err(|e| ContractError::config_validation("pipeline.filters", e.to_string()))?;
    config
        .pipeline
        .data
        .compression
        .validate()
        .map_err(|e| ContractError::config_validation("pipeline.data.compression", e.to_string()))?;
    config
        .pipeline
        .delay
        .validate()
        .map_err(|e| ContractError::config_validation("pipeline.delay", e.to_string()))?;
    Ok(())
}

/// Fractional windows must be ordered
fn validate_bounds_order(config: &AppConfig) -> Result<(), ContractError> {
    let filters = &config.pipeline.filters;
    let pairs = [
        ("min_depth_f/max_depth_f", filters.min_depth_f, filters.max_depth_f),
        ("min_width_f/max_width_f", filters.min_width_f, filters.max_width_f),
        ("min_height_f/max_height_f", filters.min_height_f, filters.max_height_f),
    ];
    for (field, min, max) in pairs {
        if min > max {
            return Err(ContractError::config_validation(
                format!("pipeline.filters.{field}"),
                "lower bound exceeds upper bound",
            ));
        }
    }
    Ok(())
}

fn validate_device(config: &AppConfig) -> Result<(), ContractError> {
    if config.device.framerate == 0 {
        return Err(ContractError::config_validation(
            "device.framerate",
            "must be positive",
        ));
    }
    Ok(())
}

fn validate_observability(config: &AppConfig) -> Result<(), ContractError> {
    match config.observability.log_format.as_str() {
        "json" | "pretty" | "compact" => Ok(()),
        other => Err(ContractError::config_validation(
            "observability.log_format",
            format!("unknown format '{other}', expected json|pretty|compact"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        assert!(validate(&AppConfig::default()).is_ok());
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let mut config = AppConfig::default();
        config.pipeline.filters.min_depth_f = 0.8;
        config.pipeline.filters.max_depth_f = 0.2;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_quality_out_of_range_rejected() {
        let mut config = AppConfig::default();
        config.pipeline.data.compression.jpeg_quality = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_unknown_log_format_rejected() {
        let mut config = AppConfig::default();
        config.observability.log_format = "xml".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_framerate_rejected() {
        let mut config = AppConfig::default();
        config.device.framerate = 0;
        assert!(validate(&config).is_err());
    }
}
