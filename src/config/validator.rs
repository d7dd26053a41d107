use crate::config::Config;
use crate::error::{Result, TracelensError, ValidationError};

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);

        Self::validate_clustering(config, &mut errors);

        Self::validate_layout(config, &mut errors);

        Self::validate_latency(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(TracelensError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != "1.0.0" {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_clustering(config: &Config, errors: &mut Vec<ValidationError>) {
        let clustering = &config.clustering;

        if clustering.max_time_window_ms <= 0 {
            errors.push(ValidationError::new(
                "clustering.max_time_window_ms",
                "Maximum time window must be greater than 0",
            ));
        }

        if clustering.time_window_ms <= 0
            || clustering.time_window_ms > clustering.max_time_window_ms
        {
            errors.push(ValidationError::new(
                "clustering.time_window_ms",
                format!(
                    "Time window must be between 1 and {} ms, got {}",
                    clustering.max_time_window_ms, clustering.time_window_ms
                ),
            ));
        }

        if let Some(bad) = clustering
            .window_options
            .iter()
            .find(|w| **w <= 0 || **w > clustering.max_time_window_ms)
        {
            errors.push(ValidationError::new(
                "clustering.window_options",
                format!("Window option out of range: {}", bad),
            ));
        }
    }

    fn validate_layout(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.layout.y_step == 0.0 || !config.layout.y_step.is_finite() {
            errors.push(ValidationError::new(
                "layout.y_step",
                "Vertical step must be a non-zero finite number",
            ));
        }
    }

    fn validate_latency(config: &Config, errors: &mut Vec<ValidationError>) {
        let latency = &config.latency;

        let mode = &latency.mode;
        if mode != "random" && mode != "fixed" {
            errors.push(ValidationError::new(
                "latency.mode",
                format!("Mode must be 'random' or 'fixed', got '{}'", mode),
            ));
        }

        if latency.min_ms < 0 || latency.min_ms >= latency.max_ms {
            errors.push(ValidationError::new(
                "latency.min_ms",
                format!(
                    "Latency range must satisfy 0 <= min < max, got {}..{}",
                    latency.min_ms, latency.max_ms
                ),
            ));
        }
    }
}
