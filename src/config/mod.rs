//! Configuration management for Tracelens
//!
//! Loads the TOML configuration, applies `TRACELENS_SECTION__KEY`
//! environment overrides and validates the result.

use crate::error::{Result, TracelensError};
use crate::extract::{Clock, FieldExtractor, LatencyFallback};
use crate::graph::Layout;
use crate::query::{SearchType, TimeRange};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod validator;

pub use validator::ConfigValidator;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    #[serde(default)]
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub clustering: ClusteringConfig,
    #[serde(default)]
    pub layout: LayoutConfig,
    #[serde(default)]
    pub latency: LatencyConfig,
    #[serde(default)]
    pub query: QueryConfig,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Where records come from when the CLI is not given `--dataset`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatasetConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Time-window clustering settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusteringConfig {
    pub time_window_ms: i64,
    pub max_time_window_ms: i64,
    /// Selectable windows offered to consumers
    pub window_options: Vec<i64>,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            time_window_ms: 300_000,
            max_time_window_ms: 600_000,
            window_options: vec![
                100, 500, 1_000, 2_000, 5_000, 10_000, 30_000, 60_000, 300_000, 600_000,
            ],
        }
    }
}

/// Graph node placement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub x: f64,
    pub y_base: f64,
    pub y_step: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        let layout = Layout::default();
        Self {
            x: layout.x,
            y_base: layout.y_base,
            y_step: layout.y_step,
        }
    }
}

impl LayoutConfig {
    pub fn to_layout(&self) -> Layout {
        Layout {
            x: self.x,
            y_base: self.y_base,
            y_step: self.y_step,
        }
    }
}

/// Placeholder latency for records without timing fields
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatencyConfig {
    pub mode: String, // "random" or "fixed"
    pub min_ms: i64,
    /// Exclusive upper bound
    pub max_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub fixed_ms: i64,
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            mode: "random".to_string(),
            min_ms: 20,
            max_ms: 220,
            seed: None,
            fixed_ms: 100,
        }
    }
}

impl LatencyConfig {
    pub fn to_fallback(&self) -> LatencyFallback {
        match (self.mode.as_str(), self.seed) {
            ("fixed", _) => LatencyFallback::fixed(self.fixed_ms),
            (_, Some(seed)) => LatencyFallback::seeded(seed, self.min_ms..self.max_ms),
            (_, None) => LatencyFallback::random(self.min_ms..self.max_ms),
        }
    }
}

/// Defaults for event and cluster queries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    pub search_type: SearchType,
    pub time_range: TimeRange,
    /// Restrict candidate events to the time range before clustering
    pub enforce_time_range: bool,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            search_type: SearchType::AccountId,
            time_range: TimeRange::TwentyFourHours,
            enforce_time_range: true,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(TracelensError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| TracelensError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        // Apply environment variable overrides
        config.apply_env_overrides();

        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| TracelensError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: TRACELENS_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("TRACELENS_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "DATASET__PATH" => {
                self.dataset.path = Some(PathBuf::from(value));
            }
            "CLUSTERING__TIME_WINDOW_MS" => {
                self.clustering.time_window_ms = parse_env(path, value)?;
            }
            "LATENCY__MODE" => {
                self.latency.mode = value.to_string();
            }
            "LATENCY__SEED" => {
                self.latency.seed = Some(parse_env(path, value)?);
            }
            "QUERY__ENFORCE_TIME_RANGE" => {
                self.query.enforce_time_range = parse_env(path, value)?;
            }
            "QUERY__TIME_RANGE" => {
                self.query.time_range = value.parse().map_err(|message| {
                    TracelensError::InvalidConfigValue {
                        path: path.to_string(),
                        message,
                    }
                })?;
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Field extractor matching the latency settings, using the system clock
    pub fn field_extractor(&self) -> FieldExtractor {
        FieldExtractor::new(self.latency.to_fallback(), Clock::System)
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            TracelensError::Config("Cannot determine config directory".to_string())
        })?;

        Ok(config_dir.join("tracelens").join("config.toml"))
    }
}

fn parse_env<T: std::str::FromStr>(path: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| TracelensError::InvalidConfigValue {
            path: path.to_string(),
            message: format!("Cannot parse '{}'", value),
        })
}

impl Default for Config {
    fn default() -> Self {
        Self {
            meta: MetaConfig {
                schema_version: "1.0.0".to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            dataset: DatasetConfig::default(),
            clustering: ClusteringConfig::default(),
            layout: LayoutConfig::default(),
            latency: LatencyConfig::default(),
            query: QueryConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.clustering.time_window_ms = 5_000;
        config.latency.seed = Some(11);
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.clustering.time_window_ms, 5_000);
        assert_eq!(loaded.latency.seed, Some(11));
        assert_eq!(loaded.query.time_range, TimeRange::TwentyFourHours);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[_meta]\nschema_version = \"1.0.0\"\n").unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.clustering.time_window_ms, 300_000);
        assert_eq!(loaded.layout.x, 250.0);
        assert!(loaded.query.enforce_time_range);
    }

    #[test]
    fn test_missing_file() {
        let result = Config::load(Path::new("/nonexistent/tracelens.toml"));
        assert!(matches!(result, Err(TracelensError::ConfigNotFound { .. })));
    }

    #[test]
    fn test_set_value_from_env() {
        let mut config = Config::default();
        config
            .set_value_from_env("CLUSTERING__TIME_WINDOW_MS", "1500")
            .unwrap();
        config.set_value_from_env("QUERY__TIME_RANGE", "7days").unwrap();
        config.set_value_from_env("LATENCY__SEED", "3").unwrap();
        assert_eq!(config.clustering.time_window_ms, 1500);
        assert_eq!(config.query.time_range, TimeRange::SevenDays);
        assert_eq!(config.latency.seed, Some(3));

        assert!(config
            .set_value_from_env("CLUSTERING__TIME_WINDOW_MS", "soon")
            .is_err());
        assert!(config.set_value_from_env("QUERY__TIME_RANGE", "1year").is_err());
    }

    #[test]
    fn test_fixed_latency_fallback() {
        let mut config = Config::default();
        config.latency.mode = "fixed".to_string();
        config.latency.fixed_ms = 77;
        assert_eq!(config.latency.to_fallback().synthesize(), 77);
    }
}
