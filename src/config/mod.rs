//! Application configuration loading, validation, and management.
//!
//! This module provides the top-level `Config` structure that aggregates
//! logging, device identity, pipeline, queue, calibration, and transport
//! configurations. It handles loading from TOML files, environment
//! overrides, and validation.
//!
//! Everything is fixed at provisioning time: the configuration is loaded
//! once at startup and is immutable thereafter — nothing in the core
//! mutates it at runtime.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::config::{
    device::{CalibrationConfig, DeviceConfig, PipelineConfig, QueueConfig, SensorPathsConfig},
    logger::LoggerConfig,
};

pub mod device;
pub mod logger;

/// Simple macros for printing timestamped messages before the tracing
/// subscriber is initialized. These are used during early configuration
/// loading.
#[macro_export]
macro_rules! print_info {
    ($($arg:tt)*) => {
        println!("{}  {} {}",
            console::style(
                time::OffsetDateTime::now_utc()
                    .format(&time::format_description::parse(
                        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]Z"
                    ).unwrap())
                    .unwrap()
            ).dim(),
            console::style("INFO").green(),
            format_args!($($arg)*)
        );
    };
}

#[macro_export]
macro_rules! print_warn {
    ($($arg:tt)*) => {
        println!("{}  {} {}",
            console::style(
                time::OffsetDateTime::now_utc()
                    .format(&time::format_description::parse(
                        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]Z"
                    ).unwrap())
                    .unwrap()
            ).dim(),
            console::style("WARN").yellow(),
            format_args!($($arg)*)
        );
    };
}

#[macro_export]
macro_rules! print_error {
    ($($arg:tt)*) => {
        println!("{}  {} {}",
            console::style(
                time::OffsetDateTime::now_utc()
                    .format(&time::format_description::parse(
                        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]Z"
                    ).unwrap())
                    .unwrap()
            ).dim(),
            console::style("ERROR").red(),
            format_args!($($arg)*)
        );
    };
}

/// Errors that can occur during configuration loading, parsing, or
/// validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Generic configuration-related error with a descriptive message.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error while accessing configuration files.
    #[error("IO error while reading configuration: {0}")]
    IoError(#[from] std::io::Error),

    /// Failure to parse the TOML configuration file.
    #[error("Parse error while reading configuration: {0}")]
    ParseError(String),

    /// Validation failure after successful parsing.
    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Top-level application configuration.
#[derive(Serialize, Deserialize, Debug, Validate, Clone, Default)]
#[serde(default)]
pub struct Config {
    /// Logging subsystem configuration.
    #[validate(nested)]
    pub logger: LoggerConfig,

    /// Farm and device identity.
    #[validate(nested)]
    pub device: DeviceConfig,

    /// Acquisition cycle timing.
    #[validate(nested)]
    pub pipeline: PipelineConfig,

    /// Offline queue bounds and backing file.
    #[validate(nested)]
    pub queue: QueueConfig,

    /// Soil-moisture probe calibration endpoints.
    #[validate(nested)]
    pub calibration: CalibrationConfig,

    /// Sensor channel paths read each cycle.
    #[validate(nested)]
    pub sensors: SensorPathsConfig,

    /// MQTT transport configuration.
    #[validate(nested)]
    pub transport: TransportConfig,
}

pub type TransportConfig = soilcast_mqtt::Config;

impl Config {
    /// Constructs a new configuration by locating and loading the config
    /// file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the configuration file cannot be found,
    /// read, parsed, or validated.
    pub fn new() -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path()?;
        Self::load(&config_path)
    }

    /// Determines the configuration file path.
    ///
    /// Priority:
    /// 1. `SOILCAST_CONFIG` environment variable
    /// 2. `/etc/soilcast/config.toml`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Config` if no suitable file is found.
    fn get_config_path() -> Result<PathBuf, ConfigError> {
        if let Ok(config_path) = std::env::var("SOILCAST_CONFIG") {
            let path = PathBuf::from(config_path);
            print_info!("Using config from SOILCAST_CONFIG: {}", path.display());
            return Ok(path);
        }

        let fallback = Path::new("/etc/soilcast/config.toml");
        if fallback.exists() {
            print_info!("Using default config path: {}", fallback.display());
            return Ok(fallback.to_path_buf());
        }

        Err(ConfigError::Config(
            "No configuration file found.".to_string(),
        ))
    }

    /// Loads and validates configuration from the specified path.
    ///
    /// # Errors
    ///
    /// Propagates IO, parsing, and validation errors as `ConfigError`.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        print_info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(ConfigError::Config(path.to_string_lossy().to_string()));
        }

        let config_str = fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&config_str).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        print_info!("Successfully loaded config from: {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid_once_identity_is_set() {
        // A blank device identity is the one thing provisioning must fill
        // in; everything else has working defaults.
        let config = Config::default();
        assert!(config.validate().is_err());

        let config = Config {
            device: DeviceConfig {
                farm_id: "F1".into(),
                device_id: "D1".into(),
            },
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_minimal_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
            [device]
            farm_id = "farm-42"
            device_id = "dev-a1b2"

            [transport]
            host = "broker.example.com"
            "#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.device.farm_id, "farm-42");
        assert_eq!(config.transport.host, "broker.example.com");
        // Untouched sections keep their defaults.
        assert_eq!(config.queue.capacity, 100);
        assert_eq!(config.pipeline.reading_interval_ms, 900_000);
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
            [device]
            farm_id = "F1"
            device_id = "D1"

            [queue]
            capacity = 0
            "#,
        )
        .unwrap();

        assert!(matches!(
            Config::load(&path),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(Config::load(Path::new("/nonexistent/config.toml")).is_err());
    }
}
