// ============================================================================
// logger.rs
// ============================================================================
//! Centralized logging configuration and initialization manager.
//!
//! The `LoggerManager` validates logging configuration and initializes the
//! global `tracing` subscriber with a console layer. It supports multiple
//! log formats, ANSI coloring, and environment-based filtering.

use thiserror::Error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer};
use validator::{Validate, ValidationErrors};

use crate::config::logger::{ConsoleConfig, LogFormat, LoggerConfig};

/// Errors that can occur during logger configuration or initialization.
#[derive(Error, Debug)]
pub enum LoggerError {
    /// General initialization failure with a descriptive message.
    #[error("Logger initialization error: {0}")]
    InitializationError(String),

    /// Validation errors from the logger configuration struct.
    #[error("Logger configuration validation error: {0}")]
    ValidationError(#[from] ValidationErrors),

    /// Failure to parse an environment-based filter directive.
    #[error("Environment filter error: {0}")]
    EnvFilterError(#[from] tracing_subscriber::filter::FromEnvError),

    /// No output layers were successfully configured.
    #[error("No logging layers were configured or successfully initialized")]
    NoLayersConfigured,
}

/// Manages logging configuration and global subscriber initialization.
pub struct LoggerManager {
    config: LoggerConfig,
}

impl LoggerManager {
    /// Creates a new `LoggerManager` and validates the provided
    /// configuration.
    ///
    /// # Errors
    ///
    /// Returns `LoggerError::ValidationError` if configuration validation
    /// fails.
    pub fn new(config: LoggerConfig) -> Result<Self, LoggerError> {
        config.validate()?;

        Ok(LoggerManager { config })
    }

    /// Initializes the global `tracing` subscriber.
    ///
    /// Must be called once at application startup before any tracing
    /// macros are used.
    ///
    /// # Errors
    ///
    /// Returns `LoggerError::NoLayersConfigured` if console output is
    /// disabled, or an initialization error if the global subscriber was
    /// already set.
    pub fn init(&mut self) -> Result<(), LoggerError> {
        if !self.config.console.enabled {
            return Err(LoggerError::NoLayersConfigured);
        }

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.config.level));

        let layer = Self::console_layer(&self.config.console, filter);

        tracing_subscriber::registry()
            .with(layer)
            .try_init()
            .map_err(|e| LoggerError::InitializationError(e.to_string()))?;

        Ok(())
    }

    /// Builds the console layer in the configured format.
    fn console_layer<S>(
        config: &ConsoleConfig,
        filter: EnvFilter,
    ) -> Box<dyn Layer<S> + Send + Sync>
    where
        S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    {
        let base = fmt::layer()
            .with_ansi(config.ansi_colors)
            .with_target(config.show_target);

        match config.format {
            LogFormat::Compact => base.compact().with_filter(filter).boxed(),
            LogFormat::Pretty => base.pretty().with_filter(filter).boxed(),
            LogFormat::Json => base.json().with_filter(filter).boxed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manager_rejects_invalid_config() {
        let config = LoggerConfig {
            level: "shout".to_string(),
            ..Default::default()
        };
        assert!(LoggerManager::new(config).is_err());
    }

    #[test]
    fn test_manager_accepts_valid_config() {
        assert!(LoggerManager::new(LoggerConfig::default()).is_ok());
    }

    #[test]
    fn test_init_with_console_disabled_fails() {
        let config = LoggerConfig {
            console: ConsoleConfig {
                enabled: false,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut manager = LoggerManager::new(config).unwrap();
        assert!(matches!(
            manager.init(),
            Err(LoggerError::NoLayersConfigured)
        ));
    }
}
