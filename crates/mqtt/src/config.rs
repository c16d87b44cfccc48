//! Configuration structures for the MQTT link.
//!
//! All types deserialize with serde (TOML in production) and are validated
//! with the `validator` crate, so an invalid transport section fails at
//! config load time rather than at the first connect.

use std::path::Path;

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// MQTT link configuration.
///
/// The defaults describe the production broker setup of a provisioned field
/// device: TLS on 8883, mutual authentication with device certificates, and
/// the conservative retry policy of a battery-conscious sensor.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Config {
    /// Application namespace prefixed to every topic.
    ///
    /// Data is published to `<base_topic>/farm/<farmId>/sensor/data` and
    /// commands are observed on `<base_topic>/farm/<farmId>/commands`.
    #[validate(length(
        min = 1,
        max = 255,
        message = "Base topic must be between 1 and 255 characters"
    ))]
    pub base_topic: String,

    /// Broker hostname or IP address. DNS resolution happens at connect
    /// time, not at validation time.
    #[validate(length(
        min = 1,
        max = 255,
        message = "Host must be between 1 and 255 characters"
    ))]
    pub host: String,

    /// Broker port. 8883 for MQTT over TLS, 1883 unencrypted (tests only).
    #[validate(range(min = 1, message = "Port must be between 1 and 65535"))]
    pub port: u16,

    /// Identifier presented to the broker. If empty, the device id is used;
    /// if that is also unavailable a UUID is generated.
    #[validate(length(max = 64, message = "Client ID must not exceed 64 characters"))]
    pub client_id: String,

    /// Keep-alive interval in seconds. The broker drops the session if no
    /// packet arrives for 1.5x this window, which is why the pipeline must
    /// keep calling `service()` between cycles.
    #[validate(range(
        min = 5,
        max = 3600,
        message = "Keep alive must be between 5 and 3600 seconds"
    ))]
    pub keep_alive: u64,

    /// How long to wait for CONNACK before treating a connect as failed.
    #[validate(range(
        min = 1,
        max = 300,
        message = "Connection timeout must be between 1 and 300 seconds"
    ))]
    pub connection_timeout: u64,

    /// How long to wait for PUBACK before treating a publish as failed.
    #[validate(range(
        min = 1,
        max = 300,
        message = "Ack timeout must be between 1 and 300 seconds"
    ))]
    pub ack_timeout: u64,

    /// Base delay of the retry backoff ladder, in milliseconds.
    /// Retry k waits `base * 2^k`.
    #[validate(range(
        min = 100,
        max = 60000,
        message = "Retry base delay must be between 100 and 60000 ms"
    ))]
    pub retry_base_delay_ms: u64,

    /// Maximum retries per publish. A publish makes `max_retries + 1`
    /// total tries before it is handed to the offline queue.
    #[validate(range(max = 10, message = "Max retries must be between 0 and 10"))]
    pub max_retries: u32,

    /// Optional TLS configuration. Absent means plain TCP, which is only
    /// acceptable against a local test broker.
    #[validate(nested)]
    pub tls: Option<TlsConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            base_topic: "soilcast".to_string(),
            host: "localhost".to_string(),
            port: 8883,
            client_id: String::new(),
            keep_alive: 60,
            connection_timeout: 30,
            ack_timeout: 10,
            retry_base_delay_ms: 2000,
            max_retries: 3,
            tls: None,
        }
    }
}

impl Config {
    /// Resolves the client id: configured value, else the device id,
    /// else a fresh UUID.
    pub fn effective_client_id(&self, device_id: &str) -> String {
        if !self.client_id.is_empty() {
            self.client_id.clone()
        } else if !device_id.is_empty() {
            device_id.to_string()
        } else {
            Uuid::new_v4().to_string()
        }
    }
}

/// TLS configuration for the broker session.
///
/// Paths are validated for existence at config load; the PEM contents are
/// read when the link is built.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_client_auth_pairing"))]
pub struct TlsConfig {
    /// CA certificate used to verify the broker, PEM format. Required.
    #[validate(custom(
        function = "validate_file_exists",
        message = "CA certificate file does not exist"
    ))]
    pub ca_cert_path: String,

    /// Device certificate for mutual TLS, PEM format.
    #[validate(custom(
        function = "validate_optional_file_exists",
        message = "Client certificate file does not exist"
    ))]
    pub client_cert_path: Option<String>,

    /// Device private key for mutual TLS, PEM format, unencrypted.
    /// Keep readable only by the agent user.
    #[validate(custom(
        function = "validate_optional_file_exists",
        message = "Client key file does not exist"
    ))]
    pub client_key_path: Option<String>,
}

impl TlsConfig {
    /// True when both halves of the client credential pair are present.
    pub fn has_client_auth(&self) -> bool {
        self.client_cert_path.is_some() && self.client_key_path.is_some()
    }
}

/// A half-configured credential pair is a provisioning mistake; reject it
/// at load time rather than surprising the operator at connect time.
fn validate_client_auth_pairing(tls: &TlsConfig) -> Result<(), ValidationError> {
    if tls.client_cert_path.is_some() != tls.client_key_path.is_some() {
        return Err(ValidationError::new("incomplete_client_auth")
            .with_message("Both client certificate and key must be provided or neither".into()));
    }
    Ok(())
}

fn validate_optional_file_exists(path: &str) -> Result<(), ValidationError> {
    validate_file_exists(path)
}

fn validate_file_exists(path: &str) -> Result<(), ValidationError> {
    if path.is_empty() {
        return Err(
            ValidationError::new("empty_path").with_message("File path cannot be empty".into())
        );
    }

    let path_obj = Path::new(path);
    if !path_obj.is_file() {
        return Err(ValidationError::new("file_not_found")
            .with_message(format!("File does not exist: {path}").into()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_provisioned_device() {
        let config = Config::default();
        assert_eq!(config.port, 8883);
        assert_eq!(config.retry_base_delay_ms, 2000);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.base_topic, "soilcast");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_effective_client_id_prefers_configured_value() {
        let config = Config {
            client_id: "gateway-7".into(),
            ..Default::default()
        };
        assert_eq!(config.effective_client_id("dev-1"), "gateway-7");
    }

    #[test]
    fn test_effective_client_id_falls_back_to_device_id() {
        let config = Config::default();
        assert_eq!(config.effective_client_id("dev-1"), "dev-1");
    }

    #[test]
    fn test_effective_client_id_generates_when_nothing_configured() {
        let config = Config::default();
        let id = config.effective_client_id("");
        assert!(!id.is_empty());
    }

    #[test]
    fn test_invalid_retry_bounds_rejected() {
        let config = Config {
            max_retries: 50,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            retry_base_delay_ms: 10,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tls_pairing_rejects_cert_without_key() {
        let tls = TlsConfig {
            ca_cert_path: "ca.pem".into(),
            client_cert_path: Some("client.crt".into()),
            client_key_path: None,
        };
        assert!(validate_client_auth_pairing(&tls).is_err());
        assert!(!tls.has_client_auth());
    }
}
