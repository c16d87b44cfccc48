//! Message construction: canonical payload, integrity digest, final bytes.
//!
//! A message is the wire form of one valid reading. Construction is
//! deterministic so a downstream verifier can recompute the digest:
//!
//! 1. the timestamp is formatted as ISO-8601 UTC (`YYYY-MM-DDTHH:MM:SSZ`);
//! 2. every numeric field is formatted with exactly two fractional digits;
//! 3. the canonical payload is serialized with a fixed key order —
//!    `farmId`, `deviceId`, `timestamp`, then the `readings` object;
//! 4. SHA-256 is computed over the payload's exact bytes;
//! 5. the lowercase hex digest is re-embedded as a trailing top-level
//!    `hash` field to produce the final message.
//!
//! The digest is computed strictly before the `hash` field exists in the
//! serialized form. Key order is pinned by struct field declaration order,
//! which serde preserves — reordering the fields below would silently
//! change every digest, so don't.

use serde::Serialize;
use sha2::{Digest, Sha256};
use time::{macros::format_description, OffsetDateTime};

use super::reading::Reading;

/// Errors from message construction.
///
/// Construction only fails on a timestamp the calendar cannot represent;
/// the pipeline treats that as a precondition violation, logs it, and
/// skips the cycle.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// The epoch value does not map to a representable UTC date.
    #[error("timestamp {0} is outside the representable range")]
    TimestampOutOfRange(u64),

    /// Timestamp formatting failed.
    #[error("failed to format timestamp: {0}")]
    Format(#[from] time::error::Format),

    /// Payload serialization failed.
    #[error("failed to serialize payload: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Field order here is the canonical key order of the wire format.
#[derive(Serialize)]
struct WirePayload<'a> {
    #[serde(rename = "farmId")]
    farm_id: &'a str,
    #[serde(rename = "deviceId")]
    device_id: &'a str,
    timestamp: &'a str,
    readings: &'a WireReadings,
}

#[derive(Serialize)]
struct WireReadings {
    #[serde(rename = "soilMoisture")]
    soil_moisture: String,
    #[serde(rename = "soilTemperature")]
    soil_temperature: String,
    #[serde(rename = "airTemperature")]
    air_temperature: String,
    humidity: String,
}

/// The payload again, with the digest appended as the final field.
#[derive(Serialize)]
struct WireMessage<'a> {
    #[serde(rename = "farmId")]
    farm_id: &'a str,
    #[serde(rename = "deviceId")]
    device_id: &'a str,
    timestamp: &'a str,
    readings: &'a WireReadings,
    hash: &'a str,
}

/// A finished, sealed message. Immutable: it is transmitted or queued
/// verbatim as opaque bytes and never re-parsed or re-serialized.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    bytes: String,
    hash: String,
}

impl Message {
    /// The final wire bytes, UTF-8 JSON including the `hash` field.
    pub fn as_bytes(&self) -> &[u8] {
        self.bytes.as_bytes()
    }

    /// The wire form as text, for logging.
    pub fn as_str(&self) -> &str {
        &self.bytes
    }

    /// The embedded integrity digest, 64 lowercase hex characters.
    pub fn hash(&self) -> &str {
        &self.hash
    }
}

/// Builds sealed messages for one device identity.
pub struct MessageBuilder {
    farm_id: String,
    device_id: String,
}

impl MessageBuilder {
    pub fn new(farm_id: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            farm_id: farm_id.into(),
            device_id: device_id.into(),
        }
    }

    /// Builds the sealed message for a valid reading.
    ///
    /// Callers must not pass an invalid reading; the pipeline's validity
    /// gate guarantees this.
    pub fn build(&self, reading: &Reading) -> Result<Message, BuildError> {
        debug_assert!(reading.is_valid(), "caller must gate on reading validity");

        let timestamp = format_iso8601(reading.timestamp)?;
        let readings = WireReadings {
            soil_moisture: format_fixed(reading.soil_moisture),
            soil_temperature: format_fixed(reading.soil_temperature),
            air_temperature: format_fixed(reading.air_temperature),
            humidity: format_fixed(reading.humidity),
        };

        let payload = serde_json::to_string(&WirePayload {
            farm_id: &self.farm_id,
            device_id: &self.device_id,
            timestamp: &timestamp,
            readings: &readings,
        })?;

        let hash = hex::encode(Sha256::digest(payload.as_bytes()));

        let bytes = serde_json::to_string(&WireMessage {
            farm_id: &self.farm_id,
            device_id: &self.device_id,
            timestamp: &timestamp,
            readings: &readings,
            hash: &hash,
        })?;

        Ok(Message { bytes, hash })
    }
}

/// Formats epoch seconds as `YYYY-MM-DDTHH:MM:SSZ`, treated as UTC.
fn format_iso8601(epoch: u64) -> Result<String, BuildError> {
    let secs = i64::try_from(epoch).map_err(|_| BuildError::TimestampOutOfRange(epoch))?;
    let datetime = OffsetDateTime::from_unix_timestamp(secs)
        .map_err(|_| BuildError::TimestampOutOfRange(epoch))?;
    Ok(datetime.format(format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second]Z"
    ))?)
}

/// Formats a value with exactly two fractional digits.
fn format_fixed(value: f64) -> String {
    format!("{value:.2}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_reading() -> Reading {
        Reading::new(45.0, 22.5, 25.0, 60.0, 1_700_000_000)
    }

    #[test]
    fn test_reference_scenario_payload_and_digest() {
        let builder = MessageBuilder::new("F1", "D1");
        let message = builder.build(&valid_reading()).unwrap();

        let expected_hash = "de0be8e5f88ff5c3622baa1008a0883ebae56603ef826f4c4a402bba01b6ac67";
        let expected_message = format!(
            concat!(
                r#"{{"farmId":"F1","deviceId":"D1","timestamp":"2023-11-14T22:13:20Z","#,
                r#""readings":{{"soilMoisture":"45.00","soilTemperature":"22.50","#,
                r#""airTemperature":"25.00","humidity":"60.00"}},"hash":"{}"}}"#
            ),
            expected_hash
        );

        assert_eq!(message.hash(), expected_hash);
        assert_eq!(message.as_str(), expected_message);
    }

    #[test]
    fn test_digest_is_reproducible_over_payload_without_hash() {
        let builder = MessageBuilder::new("farm-9", "dev-3");
        let reading = Reading::new(12.3, 4.56, 7.0, 89.01, 1_754_000_123);
        let message = builder.build(&reading).unwrap();

        // Strip the hash field back out and recompute independently.
        let full: serde_json::Value = serde_json::from_str(message.as_str()).unwrap();
        let embedded = full["hash"].as_str().unwrap();
        let payload = message
            .as_str()
            .replace(&format!(r#","hash":"{embedded}""#), "");

        let recomputed = hex::encode(Sha256::digest(payload.as_bytes()));
        assert_eq!(recomputed, embedded);
    }

    #[test]
    fn test_hash_shape() {
        let builder = MessageBuilder::new("F1", "D1");
        let message = builder.build(&valid_reading()).unwrap();

        assert_eq!(message.hash().len(), 64);
        assert!(message
            .hash()
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_hash_field_is_last() {
        let builder = MessageBuilder::new("F1", "D1");
        let message = builder.build(&valid_reading()).unwrap();
        assert!(message
            .as_str()
            .ends_with(&format!(r#""hash":"{}"}}"#, message.hash())));
    }

    #[test]
    fn test_two_decimal_formatting() {
        assert_eq!(format_fixed(45.0), "45.00");
        assert_eq!(format_fixed(22.5), "22.50");
        assert_eq!(format_fixed(0.005), "0.01");
        assert_eq!(format_fixed(-9.999), "-10.00");
    }

    #[test]
    fn test_identical_readings_build_identical_messages() {
        let builder = MessageBuilder::new("F1", "D1");
        let a = builder.build(&valid_reading()).unwrap();
        let b = builder.build(&valid_reading()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_out_of_range_epoch_rejected() {
        let builder = MessageBuilder::new("F1", "D1");
        let reading = Reading::new(45.0, 22.5, 25.0, 60.0, u64::MAX);
        assert!(matches!(
            builder.build(&reading),
            Err(BuildError::TimestampOutOfRange(_))
        ));
    }

    #[test]
    fn test_epoch_zero_formats() {
        assert_eq!(format_iso8601(0).unwrap(), "1970-01-01T00:00:00Z");
    }
}
