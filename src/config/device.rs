//! Device-side configuration: identity, cycle timing, queue bounds,
//! probe calibration, and sensor channel paths.
//!
//! Defaults reproduce the provisioning profile of a production field
//! device: a 15-minute acquisition cycle and a 100-entry offline queue.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Farm and device identity, assigned at provisioning.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DeviceConfig {
    /// Farm this device reports for. Part of every topic and payload.
    #[validate(length(
        min = 1,
        max = 64,
        message = "Farm id must be between 1 and 64 characters"
    ))]
    pub farm_id: String,

    /// Unique device identifier, typically derived from the MAC address.
    #[validate(length(
        min = 1,
        max = 64,
        message = "Device id must be between 1 and 64 characters"
    ))]
    pub device_id: String,
}

/// Acquisition cycle timing.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PipelineConfig {
    /// Interval between acquisition cycles, in milliseconds.
    #[validate(range(
        min = 1000,
        message = "Reading interval must be at least 1000 ms"
    ))]
    pub reading_interval_ms: u64,

    /// How often the transport gets serviced while the pipeline idles
    /// between cycles, in milliseconds. Must stay well under the MQTT
    /// keep-alive window.
    #[validate(range(
        min = 100,
        max = 30000,
        message = "Service interval must be between 100 and 30000 ms"
    ))]
    pub service_interval_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            // 15 minutes
            reading_interval_ms: 900_000,
            service_interval_ms: 1000,
        }
    }
}

/// Offline queue bounds and backing file.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum stored entries. When the queue is full the newest reading
    /// is dropped; entries already stored are kept.
    #[validate(range(
        min = 1,
        max = 100_000,
        message = "Queue capacity must be between 1 and 100000"
    ))]
    pub capacity: usize,

    /// Backing record file for queued messages.
    pub path: PathBuf,
}

impl Default for QueueConfig {
    fn default() -> Self {
        QueueConfig {
            capacity: 100,
            path: PathBuf::from("/var/lib/soilcast/offline_readings.txt"),
        }
    }
}

/// Soil-moisture probe calibration endpoints.
///
/// Capacitive probes read a raw ADC value that falls as moisture rises;
/// the dry/wet endpoints are measured per probe during provisioning.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_calibration_span"))]
pub struct CalibrationConfig {
    /// Raw ADC value measured in dry air.
    pub moisture_dry_raw: u32,

    /// Raw ADC value measured submerged in water.
    pub moisture_wet_raw: u32,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        CalibrationConfig {
            moisture_dry_raw: 3200,
            moisture_wet_raw: 1200,
        }
    }
}

/// A dry reading must sit strictly above the wet reading or the
/// percentage conversion degenerates.
fn validate_calibration_span(config: &CalibrationConfig) -> Result<(), ValidationError> {
    if config.moisture_dry_raw <= config.moisture_wet_raw {
        return Err(ValidationError::new("calibration_span")
            .with_message("moisture_dry_raw must be greater than moisture_wet_raw".into()));
    }
    Ok(())
}

/// Paths of the sensor channel files read each cycle.
///
/// The ADC and temperature/humidity drivers expose their channels through
/// sysfs; which bus and index they land on is board-specific and set at
/// provisioning.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SensorPathsConfig {
    /// Raw ADC channel of the capacitive soil-moisture probe.
    pub soil_moisture_raw: PathBuf,

    /// Soil temperature in millidegrees Celsius.
    pub soil_temperature: PathBuf,

    /// Air temperature in millidegrees Celsius.
    pub air_temperature: PathBuf,

    /// Relative humidity in milli-percent.
    pub humidity: PathBuf,
}

impl Default for SensorPathsConfig {
    fn default() -> Self {
        SensorPathsConfig {
            soil_moisture_raw: PathBuf::from("/sys/bus/iio/devices/iio:device0/in_voltage6_raw"),
            soil_temperature: PathBuf::from("/sys/bus/w1/devices/28-000000000000/temperature"),
            air_temperature: PathBuf::from(
                "/sys/bus/iio/devices/iio:device1/in_temp_input",
            ),
            humidity: PathBuf::from(
                "/sys/bus/iio/devices/iio:device1/in_humidityrelative_input",
            ),
        }
    }
}
