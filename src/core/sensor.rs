//! Sensor acquisition seam and channel file reader.
//!
//! The core does not talk to hardware. It depends on the `SensorSource`
//! trait; the production implementation reads the channel files the ADC
//! and temperature/humidity drivers expose through sysfs, and tests
//! substitute scripted sources.
//!
//! A channel that cannot be read or parsed yields the [`SENSOR_ERROR`]
//! sentinel for that field, which marks the whole reading invalid — the
//! pipeline then skips the cycle rather than shipping garbage.

use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

use super::reading::{Reading, SENSOR_ERROR};
use crate::config::device::{CalibrationConfig, SensorPathsConfig};

/// A source of complete sensor readings, one per acquisition cycle.
///
/// `acquire` may block for seconds while sensors stabilize; the pipeline
/// tolerates that, it has nothing else to do at cycle start.
#[async_trait::async_trait]
pub trait SensorSource: Send {
    async fn acquire(&mut self) -> Reading;
}

/// Converts a raw capacitive-probe ADC value to a moisture percentage.
///
/// The probe reads `dry` in dry air and `wet` submerged; lower raw values
/// mean more moisture. The result is clamped to 0–100 so a probe drifting
/// slightly past its calibration endpoints still produces a usable value.
/// An inverted calibration (dry <= wet) yields the error sentinel.
pub fn moisture_percent(raw: u32, dry: u32, wet: u32) -> f64 {
    if dry <= wet {
        return SENSOR_ERROR;
    }
    let span = (dry - wet) as f64;
    let percent = 100.0 - ((raw as f64 - wet as f64) / span * 100.0);
    percent.clamp(0.0, 100.0)
}

/// Reads the four sensor channels from their sysfs files.
pub struct SysfsSensor {
    paths: SensorPathsConfig,
    calibration: CalibrationConfig,
}

impl SysfsSensor {
    pub fn new(paths: SensorPathsConfig, calibration: CalibrationConfig) -> Self {
        Self { paths, calibration }
    }

    /// Reads one channel file as an integer, sentinel on any failure.
    fn read_channel(path: &std::path::Path) -> Option<i64> {
        match std::fs::read_to_string(path) {
            Ok(content) => match content.trim().parse::<i64>() {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!("unparseable value in {}: {e}", path.display());
                    None
                }
            },
            Err(e) => {
                warn!("failed to read {}: {e}", path.display());
                None
            }
        }
    }

    /// Millidegree / milli-percent channels scale by 1000.
    fn read_milli(path: &std::path::Path) -> f64 {
        match Self::read_channel(path) {
            Some(raw) => raw as f64 / 1000.0,
            None => SENSOR_ERROR,
        }
    }
}

#[async_trait::async_trait]
impl SensorSource for SysfsSensor {
    async fn acquire(&mut self) -> Reading {
        debug!("reading sensor channels");

        let soil_moisture = match Self::read_channel(&self.paths.soil_moisture_raw) {
            Some(raw) if raw >= 0 => moisture_percent(
                raw as u32,
                self.calibration.moisture_dry_raw,
                self.calibration.moisture_wet_raw,
            ),
            _ => SENSOR_ERROR,
        };
        let soil_temperature = Self::read_milli(&self.paths.soil_temperature);
        let air_temperature = Self::read_milli(&self.paths.air_temperature);
        let humidity = Self::read_milli(&self.paths.humidity);

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        let reading = Reading::new(
            soil_moisture,
            soil_temperature,
            air_temperature,
            humidity,
            timestamp,
        );

        if reading.is_valid() {
            debug!(
                "reading: moisture {:.2}%, soil {:.2}°C, air {:.2}°C, humidity {:.2}%",
                reading.soil_moisture,
                reading.soil_temperature,
                reading.air_temperature,
                reading.humidity
            );
        }

        reading
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn test_moisture_percent_endpoints() {
        assert_eq!(moisture_percent(3200, 3200, 1200), 0.0);
        assert_eq!(moisture_percent(1200, 3200, 1200), 100.0);
    }

    #[test]
    fn test_moisture_percent_midpoint() {
        let mid = moisture_percent(2200, 3200, 1200);
        assert!((mid - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_moisture_percent_clamps_beyond_calibration() {
        // Drier than the dry endpoint, wetter than the wet endpoint.
        assert_eq!(moisture_percent(4000, 3200, 1200), 0.0);
        assert_eq!(moisture_percent(800, 3200, 1200), 100.0);
    }

    #[test]
    fn test_moisture_percent_inverted_calibration() {
        assert_eq!(moisture_percent(2000, 1200, 3200), SENSOR_ERROR);
    }

    fn sensor_with_channels(
        dir: &std::path::Path,
        moisture: &str,
        soil_t: &str,
        air_t: &str,
        humidity: &str,
    ) -> SysfsSensor {
        let write = |name: &str, content: &str| {
            let path = dir.join(name);
            fs::write(&path, content).unwrap();
            path
        };
        let paths = SensorPathsConfig {
            soil_moisture_raw: write("moisture_raw", moisture),
            soil_temperature: write("soil_temp", soil_t),
            air_temperature: write("air_temp", air_t),
            humidity: write("humidity", humidity),
        };
        SysfsSensor::new(paths, CalibrationConfig::default())
    }

    #[tokio::test]
    async fn test_acquire_reads_and_converts_channels() {
        let dir = tempfile::tempdir().unwrap();
        let mut sensor = sensor_with_channels(dir.path(), "2200\n", "22500\n", "25000\n", "60000\n");

        let reading = sensor.acquire().await;
        assert!(reading.is_valid());
        assert!((reading.soil_moisture - 50.0).abs() < 1e-9);
        assert!((reading.soil_temperature - 22.5).abs() < 1e-9);
        assert!((reading.air_temperature - 25.0).abs() < 1e-9);
        assert!((reading.humidity - 60.0).abs() < 1e-9);
        assert!(reading.timestamp > 0);
    }

    #[tokio::test]
    async fn test_acquire_with_unreadable_channel_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let mut sensor = sensor_with_channels(dir.path(), "2200\n", "22500\n", "25000\n", "60000\n");
        sensor.paths.humidity = dir.path().join("missing");

        let reading = sensor.acquire().await;
        assert!(!reading.is_valid());
        assert_eq!(reading.humidity, SENSOR_ERROR);
    }

    #[tokio::test]
    async fn test_acquire_with_garbage_channel_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let mut sensor = sensor_with_channels(dir.path(), "not-a-number", "22500", "25000", "60000");

        let reading = sensor.acquire().await;
        assert!(!reading.is_valid());
    }
}
