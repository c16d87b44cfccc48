//! One acquisition of all sensor channels at a timestamp.
//!
//! A `Reading` is created once per cycle by the sensor source and is
//! immutable afterwards. Validity is decided at construction: every field
//! must lie within its physical range and no field may carry the driver
//! error sentinel. An invalid reading is never transmitted or stored — the
//! pipeline skips the whole cycle.

/// Sentinel a sensor driver reports when a channel could not be read.
/// Any field at or below this value marks the reading invalid.
pub const SENSOR_ERROR: f64 = -999.0;

/// Physical range of the soil-moisture percentage.
pub const SOIL_MOISTURE_RANGE: (f64, f64) = (0.0, 100.0);

/// Physical range of the soil temperature, °C.
pub const SOIL_TEMPERATURE_RANGE: (f64, f64) = (-10.0, 60.0);

/// Physical range of the air temperature, °C.
pub const AIR_TEMPERATURE_RANGE: (f64, f64) = (-10.0, 60.0);

/// Physical range of the relative humidity percentage.
pub const HUMIDITY_RANGE: (f64, f64) = (0.0, 100.0);

/// A complete set of environmental measurements from one cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// Soil moisture, percent.
    pub soil_moisture: f64,

    /// Soil temperature, °C.
    pub soil_temperature: f64,

    /// Air temperature, °C.
    pub air_temperature: f64,

    /// Relative humidity, percent.
    pub humidity: f64,

    /// Acquisition time, Unix epoch seconds.
    pub timestamp: u64,

    valid: bool,
}

impl Reading {
    /// Builds a reading and decides its validity.
    ///
    /// The flag is true only if every field lies within its declared
    /// physical range; a sensor-error sentinel on any channel forces it
    /// false.
    pub fn new(
        soil_moisture: f64,
        soil_temperature: f64,
        air_temperature: f64,
        humidity: f64,
        timestamp: u64,
    ) -> Self {
        let valid = field_in_range(soil_moisture, SOIL_MOISTURE_RANGE)
            && field_in_range(soil_temperature, SOIL_TEMPERATURE_RANGE)
            && field_in_range(air_temperature, AIR_TEMPERATURE_RANGE)
            && field_in_range(humidity, HUMIDITY_RANGE);

        Reading {
            soil_moisture,
            soil_temperature,
            air_temperature,
            humidity,
            timestamp,
            valid,
        }
    }

    /// True when every channel produced a plausible value.
    pub fn is_valid(&self) -> bool {
        self.valid
    }
}

fn field_in_range(value: f64, (min, max): (f64, f64)) -> bool {
    if value.is_nan() || value <= SENSOR_ERROR {
        return false;
    }
    value >= min && value <= max
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading_with(moisture: f64, soil_t: f64, air_t: f64, humidity: f64) -> Reading {
        Reading::new(moisture, soil_t, air_t, humidity, 1_700_000_000)
    }

    #[test]
    fn test_all_fields_in_range_is_valid() {
        let reading = reading_with(45.0, 22.5, 25.0, 60.0);
        assert!(reading.is_valid());
    }

    #[test]
    fn test_boundaries_are_inclusive() {
        assert!(reading_with(0.0, -10.0, -10.0, 0.0).is_valid());
        assert!(reading_with(100.0, 60.0, 60.0, 100.0).is_valid());
    }

    #[test]
    fn test_any_out_of_range_field_invalidates() {
        assert!(!reading_with(101.0, 22.5, 25.0, 60.0).is_valid());
        assert!(!reading_with(45.0, 75.0, 25.0, 60.0).is_valid());
        assert!(!reading_with(45.0, 22.5, -20.0, 60.0).is_valid());
        assert!(!reading_with(45.0, 22.5, 25.0, 120.0).is_valid());
    }

    #[test]
    fn test_sensor_error_sentinel_invalidates() {
        assert!(!reading_with(SENSOR_ERROR, 22.5, 25.0, 60.0).is_valid());
        assert!(!reading_with(45.0, SENSOR_ERROR, 25.0, 60.0).is_valid());
        assert!(!reading_with(45.0, 22.5, SENSOR_ERROR, 60.0).is_valid());
        assert!(!reading_with(45.0, 22.5, 25.0, SENSOR_ERROR).is_valid());
    }

    #[test]
    fn test_nan_invalidates() {
        assert!(!reading_with(f64::NAN, 22.5, 25.0, 60.0).is_valid());
    }
}
