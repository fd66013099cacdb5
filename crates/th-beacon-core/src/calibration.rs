//! Raw-to-physical conversion for the HTS221.
//!
//! The sensor ships with two factory calibration points per channel. A raw
//! ADC count is converted by linear interpolation between those points, in
//! integer arithmetic, keeping the fixed-point units the sensor uses:
//! humidity in half percent and temperature in eighths of a degree.

use thiserror_no_std::Error;

/// Humidity calibration points.
///
/// `h0_rh_x2` / `h1_rh_x2` are relative humidity in half-percent units, read
/// at raw counts `h0_out` / `h1_out`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HumidityCalibration {
    pub h0_rh_x2: u8,
    pub h1_rh_x2: u8,
    pub h0_out: i16,
    pub h1_out: i16,
}

/// Temperature calibration points.
///
/// `t0_degc_x8` / `t1_degc_x8` are 10-bit values in eighths of a degree
/// Celsius, read at raw counts `t0_out` / `t1_out`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TemperatureCalibration {
    pub t0_degc_x8: u16,
    pub t1_degc_x8: u16,
    pub t0_out: i16,
    pub t1_out: i16,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationError {
    #[error("humidity calibration points share the same raw count ({0})")]
    DegenerateHumidity(i16),
    #[error("temperature calibration points share the same raw count ({0})")]
    DegenerateTemperature(i16),
}

/// Validated factory calibration.
///
/// Only constructible through [`CalibrationConstants::new`], which rejects
/// calibration points with a zero raw span. Every value of this type can
/// therefore be used for [`convert`] without a division by zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationConstants {
    humidity: HumidityCalibration,
    temperature: TemperatureCalibration,
}

impl CalibrationConstants {
    pub fn new(
        humidity: HumidityCalibration,
        temperature: TemperatureCalibration,
    ) -> Result<Self, CalibrationError> {
        if humidity.h0_out == humidity.h1_out {
            return Err(CalibrationError::DegenerateHumidity(humidity.h0_out));
        }
        if temperature.t0_out == temperature.t1_out {
            return Err(CalibrationError::DegenerateTemperature(temperature.t0_out));
        }
        Ok(Self {
            humidity,
            temperature,
        })
    }

    pub const fn humidity(&self) -> &HumidityCalibration {
        &self.humidity
    }

    pub const fn temperature(&self) -> &TemperatureCalibration {
        &self.temperature
    }
}

/// One pair of raw ADC counts, as read from `HUMIDITY_OUT` and `TEMP_OUT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawSample {
    pub humidity_out: i16,
    pub temp_out: i16,
}

impl RawSample {
    /// Decode the four output bytes starting at `HUMIDITY_OUT_L`.
    pub const fn from_le_bytes(bytes: [u8; 4]) -> Self {
        Self {
            humidity_out: i16::from_le_bytes([bytes[0], bytes[1]]),
            temp_out: i16::from_le_bytes([bytes[2], bytes[3]]),
        }
    }
}

/// The value broadcast by the beacon.
///
/// `humidity_x2` is relative humidity times two, `temp_x8` is degrees
/// Celsius times eight. Neither is clamped to a physical range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CalibratedReading {
    pub humidity_x2: i16,
    pub temp_x8: i16,
}

impl CalibratedReading {
    pub fn humidity_percent(&self) -> f32 {
        f32::from(self.humidity_x2) / 2.0
    }

    pub fn temperature_celsius(&self) -> f32 {
        f32::from(self.temp_x8) / 8.0
    }
}

/// Convert a raw sample into calibrated units.
pub fn convert(raw: RawSample, constants: &CalibrationConstants) -> CalibratedReading {
    let h = &constants.humidity;
    let t = &constants.temperature;
    CalibratedReading {
        humidity_x2: interpolate(
            raw.humidity_out,
            (h.h0_out, i32::from(h.h0_rh_x2)),
            (h.h1_out, i32::from(h.h1_rh_x2)),
        ),
        temp_x8: interpolate(
            raw.temp_out,
            (t.t0_out, i32::from(t.t0_degc_x8)),
            (t.t1_out, i32::from(t.t1_degc_x8)),
        ),
    }
}

/// Two-point linear interpolation, truncating toward zero.
///
/// Raw deltas reach +-65535 and value deltas +-1023, so the product needs
/// 32 bits. The result is narrowed to 16 bits the same way the sensor's
/// output registers are: two's-complement truncation, no clamping.
fn interpolate(x: i16, (x0, y0): (i16, i32), (x1, y1): (i16, i32)) -> i16 {
    // Non-zero, checked in CalibrationConstants::new.
    let span = i32::from(x1) - i32::from(x0);
    let y = y0 + (i32::from(x) - i32::from(x0)) * (y1 - y0) / span;
    y as i16
}
