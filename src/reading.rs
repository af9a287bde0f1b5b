//! Measurement values and their one-line rendering

use core::fmt;

/// Full scale of the 20-bit raw sample codes.
const RAW_SCALE: f32 = (1u32 << 20) as f32;

/// A converted temperature and humidity measurement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    /// Degrees Celsius
    pub temperature: f32,
    /// Relative humidity, percent
    pub humidity: f32,
}

/// Raw 20-bit sample codes as delivered by the sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeasurementRaw {
    pub temperature: u32,
    pub humidity: u32,
}

/// Convert MeasurementRaw to Measurement
pub fn convert(m: &MeasurementRaw) -> Measurement {
    Measurement {
        temperature: convert_temperature(m.temperature),
        humidity: convert_humidity(m.humidity),
    }
}

fn convert_temperature(raw: u32) -> f32 {
    raw as f32 / RAW_SCALE * 200.0 - 50.0
}

fn convert_humidity(raw: u32) -> f32 {
    raw as f32 / RAW_SCALE * 100.0
}

impl Measurement {
    /// Render as `Temperature: <T> °C, Humidity: <H> %` with `precision`
    /// digits after the decimal point.
    ///
    /// Rounding follows `{:.N}` float formatting: the exact binary value is
    /// rounded to the nearest representable decimal, ties to even.
    pub fn line(&self, precision: usize) -> Line<'_> {
        Line {
            measurement: self,
            precision,
        }
    }
}

/// Display adapter returned by [`Measurement::line`]
pub struct Line<'a> {
    measurement: &'a Measurement,
    precision: usize,
}

impl fmt::Display for Line<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Temperature: {:.*} °C, Humidity: {:.*} %",
            self.precision,
            self.measurement.temperature,
            self.precision,
            self.measurement.humidity,
        )
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.line(1), f)
    }
}
