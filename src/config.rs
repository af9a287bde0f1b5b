//! Monitor settings

use std::time::Duration;

use crate::I2C_ADDRESS;

/// I2C bus the sensor sits on, `/dev/i2c-1` on a Raspberry Pi header.
pub const DEFAULT_BUS: u8 = 1;
/// Time between the end of one printed line and the next measurement.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(1000);
/// Digits after the decimal point for both quantities.
pub const DEFAULT_PRECISION: usize = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bus: u8,
    pub address: u8,
    pub interval: Duration,
    pub precision: usize,
    /// Expect a trailing CRC byte on each measurement
    pub verify_crc: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bus: DEFAULT_BUS,
            address: I2C_ADDRESS,
            interval: DEFAULT_INTERVAL,
            precision: DEFAULT_PRECISION,
            verify_crc: false,
        }
    }
}

impl Config {
    /// Linux character device for `bus`
    pub fn device_path(&self) -> String {
        format!("/dev/i2c-{}", self.bus)
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_precision(mut self, precision: usize) -> Self {
        self.precision = precision;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = Config::default();
        assert_eq!(c.bus, 1);
        assert_eq!(c.address, 0x38);
        assert_eq!(c.interval, Duration::from_secs(1));
        assert_eq!(c.precision, 1);
        assert!(!c.verify_crc);
        assert_eq!(c.device_path(), "/dev/i2c-1");
    }

    #[test]
    fn builders() {
        let c = Config::default()
            .with_interval(Duration::from_millis(5))
            .with_precision(3);
        assert_eq!(c.interval, Duration::from_millis(5));
        assert_eq!(c.precision, 3);
        assert_eq!(c.bus, DEFAULT_BUS);
    }
}
