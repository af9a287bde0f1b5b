//! Driver for the Aosong DHT10 digital temperature and humidity sensor,
//! plus the polling monitor that prints its readings.
//!
//! The driver works over any `embedded-hal` blocking I2C bus; [`monitor`]
//! runs it in a loop and [`config`] holds the loop's settings.

use core::fmt;

use byteorder::{BigEndian, ByteOrder};
use crc8::Crc8;
use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::blocking::i2c::{Read, Write};
use log::{debug, warn};

pub mod config;
pub mod monitor;
pub mod reading;

pub use reading::{convert, Measurement, MeasurementRaw};

const CRC8_POLYNOMIAL: u8 = 0x31;
const CRC8_INIT: u8 = 0xff;

/// Default I2C address of the DHT10
pub const I2C_ADDRESS: u8 = 0x38;

// Datasheet timings, milliseconds
const RESET_DELAY_MS: u8 = 20;
const INIT_DELAY_MS: u8 = 10;
const MEASURE_DELAY_MS: u8 = 75;

pub struct DHT10<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
    verify_crc: bool,
    crc: Crc8,
}

impl<I2C, D, E> DHT10<I2C, D>
where
    I2C: Read<Error = E> + Write<Error = E>,
    D: DelayMs<u8>,
{
    /// Creates a new driver at the default address
    pub fn new(i2c: I2C, delay: D) -> Self {
        Self::with_address(i2c, delay, I2C_ADDRESS)
    }

    /// Creates a new driver at `address`
    pub fn with_address(i2c: I2C, delay: D, address: u8) -> Self {
        DHT10 {
            i2c,
            delay,
            address,
            verify_crc: false,
            crc: crc_table(),
        }
    }

    /// Read a trailing CRC byte after each measurement and reject the sample
    /// on mismatch. Only later sensor revisions transmit it.
    pub fn verify_crc(mut self, enabled: bool) -> Self {
        self.verify_crc = enabled;
        self
    }

    /// Send an I2C command
    fn command(&mut self, command: Command) -> Result<(), Error<E>> {
        self.i2c
            .write(self.address, command.value())
            .map_err(Error::I2c)
    }

    /// Reset the sensor and load its calibration coefficients.
    ///
    /// Must succeed once before measurements are trusted.
    pub fn init(&mut self) -> Result<(), Error<E>> {
        self.reset()?;
        self.command(Command::Initialize)?;
        self.delay.delay_ms(INIT_DELAY_MS);
        let status = self.status()?;
        debug!("dht10 at {:#04x} initialised, status {:#04x}", self.address, status.bits());
        if !status.calibrated() {
            return Err(Error::NotCalibrated);
        }
        Ok(())
    }

    /// Soft reset
    pub fn reset(&mut self) -> Result<(), Error<E>> {
        self.command(Command::SoftReset)?;
        self.delay.delay_ms(RESET_DELAY_MS);
        Ok(())
    }

    /// Read the status byte
    pub fn status(&mut self) -> Result<Status, Error<E>> {
        let mut buf = [0; 1];
        self.i2c.read(self.address, &mut buf).map_err(Error::I2c)?;
        Ok(Status(buf[0]))
    }

    /// Take a temperature and humidity measurement
    pub fn measure(&mut self) -> Result<Measurement, Error<E>> {
        let raw = self.measure_raw()?;
        Ok(convert(&raw))
    }

    /// Take a temperature and humidity measurement, unconverted
    pub fn measure_raw(&mut self) -> Result<MeasurementRaw, Error<E>> {
        self.command(Command::Measure)?;
        self.delay.delay_ms(MEASURE_DELAY_MS);

        let mut buf = [0; 7];
        let len = if self.verify_crc { 7 } else { 6 };
        self.i2c
            .read(self.address, &mut buf[..len])
            .map_err(Error::I2c)?;

        if Status(buf[0]).busy() {
            warn!("dht10 still busy after {} ms", MEASURE_DELAY_MS);
            return Err(Error::Busy);
        }
        if self.verify_crc && checksum(&mut self.crc, &buf[..6]) != buf[6] {
            return Err(Error::Crc);
        }

        // 20-bit humidity then 20-bit temperature, sharing the middle byte
        let humidity = BigEndian::read_u24(&buf[1..4]) >> 4;
        let temperature = BigEndian::read_u24(&buf[3..6]) & 0x000F_FFFF;
        Ok(MeasurementRaw {
            temperature,
            humidity,
        })
    }

    /// Measure and return only the temperature in °C
    pub fn temperature(&mut self) -> Result<f32, Error<E>> {
        Ok(self.measure()?.temperature)
    }

    /// Measure and return only the relative humidity in %
    pub fn humidity(&mut self) -> Result<f32, Error<E>> {
        Ok(self.measure()?.humidity)
    }

    pub fn release(self) -> I2C {
        self.i2c
    }
}

fn crc_table() -> Crc8 {
    Crc8::create_msb(CRC8_POLYNOMIAL)
}

fn checksum(table: &mut Crc8, data: &[u8]) -> u8 {
    table.calc(data, data.len() as i32, CRC8_INIT)
}

/// Status byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status(u8);

impl Status {
    const BUSY: u8 = 1 << 7;
    const CALIBRATED: u8 = 1 << 3;

    /// A conversion is in progress
    pub fn busy(&self) -> bool {
        self.0 & Self::BUSY != 0
    }

    /// Calibration coefficients are loaded
    pub fn calibrated(&self) -> bool {
        self.0 & Self::CALIBRATED != 0
    }

    pub fn bits(&self) -> u8 {
        self.0
    }
}

/// Errors
#[derive(Debug)]
pub enum Error<E> {
    /// I2C bus error
    I2c(E),
    /// Conversion not finished when the result was read
    Busy,
    /// Sensor reports no calibration after init
    NotCalibrated,
    /// Wrong CRC
    Crc,
}

impl<E> Error<E> {
    /// Faults a repeated read may clear. Bus errors and a missing
    /// calibration are treated as persistent.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Busy | Error::Crc)
    }
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::I2c(e) => write!(f, "i2c bus error: {:?}", e),
            Error::Busy => f.write_str("sensor busy, measurement not ready"),
            Error::NotCalibrated => f.write_str("sensor reports no calibration"),
            Error::Crc => f.write_str("measurement crc mismatch"),
        }
    }
}

impl<E: fmt::Debug> std::error::Error for Error<E> {}

enum Command {
    Measure,
    Initialize,
    SoftReset,
}

impl Command {
    fn value(&self) -> &'static [u8] {
        match *self {
            // Trigger measurement
            Command::Measure => &[0xAC, 0x33, 0x00],
            // Initialise, load calibration
            Command::Initialize => &[0xE1, 0x08, 0x00],
            Command::SoftReset => &[0xBA],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal_mock::delay::MockNoop;
    use embedded_hal_mock::i2c::{Mock as I2cMock, Transaction};
    use embedded_hal_mock::MockError;
    use std::io::ErrorKind;

    const ADDR: u8 = I2C_ADDRESS;

    // status 0x1C, humidity 0x5_9999 (35 %), temperature 0x5_C28F (22 °C)
    const SAMPLE: [u8; 6] = [0x1C, 0x59, 0x99, 0x95, 0xC2, 0x8F];
    const SAMPLE_CRC: u8 = 0x7F;

    fn trigger() -> Transaction {
        Transaction::write(ADDR, vec![0xAC, 0x33, 0x00])
    }

    #[test]
    fn crc() {
        // One table serves every check
        let mut table = crc_table();
        assert_eq!(checksum(&mut table, &[0x00u8]), 0xAC);
        assert_eq!(checksum(&mut table, &[0xBEu8, 0xEFu8]), 0x92);
        assert_eq!(checksum(&mut table, &SAMPLE), SAMPLE_CRC);
        assert_eq!(checksum(&mut table, &[0xBEu8, 0xEFu8]), 0x92);
    }

    #[test]
    fn status_bits() {
        assert!(Status(0x80).busy());
        assert!(!Status(0x80).calibrated());
        assert!(Status(0x08).calibrated());
        assert!(!Status(0x1C).busy());
    }

    #[test]
    fn init_sequence() {
        let expectations = [
            Transaction::write(ADDR, vec![0xBA]),
            Transaction::write(ADDR, vec![0xE1, 0x08, 0x00]),
            Transaction::read(ADDR, vec![0x18]),
        ];
        let mut i2c = I2cMock::new(&expectations);
        let mut dht = DHT10::new(i2c.clone(), MockNoop::new());
        dht.init().unwrap();
        i2c.done();
    }

    #[test]
    fn init_uncalibrated() {
        let expectations = [
            Transaction::write(ADDR, vec![0xBA]),
            Transaction::write(ADDR, vec![0xE1, 0x08, 0x00]),
            Transaction::read(ADDR, vec![0x10]),
        ];
        let mut i2c = I2cMock::new(&expectations);
        let mut dht = DHT10::new(i2c.clone(), MockNoop::new());
        assert!(matches!(dht.init(), Err(Error::NotCalibrated)));
        i2c.done();
    }

    #[test]
    fn measure_raw_unpacks_fields() {
        let expectations = [trigger(), Transaction::read(ADDR, SAMPLE.to_vec())];
        let mut i2c = I2cMock::new(&expectations);
        let mut dht = DHT10::new(i2c.clone(), MockNoop::new());
        let raw = dht.measure_raw().unwrap();
        assert_eq!(raw.humidity, 0x5_9999);
        assert_eq!(raw.temperature, 0x5_C28F);
        i2c.done();
    }

    #[test]
    fn measure_converts() {
        let expectations = [trigger(), Transaction::read(ADDR, SAMPLE.to_vec())];
        let mut i2c = I2cMock::new(&expectations);
        let mut dht = DHT10::new(i2c.clone(), MockNoop::new());
        let m = dht.measure().unwrap();
        assert!((m.temperature - 22.0).abs() < 0.01);
        assert!((m.humidity - 35.0).abs() < 0.01);
        i2c.done();
    }

    #[test]
    fn temperature_and_humidity_are_separate_reads() {
        let expectations = [
            trigger(),
            Transaction::read(ADDR, SAMPLE.to_vec()),
            trigger(),
            Transaction::read(ADDR, SAMPLE.to_vec()),
        ];
        let mut i2c = I2cMock::new(&expectations);
        let mut dht = DHT10::new(i2c.clone(), MockNoop::new());
        assert!((dht.temperature().unwrap() - 22.0).abs() < 0.01);
        assert!((dht.humidity().unwrap() - 35.0).abs() < 0.01);
        i2c.done();
    }

    #[test]
    fn busy() {
        let mut busy = SAMPLE;
        busy[0] |= 0x80;
        let expectations = [trigger(), Transaction::read(ADDR, busy.to_vec())];
        let mut i2c = I2cMock::new(&expectations);
        let mut dht = DHT10::new(i2c.clone(), MockNoop::new());
        let err = dht.measure().unwrap_err();
        assert!(matches!(err, Error::Busy));
        assert!(err.is_transient());
        i2c.done();
    }

    #[test]
    fn crc_checked_when_enabled() {
        let mut good = SAMPLE.to_vec();
        good.push(SAMPLE_CRC);
        let mut bad = SAMPLE.to_vec();
        bad.push(SAMPLE_CRC ^ 0x01);
        let expectations = [
            trigger(),
            Transaction::read(ADDR, good),
            trigger(),
            Transaction::read(ADDR, bad),
        ];
        let mut i2c = I2cMock::new(&expectations);
        let mut dht = DHT10::new(i2c.clone(), MockNoop::new()).verify_crc(true);
        assert!(dht.measure().is_ok());
        assert!(matches!(dht.measure(), Err(Error::Crc)));
        i2c.done();
    }

    #[test]
    fn bus_error_propagates() {
        let expectations = [trigger().with_error(MockError::Io(ErrorKind::Other))];
        let mut i2c = I2cMock::new(&expectations);
        let mut dht = DHT10::new(i2c.clone(), MockNoop::new());
        let err = dht.measure().unwrap_err();
        assert!(matches!(err, Error::I2c(_)));
        assert!(!err.is_transient());
        i2c.done();
    }

    #[test]
    fn custom_address() {
        let expectations = [
            Transaction::write(0x39, vec![0xAC, 0x33, 0x00]),
            Transaction::read(0x39, SAMPLE.to_vec()),
        ];
        let mut i2c = I2cMock::new(&expectations);
        let mut dht = DHT10::with_address(i2c.clone(), MockNoop::new(), 0x39);
        dht.measure_raw().unwrap();
        i2c.done();
    }
}
