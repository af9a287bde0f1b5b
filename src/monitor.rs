//! Polling loop: read, print one line, wait, until told to stop.

use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::blocking::i2c::{Read, Write as I2cWrite};
use log::{debug, info};

use crate::config::Config;
use crate::{Error, Measurement, DHT10};

/// Longest single sleep while waiting out the interval, so a stop request
/// is noticed promptly.
const STOP_POLL: Duration = Duration::from_millis(50);

/// Anything that yields one temperature/humidity measurement per call
pub trait ClimateSensor {
    type Error;

    fn read(&mut self) -> Result<Measurement, Self::Error>;
}

impl<I2C, D, E> ClimateSensor for DHT10<I2C, D>
where
    I2C: Read<Error = E> + I2cWrite<Error = E>,
    D: DelayMs<u8>,
{
    type Error = Error<E>;

    fn read(&mut self) -> Result<Measurement, Self::Error> {
        self.measure()
    }
}

#[derive(Debug)]
pub enum MonitorError<E> {
    /// Sensor read failed
    Read(E),
    /// Writing the line failed
    Output(io::Error),
}

impl<E: fmt::Display> fmt::Display for MonitorError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorError::Read(e) => write!(f, "sensor read failed: {}", e),
            MonitorError::Output(e) => write!(f, "writing reading failed: {}", e),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for MonitorError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MonitorError::Read(e) => Some(e),
            MonitorError::Output(e) => Some(e),
        }
    }
}

/// Owns the sensor for as long as the monitor lives.
pub struct Monitor<S> {
    sensor: S,
    config: Config,
}

impl<S: ClimateSensor> Monitor<S> {
    pub fn new(sensor: S, config: Config) -> Self {
        Monitor { sensor, config }
    }

    /// Acquire the sensor through `open` exactly once. A failure here means
    /// the loop never starts.
    pub fn start<F, E>(config: Config, open: F) -> Result<Self, E>
    where
        F: FnOnce(&Config) -> Result<S, E>,
    {
        let sensor = open(&config)?;
        Ok(Self::new(sensor, config))
    }

    /// Poll until `stop` is raised. Returns the number of lines written.
    ///
    /// Any read or output fault ends the loop and is returned; nothing more
    /// is written after it.
    pub fn run<W: Write>(
        &mut self,
        out: &mut W,
        stop: &AtomicBool,
    ) -> Result<usize, MonitorError<S::Error>> {
        let mut lines = 0;
        while !stop.load(Ordering::SeqCst) {
            let measurement = self.sensor.read().map_err(MonitorError::Read)?;
            writeln!(out, "{}", measurement.line(self.config.precision))
                .and_then(|_| out.flush())
                .map_err(MonitorError::Output)?;
            lines += 1;
            debug!("reading {}: {:?}", lines, measurement);

            pause(self.config.interval, stop);
        }
        info!("stop requested after {} readings", lines);
        Ok(lines)
    }

    /// Give the sensor back
    pub fn into_inner(self) -> S {
        self.sensor
    }
}

/// Sleep for at least `interval`, returning early once `stop` is raised.
fn pause(interval: Duration, stop: &AtomicBool) {
    let deadline = Instant::now() + interval;
    loop {
        if stop.load(Ordering::SeqCst) {
            return;
        }
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        thread::sleep((deadline - now).min(STOP_POLL));
    }
}
