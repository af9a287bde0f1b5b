use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use linux_embedded_hal::{Delay, I2cdev};
use log::{error, info};

use climate_monitor::config::Config;
use climate_monitor::monitor::{Monitor, MonitorError};
use climate_monitor::DHT10;

type Sensor = DHT10<I2cdev, Delay>;

/// Open the bus and bring the sensor up. Fails before any reading is taken.
fn open_sensor(config: &Config) -> anyhow::Result<Sensor> {
    let path = config.device_path();
    let dev = I2cdev::new(&path).with_context(|| format!("opening {}", path))?;
    let mut dht = DHT10::with_address(dev, Delay, config.address).verify_crc(config.verify_crc);
    dht.init()
        .with_context(|| format!("initialising DHT10 at {:#04x} on {}", config.address, path))?;
    info!("DHT10 ready at {:#04x} on {}", config.address, path);
    Ok(dht)
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst))
            .context("installing signal handler")?;
    }

    let mut monitor = Monitor::start(Config::default(), open_sensor)?;
    let stdout = io::stdout();
    let result = monitor.run(&mut stdout.lock(), &stop);

    // Bus handle closes here, on success and failure alike.
    drop(monitor.into_inner().release());

    match result {
        Ok(lines) => {
            info!("printed {} readings, sensor released", lines);
            Ok(())
        }
        Err(MonitorError::Read(e)) => {
            error!("sensor read failed (transient: {}), stopping", e.is_transient());
            Err(e).context("reading DHT10")
        }
        Err(e @ MonitorError::Output(_)) => Err(e.into()),
    }
}
