use anyhow::{anyhow, Context};
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::delay::Delay;
use esp_idf_svc::hal::gpio;
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::hal::prelude::*;
use esp_idf_svc::hal::spi;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use log::{error, info, warn};

use inkframe::display::TriColorDisplay;
use inkframe::esp::{self, EspTransport, FlashStorage, WifiManager, WifiNetwork};
use inkframe::fetch::{Acquired, AcquiredFrom, FetchController, FetchSource, SystemClock};
use inkframe::gd7965::Gd7965;
use inkframe::render::{Origin, Renderer, Shown};
use inkframe::{PipelineConfig, PipelineError};

// Splash converted from splash.png at build time, empty when there was none
const SPLASH: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/splash.bwr"));

/// Connect, fetch, render, sleep. Only returns on setup errors.
pub fn wake_cycle() -> anyhow::Result<()> {
    let config = PipelineConfig::default();

    let wakeup_reason = esp_idf_svc::hal::reset::WakeupReason::get();
    info!("Wakeup reason: {:?}", wakeup_reason);

    let peripherals = Peripherals::take().context("Could not take peripherals")?;
    let sys_loop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;
    let pins = peripherals.pins;

    let storage = FlashStorage::mount()?;

    let networks = [WifiNetwork::new(config.wifi_ssid, config.wifi_password)];
    let mut wifi = WifiManager::new(&networks, peripherals.modem, sys_loop, nvs)?;
    let online = match wifi.connect() {
        Ok(_) => true,
        Err(e) => {
            warn!("WiFi unavailable: {}", e);
            false
        }
    };

    let mut fetcher = FetchController::new(
        EspTransport::new(config.read_timeout_ms()),
        storage,
        SystemClock::new(),
        config.retry,
        config.cache_path.clone(),
    );
    let acquired = acquire(&mut fetcher, &config, online);
    if let Err(e) = wifi.disconnect() {
        warn!("WiFi disconnect failed: {}", e);
    }

    info!("Configuring SPI for the panel");
    let spi = spi::SpiDeviceDriver::new_single(
        peripherals.spi2,
        pins.gpio12,                    // SCK
        pins.gpio11,                    // MOSI
        Option::<gpio::AnyIOPin>::None, // No MISO needed for display
        Some(pins.gpio10),              // CS
        &spi::SpiDriverConfig::new(),
        &spi::SpiConfig::new().baudrate(4.MHz().into()),
    )?;

    let mut panel = Gd7965::new(
        spi,
        gpio::PinDriver::input(pins.gpio16)?,  // BUSY
        gpio::PinDriver::output(pins.gpio18)?, // DC
        gpio::PinDriver::output(pins.gpio17)?, // RST
        Delay::default(),
    )
    .map_err(|e| anyhow!("Panel init failed: {:?}", e))?;

    let asset = acquired.map(|acquired| {
        info!("Showing {} bytes from {:?}", acquired.bytes, acquired.from);
        config.asset_path.as_str()
    });
    match Renderer::new(config.surface, config.color_mode).present(
        fetcher.storage(),
        asset,
        Origin::default(),
        SPLASH,
        &mut panel,
    ) {
        Ok(Shown::Asset(rendered)) => info!("{:?} asset on the panel", rendered.format),
        Ok(Shown::Fallback(e)) => warn!("Fallback screen shown for: {}", e),
        Err(e) => error!("Panel memory not written: {:?}", e),
    }

    if let Err(e) = panel.refresh(true) {
        error!("Refresh failed: {:?}", e);
    }
    if let Err(e) = panel.sleep() {
        warn!("Panel sleep failed: {:?}", e);
    }

    esp::deep_sleep(config.sleep_minutes)
}

fn acquire(
    fetcher: &mut FetchController<EspTransport, FlashStorage, SystemClock>,
    config: &PipelineConfig,
    online: bool,
) -> Result<Acquired, PipelineError> {
    if !online {
        return fetcher
            .restore_from_cache(&config.asset_path)
            .map(|bytes| Acquired {
                from: AcquiredFrom::Cache,
                bytes,
            });
    }

    let url = config.request_url();
    let source = match config.payload {
        Some(_) => FetchSource::post(url),
        None => FetchSource::get(url),
    };
    fetcher.acquire(
        &source,
        config.payload.as_deref().map(str::as_bytes),
        &config.asset_path,
        config.caching,
    )
}
