//! ESP-IDF side of the capabilities: WiFi, HTTP client, flash storage

pub mod flash;
pub mod http;
pub mod wifi;

pub use flash::FlashStorage;
pub use http::EspTransport;
pub use wifi::{WifiManager, WifiNetwork};

/// Power down until the RTC timer fires, the chip then boots from scratch
pub fn deep_sleep(minutes: u32) -> ! {
    let micros = minutes as u64 * 60 * 1_000_000;
    log::info!("Going to deep sleep for {} minutes", minutes);
    unsafe { esp_idf_svc::sys::esp_deep_sleep(micros) }
}
