//! On the ESP32 this is the firmware: one wake cycle, then deep sleep.
//! Built for the host it is a preview tool that renders a stored asset into a PNG.

#[cfg(target_os = "espidf")]
mod firmware;

#[cfg(not(target_os = "espidf"))]
mod preview;

// https://docs.esp-rs.org/esp-idf-svc/esp_idf_svc/
#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    // It is necessary to call this function once. Otherwise some patches to the runtime
    // implemented by esp-idf-sys might not link properly. See https://github.com/esp-rs/esp-idf-template/issues/71
    esp_idf_svc::sys::link_patches();

    // Bind the log crate to the ESP Logging facilities
    esp_idf_svc::log::EspLogger::initialize_default();

    firmware::wake_cycle()
}

#[cfg(not(target_os = "espidf"))]
fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    preview::run()
}
