//! GD7965 Display Driver Implementation
//!
//! The controller keeps two full-frame RAMs: DTM1 holds black/white (1 = white) and
//! DTM2 holds red (1 = red). The accent plane handed to [`TriColorDisplay`] uses
//! 1 = no red, so it is inverted on the way out.
//!
//! Rows are written through the partial window commands. The window's horizontal
//! edges are byte aligned in controller RAM, so a row starting at an unaligned `x`
//! is shifted into a scratch row first; the padding pixels around it are sent as
//! white.
//!
//! ### BUSY Pin Wait
//!
//! BUSY is LOW while the controller works. A full tri-color refresh takes around
//! 15 seconds.

pub use display_interface::DisplayError;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::SpiDevice;

use super::interface::DisplayInterface;
use super::{cmd::Cmd, flag::Flag, HEIGHT, WIDTH};
use crate::display::{check_window, row_bytes, TriColorDisplay};

/// Power on and power off
const POWER_TIMEOUT_MS: u32 = 5_000;

/// Full refresh of all three colors
const REFRESH_TIMEOUT_MS: u32 = 30_000;

pub struct Gd7965<SPI, BSY, DC, RST, DELAY> {
    interface: DisplayInterface<SPI, BSY, DC, RST>,
    delay: DELAY,
    width: u16,
    height: u16,
    /// Scratch rows for shifted window data
    mono_row: Vec<u8>,
    accent_row: Vec<u8>,
    powered: bool,
    asleep: bool,
}

impl<SPI, BSY, DC, RST, DELAY> Gd7965<SPI, BSY, DC, RST, DELAY>
where
    SPI: SpiDevice,
    RST: OutputPin,
    DC: OutputPin,
    BSY: InputPin,
    DELAY: DelayNs,
{
    /// Create and initialize the 800x480 panel
    pub fn new(spi: SPI, busy: BSY, dc: DC, rst: RST, delay: DELAY) -> Result<Self, DisplayError> {
        Self::with_size(spi, busy, dc, rst, delay, WIDTH, HEIGHT)
    }

    pub fn with_size(
        spi: SPI,
        busy: BSY,
        dc: DC,
        rst: RST,
        delay: DELAY,
        width: u16,
        height: u16,
    ) -> Result<Self, DisplayError> {
        // One spare byte for rows that straddle a byte boundary after shifting
        let row_len = row_bytes(width) + 1;
        let mut gd7965 = Gd7965 {
            interface: DisplayInterface::new(spi, busy, dc, rst),
            delay,
            width,
            height,
            mono_row: vec![0; row_len],
            accent_row: vec![0; row_len],
            powered: false,
            asleep: false,
        };
        gd7965.init()?;
        Ok(gd7965)
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    /// Reset and configure the controller, leaves it powered on
    pub fn init(&mut self) -> Result<(), DisplayError> {
        log::info!("Initializing GD7965 {}x{}", self.width, self.height);
        self.interface.reset(&mut self.delay)?;

        self.interface
            .cmd_with_data(Cmd::POWER_SETTING, &Flag::POWER_SETTING)?;
        self.interface
            .cmd_with_data(Cmd::BOOSTER_SOFT_START, &Flag::BOOSTER_SOFT_START)?;
        self.power_on()?;

        self.interface
            .cmd_with_data(Cmd::PANEL_SETTING, &[Flag::PANEL_SETTING_KWR])?;
        self.interface
            .cmd_with_data(Cmd::PLL_CONTROL, &[Flag::PLL_50HZ])?;
        let [w_hi, w_lo] = self.width.to_be_bytes();
        let [h_hi, h_lo] = self.height.to_be_bytes();
        self.interface
            .cmd_with_data(Cmd::RESOLUTION_SETTING, &[w_hi, w_lo, h_hi, h_lo])?;
        self.interface
            .cmd_with_data(Cmd::DUAL_SPI, &[Flag::DUAL_SPI_OFF])?;
        self.interface
            .cmd_with_data(Cmd::VCOM_DATA_INTERVAL, &Flag::VCOM_WHITE_BORDER)?;
        self.interface
            .cmd_with_data(Cmd::TCON_SETTING, &[Flag::TCON_DEFAULT])?;

        self.asleep = false;
        Ok(())
    }

    fn power_on(&mut self) -> Result<(), DisplayError> {
        if self.powered {
            return Ok(());
        }
        self.interface.cmd(Cmd::POWER_ON)?;
        self.interface
            .wait_until_idle(&mut self.delay, POWER_TIMEOUT_MS);
        self.powered = true;
        Ok(())
    }

    fn power_off(&mut self) -> Result<(), DisplayError> {
        if !self.powered {
            return Ok(());
        }
        self.interface.cmd(Cmd::POWER_OFF)?;
        self.interface
            .wait_until_idle(&mut self.delay, POWER_TIMEOUT_MS);
        self.powered = false;
        Ok(())
    }

    fn ensure_awake(&mut self) -> Result<(), DisplayError> {
        if self.asleep {
            log::info!("Waking GD7965 from deep sleep");
            self.init()?;
        }
        Ok(())
    }

    /// Power off and enter deep sleep, the next write or refresh resets the controller
    pub fn sleep(&mut self) -> Result<(), DisplayError> {
        log::info!("GD7965 entering deep sleep");
        self.power_off()?;
        self.interface
            .cmd_with_data(Cmd::DEEP_SLEEP, &[Flag::DEEP_SLEEP_CHECK])?;
        self.asleep = true;
        Ok(())
    }

    /// Give back the bus, pins and delay
    pub fn release(self) -> (SPI, BSY, DC, RST, DELAY) {
        let (spi, busy, dc, rst) = self.interface.release();
        (spi, busy, dc, rst, self.delay)
    }

    fn set_partial_window(&mut self, x0: u16, x1: u16, y0: u16, y1: u16) -> Result<(), DisplayError> {
        let [xs_hi, xs_lo] = x0.to_be_bytes();
        let [xe_hi, xe_lo] = x1.to_be_bytes();
        let [ys_hi, ys_lo] = y0.to_be_bytes();
        let [ye_hi, ye_lo] = y1.to_be_bytes();
        self.interface.cmd_with_data(
            Cmd::PARTIAL_WINDOW,
            &[
                xs_hi,
                xs_lo,
                xe_hi,
                xe_lo,
                ys_hi,
                ys_lo,
                ye_hi,
                ye_lo,
                Flag::PARTIAL_SCAN_ALL,
            ],
        )
    }
}

/// Copy `width` pixels from `src` into `out` starting at bit `shift`.
///
/// Bits of `out` outside the copied run are set to `pad`. With `invert` every copied
/// bit is flipped.
fn shift_row(src: &[u8], width: usize, shift: usize, out: &mut [u8], invert: bool, pad: bool) {
    out.fill(if pad { 0xFF } else { 0x00 });
    for i in 0..width {
        let bit = src[i / 8] & (0x80 >> (i % 8)) != 0;
        let at = shift + i;
        let mask = 0x80 >> (at % 8);
        if bit != invert {
            out[at / 8] |= mask;
        } else {
            out[at / 8] &= !mask;
        }
    }
}

impl<SPI, BSY, DC, RST, DELAY> TriColorDisplay for Gd7965<SPI, BSY, DC, RST, DELAY>
where
    SPI: SpiDevice,
    RST: OutputPin,
    DC: OutputPin,
    BSY: InputPin,
    DELAY: DelayNs,
{
    fn write_image(
        &mut self,
        mono: &[u8],
        accent: &[u8],
        x: u16,
        y: u16,
        width: u16,
        height: u16,
    ) -> Result<(), DisplayError> {
        check_window(mono, accent, width, height)?;
        if x >= self.width || y >= self.height || width == 0 || height == 0 {
            log::debug!("Window at ({}, {}) is off the panel", x, y);
            return Ok(());
        }
        self.ensure_awake()?;

        let src_stride = row_bytes(width);
        let visible_w = width.min(self.width - x);
        let visible_h = height.min(self.height - y);
        let x0 = x & !7;
        let x1 = (x + visible_w - 1) | 7;
        let shift = (x - x0) as usize;
        let window_bytes = (x1 - x0 + 1) as usize / 8;

        self.interface.cmd(Cmd::PARTIAL_IN)?;
        self.set_partial_window(x0, x1, y, y + visible_h - 1)?;

        self.interface.cmd(Cmd::DATA_START_TRANSMISSION_1)?;
        for row in 0..visible_h as usize {
            let src = &mono[row * src_stride..][..src_stride];
            let out = &mut self.mono_row[..window_bytes];
            shift_row(src, visible_w as usize, shift, out, false, true);
            self.interface.data(out)?;
        }

        self.interface.cmd(Cmd::DATA_START_TRANSMISSION_2)?;
        for row in 0..visible_h as usize {
            let src = &accent[row * src_stride..][..src_stride];
            let out = &mut self.accent_row[..window_bytes];
            shift_row(src, visible_w as usize, shift, out, true, false);
            self.interface.data(out)?;
        }

        self.interface.cmd(Cmd::PARTIAL_OUT)
    }

    fn refresh(&mut self, full: bool) -> Result<(), DisplayError> {
        if !full {
            log::debug!("Tri-color panel has no partial waveform, refreshing fully");
        }
        self.ensure_awake()?;
        self.power_on()?;
        log::info!("Refreshing GD7965");
        self.interface.cmd(Cmd::DISPLAY_REFRESH)?;
        self.delay.delay_ms(1);
        self.interface
            .wait_until_idle(&mut self.delay, REFRESH_TIMEOUT_MS);
        Ok(())
    }

    /// Fill both controller RAMs, the panel keeps whatever they held before otherwise
    fn clear(&mut self) -> Result<(), DisplayError> {
        self.ensure_awake()?;
        let plane = row_bytes(self.width) * self.height as usize;
        log::info!("Clearing GD7965 RAM ({} bytes per plane)", plane);

        self.interface.cmd(Cmd::DATA_START_TRANSMISSION_1)?;
        self.interface.data_x_times(Flag::DTM1_WHITE, plane)?;
        self.interface.cmd(Cmd::DATA_START_TRANSMISSION_2)?;
        self.interface.data_x_times(Flag::DTM2_NO_RED, plane)
    }
}
