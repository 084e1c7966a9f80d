//! Full frame held in RAM.
//!
//! Only used where a whole frame is affordable: the fallback screen and the host
//! preview. The normal render path streams rows straight to the panel.

use std::convert::Infallible;

use display_interface::DisplayError;
use embedded_graphics::prelude::{DrawTarget, OriginDimensions, Pixel, Size};

use super::{check_window, row_bytes, TriColor, TriColorDisplay};
use crate::config::Surface;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriColorFrame {
    width: u16,
    height: u16,
    mono: Vec<u8>,
    accent: Vec<u8>,
    refreshes: usize,
}

impl TriColorFrame {
    /// All white frame
    pub fn new(surface: Surface) -> Self {
        let len = surface.plane_len();
        Self {
            width: surface.width,
            height: surface.height,
            mono: vec![0xFF; len],
            accent: vec![0xFF; len],
            refreshes: 0,
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn mono_plane(&self) -> &[u8] {
        &self.mono
    }

    pub fn accent_plane(&self) -> &[u8] {
        &self.accent
    }

    /// How often the frame was asked to refresh
    pub fn refreshes(&self) -> usize {
        self.refreshes
    }

    fn index(&self, x: u16, y: u16) -> Option<(usize, u8)> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let index = y as usize * row_bytes(self.width) + x as usize / 8;
        Some((index, 0x80 >> (x % 8)))
    }

    pub fn pixel(&self, x: u16, y: u16) -> Option<TriColor> {
        let (index, mask) = self.index(x, y)?;
        Some(TriColor::from_plane_bits(
            self.mono[index] & mask != 0,
            self.accent[index] & mask != 0,
        ))
    }

    /// Out of bounds coordinates are ignored
    pub fn set_pixel(&mut self, x: u16, y: u16, color: TriColor) {
        let Some((index, mask)) = self.index(x, y) else {
            return;
        };
        let (mono, accent) = color.plane_bits();
        set_bit(&mut self.mono[index], mask, mono);
        set_bit(&mut self.accent[index], mask, accent);
    }

    pub fn fill(&mut self, color: TriColor) {
        let (mono, accent) = color.plane_bits();
        self.mono.fill(if mono { 0xFF } else { 0x00 });
        self.accent.fill(if accent { 0xFF } else { 0x00 });
    }

    /// Packed RGB, three bytes per pixel, rows top to bottom
    pub fn to_rgb(&self) -> Vec<u8> {
        let mut rgb = Vec::with_capacity(self.width as usize * self.height as usize * 3);
        for y in 0..self.height {
            for x in 0..self.width {
                let color = self.pixel(x, y).unwrap_or_default();
                rgb.extend_from_slice(&color.rgb());
            }
        }
        rgb
    }

    /// Send the whole frame to a panel in one window
    pub fn flush_to<D: TriColorDisplay>(&self, display: &mut D) -> Result<(), DisplayError> {
        display.write_image(&self.mono, &self.accent, 0, 0, self.width, self.height)
    }
}

fn set_bit(byte: &mut u8, mask: u8, value: bool) {
    if value {
        *byte |= mask;
    } else {
        *byte &= !mask;
    }
}

impl TriColorDisplay for TriColorFrame {
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
        let stride = row_bytes(width);

        for row in 0..height {
            let Some(dy) = y.checked_add(row) else {
                break;
            };
            for col in 0..width {
                let Some(dx) = x.checked_add(col) else {
                    break;
                };
                let index = row as usize * stride + col as usize / 8;
                let mask = 0x80 >> (col % 8);
                let color =
                    TriColor::from_plane_bits(mono[index] & mask != 0, accent[index] & mask != 0);
                self.set_pixel(dx, dy, color);
            }
        }
        Ok(())
    }

    fn refresh(&mut self, _full: bool) -> Result<(), DisplayError> {
        self.refreshes += 1;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), DisplayError> {
        self.fill(TriColor::White);
        Ok(())
    }
}

impl OriginDimensions for TriColorFrame {
    fn size(&self) -> Size {
        Size::new(self.width as u32, self.height as u32)
    }
}

impl DrawTarget for TriColorFrame {
    type Color = TriColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if let (Ok(x), Ok(y)) = (u16::try_from(point.x), u16::try_from(point.y)) {
                self.set_pixel(x, y, color);
            }
        }
        Ok(())
    }
}
