//! Pixel classification and packing into the two display planes.
//!
//! Every pixel ends up as exactly one of background, foreground (black) or accent
//! (red). Background leaves both plane bits set, the other two classes clear exactly
//! one bit:
//!
//! | class      | mono bit | accent bit |
//! |------------|----------|------------|
//! | background | 1        | 1          |
//! | foreground | 0        | 1          |
//! | accent     | 1        | 0          |

use crate::config::ColorMode;
use crate::error::FormatError;

/// Components above this count as light
const LIGHT: u8 = 0x80;

/// Components above this count as saturated
const SATURATED: u8 = 0xF0;

/// Alpha below this is treated as fully transparent
const OPAQUE: u8 = 0x80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelClass {
    Background,
    Foreground,
    Accent,
}

impl PixelClass {
    pub fn of_rgb(r: u8, g: u8, b: u8, mode: ColorMode) -> Self {
        match mode {
            ColorMode::TriColor => {
                if r > LIGHT && g > LIGHT && b > LIGHT {
                    PixelClass::Background
                } else if r > SATURATED || (g > SATURATED && b > SATURATED) {
                    PixelClass::Accent
                } else {
                    PixelClass::Foreground
                }
            }
            ColorMode::Mono => {
                if r as u16 + g as u16 + b as u16 > 3 * LIGHT as u16 {
                    PixelClass::Background
                } else {
                    PixelClass::Foreground
                }
            }
        }
    }
}

/// Byte layout of one decoded pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
    /// BMP 24-bit
    Bgr24,
    /// BMP 32-bit, the fourth byte is ignored
    Bgrx32,
    Rgb24,
    Rgba32,
    Gray8,
    GrayAlpha16,
    /// Palette index, used as a gray level
    Indexed8,
}

impl PixelLayout {
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelLayout::Gray8 | PixelLayout::Indexed8 => 1,
            PixelLayout::GrayAlpha16 => 2,
            PixelLayout::Bgr24 | PixelLayout::Rgb24 => 3,
            PixelLayout::Bgrx32 | PixelLayout::Rgba32 => 4,
        }
    }

    /// Color of one pixel, `None` when it is transparent
    fn rgb(self, px: &[u8]) -> Option<[u8; 3]> {
        match self {
            PixelLayout::Bgr24 | PixelLayout::Bgrx32 => Some([px[2], px[1], px[0]]),
            PixelLayout::Rgb24 => Some([px[0], px[1], px[2]]),
            PixelLayout::Rgba32 => (px[3] >= OPAQUE).then(|| [px[0], px[1], px[2]]),
            PixelLayout::Gray8 | PixelLayout::Indexed8 => Some([px[0]; 3]),
            PixelLayout::GrayAlpha16 => (px[1] >= OPAQUE).then(|| [px[0]; 3]),
        }
    }

    pub fn classify(self, px: &[u8], mode: ColorMode) -> PixelClass {
        match self.rgb(px) {
            Some([r, g, b]) => PixelClass::of_rgb(r, g, b, mode),
            None => PixelClass::Background,
        }
    }
}

/// The visible part of one decoded scanline, already placed on the surface
#[derive(Debug, Clone, Copy)]
pub struct PixelRow<'a> {
    /// Destination row
    pub y: u16,
    /// Destination column of the first pixel in `data`
    pub x: u16,
    pub layout: PixelLayout,
    pub data: &'a [u8],
}

impl PixelRow<'_> {
    pub fn width(&self) -> usize {
        self.data.len() / self.layout.bytes_per_pixel()
    }
}

/// One reusable pair of packed rows.
///
/// Sized once for the widest row the surface can take; a wider row is rejected,
/// never truncated.
#[derive(Debug, Clone)]
pub struct BitplaneRow {
    mono: Vec<u8>,
    accent: Vec<u8>,
    capacity: usize,
    width: usize,
}

impl BitplaneRow {
    pub fn new(capacity: usize) -> Self {
        let bytes = capacity.div_ceil(8);
        Self {
            mono: vec![0xFF; bytes],
            accent: vec![0xFF; bytes],
            capacity,
            width: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn mono(&self) -> &[u8] {
        &self.mono[..self.width.div_ceil(8)]
    }

    pub fn accent(&self) -> &[u8] {
        &self.accent[..self.width.div_ceil(8)]
    }

    /// Start a new row of `width` background pixels
    pub fn reset(&mut self, width: usize) -> Result<(), FormatError> {
        if width > self.capacity {
            return Err(FormatError::RowTooWide {
                width,
                capacity: self.capacity,
            });
        }
        let bytes = width.div_ceil(8);
        self.mono[..bytes].fill(0xFF);
        self.accent[..bytes].fill(0xFF);
        self.width = width;
        Ok(())
    }

    /// Mark pixel `i` of the current row, `i` counted from the row's first visible pixel
    pub fn set(&mut self, i: usize, class: PixelClass) {
        let mask = !(0x80u8 >> (i % 8));
        match class {
            PixelClass::Background => {}
            PixelClass::Foreground => self.mono[i / 8] &= mask,
            PixelClass::Accent => self.accent[i / 8] &= mask,
        }
    }

    /// Classify and pack a whole decoded row
    pub fn encode(&mut self, row: &PixelRow<'_>, mode: ColorMode) -> Result<(), FormatError> {
        let width = row.width();
        self.reset(width)?;
        let bpp = row.layout.bytes_per_pixel();
        for (i, px) in row.data.chunks_exact(bpp).enumerate() {
            self.set(i, row.layout.classify(px, mode));
        }
        Ok(())
    }
}
