//! Panel abstraction shared by the renderer, the panel driver and the host preview.
//!
//! Pixel data always travels as two packed 1-bit planes, most significant bit first,
//! `ceil(width / 8)` bytes per row:
//!
//! - mono plane: `1` = white, `0` = black
//! - accent plane: `1` = no red, `0` = red
//!
//! A pixel with both bits cleared shows red.

use display_interface::DisplayError;
use embedded_graphics::pixelcolor::PixelColor;

mod frame;
pub mod status;

pub use frame::TriColorFrame;
pub use status::fallback_screen;

/// The three inks of the panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriColor {
    #[default]
    White,
    Black,
    Red,
}

impl PixelColor for TriColor {
    type Raw = ();
}

impl TriColor {
    /// Bits of this color in the (mono, accent) planes
    pub const fn plane_bits(self) -> (bool, bool) {
        match self {
            TriColor::White => (true, true),
            TriColor::Black => (false, true),
            TriColor::Red => (true, false),
        }
    }

    pub const fn from_plane_bits(mono: bool, accent: bool) -> Self {
        match (mono, accent) {
            (_, false) => TriColor::Red,
            (false, true) => TriColor::Black,
            (true, true) => TriColor::White,
        }
    }

    pub const fn rgb(self) -> [u8; 3] {
        match self {
            TriColor::White => [0xFF, 0xFF, 0xFF],
            TriColor::Black => [0x00, 0x00, 0x00],
            TriColor::Red => [0xFF, 0x00, 0x00],
        }
    }
}

/// Bytes per packed row of `width` pixels
pub const fn row_bytes(width: u16) -> usize {
    (width as usize).div_ceil(8)
}

/// Something that accepts windows of plane data.
///
/// `mono` and `accent` hold `height` rows of [`row_bytes`]`(width)` bytes each. Writes
/// land in controller memory, nothing becomes visible before [`refresh`](Self::refresh).
pub trait TriColorDisplay {
    fn write_image(
        &mut self,
        mono: &[u8],
        accent: &[u8],
        x: u16,
        y: u16,
        width: u16,
        height: u16,
    ) -> Result<(), DisplayError>;

    /// Show what was written. Tri-color panels always redraw the whole screen, `full`
    /// only matters to controllers with a partial waveform.
    fn refresh(&mut self, full: bool) -> Result<(), DisplayError>;

    /// Set the whole panel memory to white, no red
    fn clear(&mut self) -> Result<(), DisplayError>;
}

impl<D: TriColorDisplay + ?Sized> TriColorDisplay for &mut D {
    fn write_image(
        &mut self,
        mono: &[u8],
        accent: &[u8],
        x: u16,
        y: u16,
        width: u16,
        height: u16,
    ) -> Result<(), DisplayError> {
        (**self).write_image(mono, accent, x, y, width, height)
    }

    fn refresh(&mut self, full: bool) -> Result<(), DisplayError> {
        (**self).refresh(full)
    }

    fn clear(&mut self) -> Result<(), DisplayError> {
        (**self).clear()
    }
}

/// Checks that a window of `width` x `height` fits the given plane slices
pub(crate) fn check_window(
    mono: &[u8],
    accent: &[u8],
    width: u16,
    height: u16,
) -> Result<(), DisplayError> {
    let needed = row_bytes(width) * height as usize;
    if mono.len() < needed || accent.len() < needed {
        log::error!(
            "Window {}x{} needs {} bytes per plane, got {} / {}",
            width,
            height,
            needed,
            mono.len(),
            accent.len()
        );
        return Err(DisplayError::OutOfBoundsError);
    }
    Ok(())
}
