//! Fallback screen for cycles where no picture could be fetched or rendered

use embedded_graphics::mono_font::{iso_8859_15::FONT_10X20, MonoTextStyle};
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};
use embedded_graphics::text::{Baseline, Text};
use log::{info, warn};

use super::{TriColor, TriColorDisplay, TriColorFrame};
use crate::config::Surface;

const MARGIN: i32 = 10;
const BANNER_HEIGHT: u32 = 40;
const CHAR_WIDTH: u32 = 10;

/// Splash image with `message` in red along the bottom edge.
///
/// `splash` is a raw black plane + red plane dump for `surface`; anything else
/// (including an empty slice) leaves a white background.
pub fn fallback_screen(surface: Surface, splash: &[u8], message: &str) -> TriColorFrame {
    let mut frame = TriColorFrame::new(surface);

    if splash.len() as u64 == surface.raw_asset_len() {
        let (mono, accent) = splash.split_at(surface.plane_len());
        if let Err(e) = frame.write_image(mono, accent, 0, 0, surface.width, surface.height) {
            warn!("Splash not drawn: {:?}", e);
        }
    } else if !splash.is_empty() {
        warn!(
            "Splash is {} bytes, expected {} for {}x{}",
            splash.len(),
            surface.raw_asset_len(),
            surface.width,
            surface.height
        );
    }

    let width = surface.width as u32;
    let height = surface.height as i32;
    let banner = BANNER_HEIGHT.min(surface.height as u32);

    // DrawTarget for the frame is infallible
    let _ = Rectangle::new(Point::new(0, height - banner as i32), Size::new(width, banner))
        .into_styled(PrimitiveStyle::with_fill(TriColor::White))
        .draw(&mut frame);

    let fits = (width.saturating_sub(2 * MARGIN as u32) / CHAR_WIDTH) as usize;
    let line: String = message.chars().take(fits).collect();
    info!("Fallback screen: {}", line);

    let style = MonoTextStyle::new(&FONT_10X20, TriColor::Red);
    let _ = Text::with_baseline(
        &line,
        Point::new(MARGIN, height - MARGIN),
        style,
        Baseline::Bottom,
    )
    .draw(&mut frame);

    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    const SURFACE: Surface = Surface::new(200, 60);

    fn count(frame: &TriColorFrame, color: TriColor, rows: std::ops::Range<u16>) -> usize {
        rows.flat_map(|y| (0..frame.width()).map(move |x| (x, y)))
            .filter(|&(x, y)| frame.pixel(x, y) == Some(color))
            .count()
    }

    #[test]
    fn message_on_white() {
        let frame = fallback_screen(SURFACE, &[], "Network unavailable");

        assert_eq!(count(&frame, TriColor::Red, 0..20), 0);
        assert!(count(&frame, TriColor::Red, 20..60) > 0);
        assert_eq!(count(&frame, TriColor::Black, 0..60), 0);
    }

    #[test]
    fn splash_under_banner() {
        let plane = SURFACE.plane_len();
        let mut splash = vec![0x00; plane];
        splash.extend(vec![0xFF; plane]);

        let frame = fallback_screen(SURFACE, &splash, "x");

        assert_eq!(frame.pixel(0, 0), Some(TriColor::Black));
        assert_eq!(frame.pixel(199, 19), Some(TriColor::Black));
        // Banner background is cleared
        assert_eq!(frame.pixel(199, 59), Some(TriColor::White));
        assert!(count(&frame, TriColor::Red, 20..60) > 0);
    }

    #[test]
    fn wrong_splash_size_is_ignored() {
        let frame = fallback_screen(SURFACE, &[0x00; 10], "");
        assert_eq!(count(&frame, TriColor::Black, 0..60), 0);
        assert_eq!(count(&frame, TriColor::Red, 0..60), 0);
    }
}
