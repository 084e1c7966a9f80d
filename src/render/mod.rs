//! Streaming renderer: stored asset in, plane rows out.
//!
//! Nothing here ever holds more than one destination row of plane data (the raw
//! loader excepted, which keeps both planes of the file). Rows are written to the
//! display in ascending surface order as soon as they are encoded.

use std::io::{Read, Seek};

use display_interface::DisplayError;
use log::{debug, error, info, warn};

use crate::config::{ColorMode, Surface};
use crate::display::{fallback_screen, TriColorDisplay};
use crate::error::{FormatError, PipelineError};
use crate::storage::Storage;

pub mod bitplane;
pub mod bmp;
pub mod placement;
pub mod png;
pub mod raw;
pub mod sniff;

pub use self::bitplane::{BitplaneRow, PixelClass, PixelLayout, PixelRow};
pub use self::bmp::BmpDecoder;
pub use self::placement::{Origin, PlacementRect};
pub use self::png::{PngBackend, PngCrateBackend, PngDecoder};
pub use self::raw::RawBitplaneLoader;
pub use self::sniff::{classify, AssetFormat, Sniffed};

/// One decoder per [`AssetFormat`]
pub trait ImageDecoder {
    /// Decode the asset in `reader` and push every visible row into `rows`
    fn decode<R, D>(
        &mut self,
        reader: R,
        origin: Origin,
        rows: &mut RowStream<'_, D>,
    ) -> Result<(), PipelineError>
    where
        R: Read + Seek,
        D: TriColorDisplay;
}

/// Encodes decoded rows and writes them to the display one at a time
pub struct RowStream<'d, D> {
    display: &'d mut D,
    planes: BitplaneRow,
    mode: ColorMode,
    rows: u32,
}

impl<'d, D: TriColorDisplay> RowStream<'d, D> {
    pub fn new(display: &'d mut D, surface: Surface, mode: ColorMode) -> Self {
        Self {
            display,
            planes: BitplaneRow::new(surface.width as usize),
            mode,
            rows: 0,
        }
    }

    pub fn mode(&self) -> ColorMode {
        self.mode
    }

    /// Rows written so far
    pub fn rows_written(&self) -> u32 {
        self.rows
    }

    /// Classify, pack and write one decoded row
    pub fn push(&mut self, row: &PixelRow<'_>) -> Result<(), PipelineError> {
        self.planes.encode(row, self.mode)?;
        let width = self.planes.width() as u16;
        self.display
            .write_image(
                self.planes.mono(),
                self.planes.accent(),
                row.x,
                row.y,
                width,
                1,
            )
            .map_err(|e| self.write_failed(row.y, e))?;
        self.rows += 1;
        Ok(())
    }

    /// Write a row that is already in plane format
    pub fn push_planes(
        &mut self,
        mono: &[u8],
        accent: &[u8],
        x: u16,
        y: u16,
        width: u16,
    ) -> Result<(), PipelineError> {
        if width as usize > self.planes.capacity() {
            return Err(FormatError::RowTooWide {
                width: width as usize,
                capacity: self.planes.capacity(),
            }
            .into());
        }
        self.display
            .write_image(mono, accent, x, y, width, 1)
            .map_err(|e| self.write_failed(y, e))?;
        self.rows += 1;
        Ok(())
    }

    fn write_failed(&self, y: u16, err: DisplayError) -> PipelineError {
        warn!("Display write of row {} failed after {} rows", y, self.rows);
        PipelineError::Display(err)
    }
}

/// Result of a successful render
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rendered {
    pub format: AssetFormat,
    pub rows: u32,
}

/// What the panel memory holds after [`Renderer::present`]
#[derive(Debug)]
pub enum Shown {
    Asset(Rendered),
    /// The fallback screen, with the failure that put it there
    Fallback(PipelineError),
}

/// Sniffs an asset and hands it to the matching decoder
pub struct Renderer<P = PngCrateBackend> {
    surface: Surface,
    mode: ColorMode,
    png: P,
}

impl Renderer<PngCrateBackend> {
    pub fn new(surface: Surface, mode: ColorMode) -> Self {
        Self::with_png_backend(surface, mode, PngCrateBackend)
    }
}

impl<P: PngBackend> Renderer<P> {
    pub fn with_png_backend(surface: Surface, mode: ColorMode, png: P) -> Self {
        Self {
            surface,
            mode,
            png,
        }
    }

    pub fn surface(&self) -> Surface {
        self.surface
    }

    /// Fill the panel memory for this cycle without refreshing.
    ///
    /// The panel is cleared first. `acquired` carries the stored asset path, or the
    /// reason there is none; that reason and any render failure both end with the
    /// fallback screen written over the whole surface.
    pub fn present<S, D>(
        &mut self,
        storage: &S,
        acquired: Result<&str, PipelineError>,
        origin: Origin,
        splash: &[u8],
        display: &mut D,
    ) -> Result<Shown, DisplayError>
    where
        S: Storage,
        D: TriColorDisplay,
    {
        display.clear()?;

        let failure = match acquired
            .and_then(|path| self.render_asset(storage, path, origin, &mut *display))
        {
            Ok(rendered) => return Ok(Shown::Asset(rendered)),
            Err(e) => e,
        };
        error!("No picture this cycle: {}", failure);
        fallback_screen(self.surface, splash, &failure.to_string()).flush_to(display)?;
        Ok(Shown::Fallback(failure))
    }

    /// Render the asset stored at `path`. The file is closed again on every exit path.
    pub fn render_asset<S, D>(
        &mut self,
        storage: &S,
        path: &str,
        origin: Origin,
        display: &mut D,
    ) -> Result<Rendered, PipelineError>
    where
        S: Storage,
        D: TriColorDisplay,
    {
        let reader = storage
            .open_read(path)
            .map_err(PipelineError::storage("opening asset"))?;
        info!("Rendering {}", path);
        self.render_reader(reader, origin, display)
    }

    pub fn render_reader<R, D>(
        &mut self,
        mut reader: R,
        origin: Origin,
        display: &mut D,
    ) -> Result<Rendered, PipelineError>
    where
        R: Read + Seek,
        D: TriColorDisplay,
    {
        let sniffed = sniff::classify(&mut reader, self.surface)
            .map_err(PipelineError::storage("sniffing asset"))?;
        debug!("Asset is {:?} ({} bytes)", sniffed.format, sniffed.len);

        let mut rows = RowStream::new(display, self.surface, self.mode);
        match sniffed.format {
            AssetFormat::Bmp => BmpDecoder::new(self.surface).decode(reader, origin, &mut rows)?,
            AssetFormat::Png => {
                PngDecoder::new(&mut self.png, self.surface).decode(reader, origin, &mut rows)?
            }
            AssetFormat::RawBitplane => {
                RawBitplaneLoader::new(self.surface).decode(reader, origin, &mut rows)?
            }
            AssetFormat::Unknown => {
                warn!("Unrecognised asset of {} bytes, nothing drawn", sniffed.len);
                return Err(FormatError::UnknownFormat { len: sniffed.len }.into());
            }
        }

        let rendered = Rendered {
            format: sniffed.format,
            rows: rows.rows_written(),
        };
        info!("Rendered {:?}: {} rows", rendered.format, rendered.rows);
        Ok(rendered)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::testing::{MemStorage, RecordingDisplay};

    /// Hand assembled 24-bit BMP, `pixels` given as RGB, rows top to bottom
    pub(crate) fn bmp24(width: u32, pixels: &[[u8; 3]], top_down: bool) -> Vec<u8> {
        let height = pixels.len() as u32 / width;
        let stride = (width * 3 + 3) & !3;
        let data_len = stride * height;
        let mut out = Vec::new();
        out.extend_from_slice(b"BM");
        out.extend_from_slice(&(54 + data_len).to_le_bytes());
        out.extend_from_slice(&[0; 4]);
        out.extend_from_slice(&54u32.to_le_bytes());
        out.extend_from_slice(&40u32.to_le_bytes());
        out.extend_from_slice(&(width as i32).to_le_bytes());
        let h = if top_down {
            -(height as i32)
        } else {
            height as i32
        };
        out.extend_from_slice(&h.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&24u16.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&data_len.to_le_bytes());
        out.extend_from_slice(&[0; 16]);
        assert_eq!(out.len(), 54);

        for file_row in 0..height {
            let row = if top_down {
                file_row
            } else {
                height - 1 - file_row
            };
            let start = out.len();
            for x in 0..width {
                let [r, g, b] = pixels[(row * width + x) as usize];
                out.extend_from_slice(&[b, g, r]);
            }
            out.resize(start + stride as usize, 0);
        }
        out
    }

    const WHITE: [u8; 3] = [255, 255, 255];
    const RED: [u8; 3] = [255, 0, 0];
    const BLACK: [u8; 3] = [0, 0, 0];

    #[test]
    fn renders_small_bmp_centered() {
        let storage = MemStorage::new();
        storage.put("/render.img", &bmp24(2, &[WHITE, RED, BLACK, WHITE], true));

        let mut display = RecordingDisplay::new();
        let mut renderer = Renderer::new(Surface::default(), ColorMode::TriColor);
        let rendered = renderer
            .render_asset(&storage, "/render.img", Origin::default(), &mut display)
            .unwrap();

        assert_eq!(rendered.format, AssetFormat::Bmp);
        assert_eq!(rendered.rows, 2);
        assert_eq!(display.writes.len(), 2);

        let row0 = display.row(239).unwrap();
        assert_eq!((row0.x, row0.width, row0.height), (399, 2, 1));
        assert_eq!(row0.mono[0] >> 6, 0b11);
        assert_eq!(row0.accent[0] >> 6, 0b10);

        let row1 = display.row(240).unwrap();
        assert_eq!(row1.mono[0] >> 6, 0b01);
        assert_eq!(row1.accent[0] >> 6, 0b11);
        // Nothing refreshes on its own
        assert!(display.refreshes.is_empty());
    }

    #[test]
    fn unknown_asset_draws_nothing() {
        let storage = MemStorage::new();
        storage.put("/render.img", b"<html>oops</html>");

        let mut display = RecordingDisplay::new();
        let mut renderer = Renderer::new(Surface::default(), ColorMode::TriColor);
        let err = renderer
            .render_asset(&storage, "/render.img", Origin::default(), &mut display)
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::FormatError(FormatError::UnknownFormat { len: 17 })
        ));
        assert!(display.writes.is_empty());
    }

    #[test]
    fn missing_asset_is_storage_failure() {
        let mut display = RecordingDisplay::new();
        let mut renderer = Renderer::new(Surface::default(), ColorMode::TriColor);
        let err = renderer
            .render_asset(&MemStorage::new(), "/nope", Origin::default(), &mut display)
            .unwrap_err();
        assert!(matches!(err, PipelineError::StorageFailure { .. }));
    }

    #[test]
    fn display_errors_stop_the_render() {
        let pixels = vec![BLACK; 4 * 4];
        let mut display = RecordingDisplay {
            fail_after: Some(2),
            ..RecordingDisplay::new()
        };
        let mut renderer = Renderer::new(Surface::new(8, 8), ColorMode::TriColor);
        let err = renderer
            .render_reader(
                std::io::Cursor::new(bmp24(4, &pixels, false)),
                Origin::default(),
                &mut display,
            )
            .unwrap_err();

        assert!(matches!(err, PipelineError::Display(DisplayError::BusWriteError)));
        assert_eq!(display.writes.len(), 2);
    }

    #[test]
    fn rows_arrive_in_surface_order() {
        let pixels: Vec<[u8; 3]> = (0..3 * 5).map(|i| if i % 2 == 0 { RED } else { WHITE }).collect();
        for top_down in [true, false] {
            let mut display = RecordingDisplay::new();
            let mut renderer = Renderer::new(Surface::new(16, 16), ColorMode::TriColor);
            renderer
                .render_reader(
                    std::io::Cursor::new(bmp24(3, &pixels, top_down)),
                    Origin::default(),
                    &mut display,
                )
                .unwrap();
            let ys: Vec<u16> = display.writes.iter().map(|w| w.y).collect();
            assert_eq!(ys, vec![5, 6, 7, 8, 9]);
        }
    }

    #[test]
    fn present_clears_before_drawing() {
        let storage = MemStorage::new();
        storage.put("/render.img", &bmp24(2, &[WHITE, RED, BLACK, WHITE], true));

        let mut display = RecordingDisplay::new();
        let mut renderer = Renderer::new(Surface::new(16, 8), ColorMode::TriColor);
        let shown = renderer
            .present(&storage, Ok("/render.img"), Origin::default(), &[], &mut display)
            .unwrap();

        assert!(matches!(shown, Shown::Asset(Rendered { rows: 2, .. })));
        assert_eq!(display.clears, vec![0]);
        assert_eq!(display.writes.len(), 2);
        assert!(display.refreshes.is_empty());
    }

    #[test]
    fn present_without_asset_writes_fallback() {
        let mut display = RecordingDisplay::new();
        let mut renderer = Renderer::new(Surface::new(64, 32), ColorMode::TriColor);
        let shown = renderer
            .present(
                &MemStorage::new(),
                Err(PipelineError::Unavailable { attempts: 3 }),
                Origin::default(),
                &[],
                &mut display,
            )
            .unwrap();

        assert!(matches!(
            shown,
            Shown::Fallback(PipelineError::Unavailable { attempts: 3 })
        ));
        assert_eq!(display.clears, vec![0]);
        assert_eq!(display.writes.len(), 1);
        let screen = &display.writes[0];
        assert_eq!((screen.x, screen.y, screen.width, screen.height), (0, 0, 64, 32));
    }

    #[test]
    fn present_covers_a_failed_render() {
        let storage = MemStorage::new();
        storage.put("/render.img", b"<html>oops</html>");

        let mut display = RecordingDisplay::new();
        let mut renderer = Renderer::new(Surface::new(64, 32), ColorMode::TriColor);
        let shown = renderer
            .present(&storage, Ok("/render.img"), Origin::default(), &[], &mut display)
            .unwrap();

        assert!(matches!(
            shown,
            Shown::Fallback(PipelineError::FormatError(FormatError::UnknownFormat { .. }))
        ));
        assert_eq!(display.clears, vec![0]);
        assert_eq!(display.writes.len(), 1);
        assert_eq!(display.writes[0].height, 32);
    }
}
