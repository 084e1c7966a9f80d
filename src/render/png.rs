//! PNG adapter around a streaming scanline decoder.
//!
//! The decoder behind [`PngBackend`] knows nothing about the surface. The adapter
//! computes the placement from the reported header first, then hands a
//! [`ScanlineContext`] to the decoder's per-row callback which clips and encodes
//! every row as it comes out of the inflater.

use std::io::{Read, Seek};

use log::{debug, info, warn};
use png::{BitDepth, ColorType, Transformations};

use super::{ImageDecoder, Origin, PixelLayout, PixelRow, PlacementRect, RowStream};
use crate::config::Surface;
use crate::display::TriColorDisplay;
use crate::error::PipelineError;

/// Pixel format of the decoded scanlines, one byte per sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanlineFormat {
    Truecolor,
    TruecolorAlpha,
    Indexed,
    Grayscale,
    GrayscaleAlpha,
}

impl ScanlineFormat {
    pub fn layout(self) -> PixelLayout {
        match self {
            ScanlineFormat::Truecolor => PixelLayout::Rgb24,
            ScanlineFormat::TruecolorAlpha => PixelLayout::Rgba32,
            ScanlineFormat::Indexed => PixelLayout::Indexed8,
            ScanlineFormat::Grayscale => PixelLayout::Gray8,
            ScanlineFormat::GrayscaleAlpha => PixelLayout::GrayAlpha16,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PngHeader {
    pub width: u32,
    pub height: u32,
    pub format: ScanlineFormat,
}

/// One decoded row as delivered by the backend
#[derive(Debug, Clone, Copy)]
pub struct Scanline<'a> {
    pub row: u32,
    pub format: ScanlineFormat,
    pub data: &'a [u8],
}

pub type ScanlineCallback<'c> = dyn FnMut(Scanline<'_>) -> Result<(), PipelineError> + 'c;

/// An opened PNG; closed when dropped
pub trait PngSession {
    fn header(&self) -> PngHeader;

    /// Decode the whole image, calling `on_row` once per scanline, top to bottom.
    ///
    /// An error returned by `on_row` stops decoding and is passed through.
    fn decode(&mut self, on_row: &mut ScanlineCallback<'_>) -> Result<(), PipelineError>;
}

/// Streaming PNG decoding capability
pub trait PngBackend {
    type Session<R: Read>: PngSession;

    fn open<R: Read>(&mut self, reader: R) -> Result<Self::Session<R>, PipelineError>;
}

/// [`PngBackend`] on top of the `png` crate.
///
/// Palette and sub-byte images are expanded and 16-bit samples stripped, so every
/// scanline comes out with one byte per sample.
#[derive(Debug, Clone, Copy, Default)]
pub struct PngCrateBackend;

pub struct PngCrateSession<R: Read> {
    reader: png::Reader<R>,
    header: PngHeader,
}

fn decode_failure(err: png::DecodingError) -> PipelineError {
    PipelineError::DecodeFailure(err.to_string())
}

impl PngBackend for PngCrateBackend {
    type Session<R: Read> = PngCrateSession<R>;

    fn open<R: Read>(&mut self, reader: R) -> Result<Self::Session<R>, PipelineError> {
        let mut decoder = png::Decoder::new(reader);
        decoder.set_transformations(Transformations::EXPAND | Transformations::STRIP_16);
        let reader = decoder.read_info().map_err(decode_failure)?;

        let info = reader.info();
        if info.interlaced {
            return Err(PipelineError::DecodeFailure(
                "interlaced PNG cannot be streamed by row".to_string(),
            ));
        }
        let (color, depth) = reader.output_color_type();
        if depth != BitDepth::Eight {
            return Err(PipelineError::DecodeFailure(format!(
                "unexpected output depth {:?}",
                depth
            )));
        }
        let format = match color {
            ColorType::Rgb => ScanlineFormat::Truecolor,
            ColorType::Rgba => ScanlineFormat::TruecolorAlpha,
            ColorType::Grayscale => ScanlineFormat::Grayscale,
            ColorType::GrayscaleAlpha => ScanlineFormat::GrayscaleAlpha,
            ColorType::Indexed => ScanlineFormat::Indexed,
        };
        let header = PngHeader {
            width: info.width,
            height: info.height,
            format,
        };
        Ok(PngCrateSession { reader, header })
    }
}

impl<R: Read> PngSession for PngCrateSession<R> {
    fn header(&self) -> PngHeader {
        self.header
    }

    fn decode(&mut self, on_row: &mut ScanlineCallback<'_>) -> Result<(), PipelineError> {
        let mut row = 0;
        while let Some(line) = self.reader.next_row().map_err(decode_failure)? {
            on_row(Scanline {
                row,
                format: self.header.format,
                data: line.data(),
            })?;
            row += 1;
        }
        if row != self.header.height {
            return Err(PipelineError::DecodeFailure(format!(
                "image data ended after {} of {} rows",
                row, self.header.height
            )));
        }
        Ok(())
    }
}

/// Per-image state the scanline callback works from
pub struct ScanlineContext<'r, 'd, D> {
    placement: PlacementRect,
    rows: &'r mut RowStream<'d, D>,
}

impl<'r, 'd, D: TriColorDisplay> ScanlineContext<'r, 'd, D> {
    pub fn new(placement: PlacementRect, rows: &'r mut RowStream<'d, D>) -> Self {
        Self { placement, rows }
    }

    /// Clip one scanline and stream its visible part
    pub fn scanline(&mut self, line: Scanline<'_>) -> Result<(), PipelineError> {
        let Some(y) = self.placement.dest_row(line.row) else {
            return Ok(());
        };
        let layout = line.format.layout();
        let visible = self.placement.visible_bytes(layout.bytes_per_pixel());
        let data = line.data.get(visible.clone()).ok_or_else(|| {
            PipelineError::DecodeFailure(format!(
                "scanline {} has {} bytes, needs {}",
                line.row,
                line.data.len(),
                visible.end
            ))
        })?;
        self.rows.push(&PixelRow {
            y,
            x: self.placement.dest_x,
            layout,
            data,
        })
    }
}

/// PNG decoder with the same placement rules as the BMP decoder
pub struct PngDecoder<'b, P> {
    backend: &'b mut P,
    surface: Surface,
}

impl<'b, P: PngBackend> PngDecoder<'b, P> {
    pub fn new(backend: &'b mut P, surface: Surface) -> Self {
        Self { backend, surface }
    }
}

impl<P: PngBackend> ImageDecoder for PngDecoder<'_, P> {
    fn decode<R, D>(
        &mut self,
        reader: R,
        origin: Origin,
        rows: &mut RowStream<'_, D>,
    ) -> Result<(), PipelineError>
    where
        R: Read + Seek,
        D: TriColorDisplay,
    {
        let mut session = self
            .backend
            .open(reader)
            .inspect_err(|e| warn!("PNG open failed: {}", e))?;
        let header = session.header();
        info!("PNG {}x{} {:?}", header.width, header.height, header.format);

        let placement = PlacementRect::compute(header.width, header.height, origin, self.surface);
        debug!("PNG placement {:?}", placement);
        if placement.is_empty() {
            info!("PNG lies entirely off the surface");
            return Ok(());
        }

        let mut context = ScanlineContext::new(placement, rows);
        let result = session.decode(&mut |line: Scanline<'_>| context.scanline(line));
        if let Err(e) = &result {
            warn!(
                "PNG decode stopped after {} rows: {}",
                context.rows.rows_written(),
                e
            );
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ColorMode;
    use crate::render::{AssetFormat, Renderer};
    use crate::testing::RecordingDisplay;
    use std::io::Cursor;

    fn encode_png(width: u32, height: u32, color: ColorType, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut out, width, height);
            encoder.set_color(color);
            encoder.set_depth(BitDepth::Eight);
            let mut writer = encoder.write_header().unwrap();
            writer.write_image_data(data).unwrap();
        }
        out
    }

    fn render(bytes: Vec<u8>, surface: Surface, origin: Origin) -> (Result<(), PipelineError>, RecordingDisplay) {
        let mut display = RecordingDisplay::new();
        let result = {
            let mut rows = RowStream::new(&mut display, surface, ColorMode::TriColor);
            let mut backend = PngCrateBackend;
            PngDecoder::new(&mut backend, surface).decode(Cursor::new(bytes), origin, &mut rows)
        };
        (result, display)
    }

    #[test]
    fn rgb_png_centered() {
        let data = [
            255, 255, 255, 255, 0, 0, // white, red
            0, 0, 0, 255, 255, 255, // black, white
        ];
        let png = encode_png(2, 2, ColorType::Rgb, &data);
        let (result, display) = render(png, Surface::default(), Origin::default());
        result.unwrap();

        let rows: Vec<(u16, u16, u8, u8)> = display
            .writes
            .iter()
            .map(|w| (w.x, w.y, w.mono[0] >> 6, w.accent[0] >> 6))
            .collect();
        assert_eq!(rows, vec![(399, 239, 0b11, 0b10), (399, 240, 0b01, 0b11)]);
    }

    #[test]
    fn alpha_below_half_is_background() {
        let data = [0, 0, 0, 0, 0, 0, 0, 255, 255, 0, 0, 200];
        let png = encode_png(3, 1, ColorType::Rgba, &data);
        let (result, display) = render(png, Surface::new(3, 1), Origin::default());
        result.unwrap();
        assert_eq!(display.writes[0].mono, vec![0b1011_1111]);
        assert_eq!(display.writes[0].accent, vec![0b1101_1111]);
    }

    #[test]
    fn grayscale_rows_clipped() {
        // 10x4 gray ramp, shifted up by three rows and left by six columns
        let data: Vec<u8> = (0..40).map(|i| if i % 10 < 8 { 0 } else { 255 }).collect();
        let png = encode_png(10, 4, ColorType::Grayscale, &data);
        let (result, display) = render(png, Surface::new(8, 4), Origin::new(-6, -3));
        result.unwrap();

        assert_eq!(display.writes.len(), 1);
        let write = &display.writes[0];
        assert_eq!((write.x, write.y, write.width), (0, 0, 4));
        assert_eq!(write.mono, vec![0b0011_1111]);
    }

    #[test]
    fn palette_png_is_expanded() {
        let mut out = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut out, 2, 1);
            encoder.set_color(ColorType::Indexed);
            encoder.set_depth(BitDepth::Eight);
            encoder.set_palette(vec![255, 0, 0, 255, 255, 255]);
            let mut writer = encoder.write_header().unwrap();
            writer.write_image_data(&[0, 1]).unwrap();
        }
        let (result, display) = render(out, Surface::new(2, 1), Origin::default());
        result.unwrap();
        assert_eq!(display.writes[0].accent, vec![0b0111_1111]);
        assert_eq!(display.writes[0].mono, vec![0xFF]);
    }

    #[test]
    fn corrupt_png_is_decode_failure() {
        let mut png = encode_png(4, 4, ColorType::Rgb, &[0; 48]);
        png.truncate(40);
        let (result, _) = render(png, Surface::new(8, 8), Origin::default());
        assert!(matches!(result, Err(PipelineError::DecodeFailure(_))));
    }

    /// Backend handing out scripted scanlines, for formats the png crate never produces
    struct ScriptedPng {
        header: PngHeader,
        rows: Vec<Vec<u8>>,
        fail_at: Option<u32>,
    }

    impl PngSession for ScriptedPng {
        fn header(&self) -> PngHeader {
            self.header
        }

        fn decode(&mut self, on_row: &mut ScanlineCallback<'_>) -> Result<(), PipelineError> {
            for (row, data) in self.rows.iter().enumerate() {
                if self.fail_at == Some(row as u32) {
                    return Err(PipelineError::DecodeFailure("bad zlib stream".into()));
                }
                on_row(Scanline {
                    row: row as u32,
                    format: self.header.format,
                    data,
                })?;
            }
            Ok(())
        }
    }

    struct ScriptedBackend {
        rows: Vec<Vec<u8>>,
        width: u32,
        format: ScanlineFormat,
        fail_at: Option<u32>,
    }

    impl PngBackend for ScriptedBackend {
        type Session<R: Read> = ScriptedPng;

        fn open<R: Read>(&mut self, _reader: R) -> Result<Self::Session<R>, PipelineError> {
            Ok(ScriptedPng {
                header: PngHeader {
                    width: self.width,
                    height: self.rows.len() as u32,
                    format: self.format,
                },
                rows: self.rows.clone(),
                fail_at: self.fail_at,
            })
        }
    }

    fn png_signature() -> Vec<u8> {
        vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]
    }

    #[test]
    fn indexed_samples_are_gray_levels() {
        let backend = ScriptedBackend {
            rows: vec![vec![0x00, 0xFF, 0x90]],
            width: 3,
            format: ScanlineFormat::Indexed,
            fail_at: None,
        };
        let mut display = RecordingDisplay::new();
        let mut renderer = Renderer::with_png_backend(Surface::new(3, 1), ColorMode::TriColor, backend);
        let rendered = renderer
            .render_reader(Cursor::new(png_signature()), Origin::default(), &mut display)
            .unwrap();

        assert_eq!(rendered.format, AssetFormat::Png);
        assert_eq!(display.writes[0].mono, vec![0b0111_1111]);
        assert_eq!(display.writes[0].accent, vec![0xFF]);
    }

    #[test]
    fn failure_keeps_rows_already_written() {
        let backend = ScriptedBackend {
            rows: vec![vec![0; 4]; 4],
            width: 4,
            format: ScanlineFormat::Grayscale,
            fail_at: Some(2),
        };
        let mut display = RecordingDisplay::new();
        let mut renderer = Renderer::with_png_backend(Surface::new(4, 4), ColorMode::TriColor, backend);
        let err = renderer
            .render_reader(Cursor::new(png_signature()), Origin::default(), &mut display)
            .unwrap_err();

        assert!(matches!(err, PipelineError::DecodeFailure(_)));
        assert_eq!(display.writes.len(), 2);
        assert!(display.refreshes.is_empty());
    }

    #[test]
    fn short_scanline_is_rejected() {
        let backend = ScriptedBackend {
            rows: vec![vec![0; 2]],
            width: 4,
            format: ScanlineFormat::Truecolor,
            fail_at: None,
        };
        let mut display = RecordingDisplay::new();
        let mut renderer = Renderer::with_png_backend(Surface::new(4, 1), ColorMode::TriColor, backend);
        let err = renderer
            .render_reader(Cursor::new(png_signature()), Origin::default(), &mut display)
            .unwrap_err();
        assert!(matches!(err, PipelineError::DecodeFailure(_)));
        assert!(display.writes.is_empty());
    }
}
