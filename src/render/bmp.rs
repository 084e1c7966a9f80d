//! Uncompressed 24/32-bit BMP decoder.
//!
//! 32-bit files may use `BI_BITFIELDS` only when the masks describe the plain
//! BGRX byte order.
//!
//! Only the visible rows are read, each with a single seek straight to its first
//! visible pixel. Bottom-up files are read back to front so rows still reach the
//! display top to bottom.

use std::io::{self, Read, Seek, SeekFrom};

use log::{debug, info, warn};

use super::{ImageDecoder, Origin, PixelLayout, PixelRow, PlacementRect, RowStream};
use crate::config::Surface;
use crate::display::TriColorDisplay;
use crate::error::{FormatError, PipelineError};

/// File header plus the fields of `BITMAPINFOHEADER` that matter here
const HEADER_LEN: usize = 34;

/// Smallest info header carrying 32-bit dimensions and a compression field
const INFO_HEADER_LEN: u32 = 40;

const BI_RGB: u32 = 0;
const BI_BITFIELDS: u32 = 3;

/// Red, green and blue masks follow the 40 byte info header
const MASKS_OFFSET: u64 = 14 + INFO_HEADER_LEN as u64;

/// Red, green, blue masks of BGRX pixels
const BGRX_MASKS: [u32; 3] = [0x00FF_0000, 0x0000_FF00, 0x0000_00FF];

/// Parsed BMP header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BmpHeader {
    pub data_offset: u32,
    pub width: u32,
    pub height: u32,
    /// Negative height in the file: first stored row is the top one
    pub top_down: bool,
    pub bits_per_pixel: u16,
    pub compression: u32,
}

impl BmpHeader {
    pub fn parse(bytes: &[u8; HEADER_LEN]) -> Result<Self, FormatError> {
        if &bytes[0..2] != b"BM" {
            return Err(FormatError::BadSignature);
        }
        let u16_at = |at: usize| u16::from_le_bytes([bytes[at], bytes[at + 1]]);
        let u32_at = |at: usize| {
            u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
        };

        let data_offset = u32_at(10);
        let header_size = u32_at(14);
        if header_size < INFO_HEADER_LEN {
            return Err(FormatError::UnsupportedHeader(header_size));
        }
        let width = u32_at(18) as i32;
        let height = u32_at(22) as i32;
        let planes = u16_at(26);
        let bits_per_pixel = u16_at(28);
        let compression = u32_at(30);

        if width <= 0 || height == 0 || height == i32::MIN {
            return Err(FormatError::InvalidDimensions {
                width: width as i64,
                height: height as i64,
            });
        }
        if planes != 1 {
            return Err(FormatError::BadSignature);
        }
        match (bits_per_pixel, compression) {
            (24, BI_RGB) | (32, BI_RGB) | (32, BI_BITFIELDS) => {}
            (24, other) | (32, other) => return Err(FormatError::UnsupportedCompression(other)),
            (depth, _) => return Err(FormatError::UnsupportedDepth(depth)),
        }

        Ok(Self {
            data_offset,
            width: width as u32,
            height: height.unsigned_abs(),
            top_down: height < 0,
            bits_per_pixel,
            compression,
        })
    }

    /// Accept `BI_BITFIELDS` channel masks only when they match [`PixelLayout::Bgrx32`]
    pub fn check_masks(&self, masks: &[u8; 12]) -> Result<(), FormatError> {
        let [r, g, b] = [0, 4, 8].map(|at| {
            u32::from_le_bytes([masks[at], masks[at + 1], masks[at + 2], masks[at + 3]])
        });
        if [r, g, b] == BGRX_MASKS {
            Ok(())
        } else {
            warn!("BMP masks r={:08x} g={:08x} b={:08x} not supported", r, g, b);
            Err(FormatError::UnsupportedCompression(self.compression))
        }
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.bits_per_pixel as usize / 8
    }

    pub fn layout(&self) -> PixelLayout {
        if self.bits_per_pixel == 32 {
            PixelLayout::Bgrx32
        } else {
            PixelLayout::Bgr24
        }
    }

    /// Bytes per stored row including the padding to a 4 byte boundary
    pub fn stride(&self) -> u64 {
        (self.width as u64 * self.bytes_per_pixel() as u64 + 3) & !3
    }

    /// File row holding image row `row` (counted from the top)
    pub fn file_row(&self, row: u32) -> u32 {
        if self.top_down {
            row
        } else {
            self.height - 1 - row
        }
    }

    /// End of the pixel array
    pub fn data_end(&self) -> u64 {
        self.data_offset as u64 + self.stride() * self.height as u64
    }
}

pub struct BmpDecoder {
    surface: Surface,
    pixels: Vec<u8>,
}

impl BmpDecoder {
    pub fn new(surface: Surface) -> Self {
        Self {
            surface,
            // Widest visible row at the widest supported depth
            pixels: vec![0; surface.width as usize * 4],
        }
    }
}

pub(crate) fn read_error(err: io::Error) -> PipelineError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        FormatError::Truncated.into()
    } else {
        PipelineError::StorageFailure {
            context: "reading asset",
            source: err,
        }
    }
}

impl ImageDecoder for BmpDecoder {
    fn decode<R, D>(
        &mut self,
        mut reader: R,
        origin: Origin,
        rows: &mut RowStream<'_, D>,
    ) -> Result<(), PipelineError>
    where
        R: Read + Seek,
        D: TriColorDisplay,
    {
        let len = reader.seek(SeekFrom::End(0)).map_err(read_error)?;
        reader.seek(SeekFrom::Start(0)).map_err(read_error)?;

        let mut raw = [0u8; HEADER_LEN];
        reader.read_exact(&mut raw).map_err(read_error)?;
        let header = BmpHeader::parse(&raw).inspect_err(|e| warn!("BMP rejected: {}", e))?;
        info!(
            "BMP {}x{} {} bpp, {}",
            header.width,
            header.height,
            header.bits_per_pixel,
            if header.top_down { "top-down" } else { "bottom-up" }
        );

        if header.compression == BI_BITFIELDS {
            let mut masks = [0u8; 12];
            reader
                .seek(SeekFrom::Start(MASKS_OFFSET))
                .map_err(read_error)?;
            reader.read_exact(&mut masks).map_err(read_error)?;
            header.check_masks(&masks)?;
        }

        if header.data_end() > len {
            warn!(
                "BMP pixel data ends at {} but the file has {} bytes",
                header.data_end(),
                len
            );
            return Err(FormatError::Truncated.into());
        }

        let rect = PlacementRect::compute(header.width, header.height, origin, self.surface);
        debug!("BMP placement {:?}", rect);
        if rect.is_empty() {
            info!("BMP lies entirely off the surface");
            return Ok(());
        }

        let bpp = header.bytes_per_pixel();
        let visible = rect.visible_bytes(bpp);
        let buffer = self
            .pixels
            .get_mut(..visible.len())
            .ok_or(FormatError::RowTooWide {
                width: rect.width as usize,
                capacity: self.surface.width as usize,
            })?;

        for i in 0..rect.height {
            let src_row = rect.src_y + i as u32;
            let position = header.data_offset as u64
                + header.file_row(src_row) as u64 * header.stride()
                + visible.start as u64;
            reader
                .seek(SeekFrom::Start(position))
                .map_err(read_error)?;
            reader.read_exact(buffer).map_err(read_error)?;

            rows.push(&PixelRow {
                y: rect.dest_y + i,
                x: rect.dest_x,
                layout: header.layout(),
                data: &*buffer,
            })?;
        }
        Ok(())
    }
}
