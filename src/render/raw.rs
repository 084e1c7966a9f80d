//! Headerless dual-plane dumps, already in panel bit format

use std::io::{Read, Seek, SeekFrom};

use log::{debug, info};

use super::bmp::read_error;
use super::{ImageDecoder, Origin, RowStream};
use crate::config::Surface;
use crate::display::TriColorDisplay;
use crate::error::{FormatError, PipelineError};

pub struct RawBitplaneLoader {
    surface: Surface,
}

impl RawBitplaneLoader {
    pub fn new(surface: Surface) -> Self {
        Self { surface }
    }

    fn alloc(&self, len: usize) -> Result<Vec<u8>, PipelineError> {
        let mut planes = Vec::new();
        planes
            .try_reserve_exact(len)
            .map_err(|_| PipelineError::ResourceExhausted {
                what: "bit planes",
                bytes: len,
            })?;
        planes.resize(len, 0);
        Ok(planes)
    }
}

impl ImageDecoder for RawBitplaneLoader {
    /// Always covers the whole surface, `origin` is ignored
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
        let expected = self.surface.raw_asset_len();
        let actual = reader.seek(SeekFrom::End(0)).map_err(read_error)?;
        if actual != expected {
            return Err(FormatError::SizeMismatch { expected, actual }.into());
        }
        if origin != Origin::default() {
            debug!("Raw planes cover the full surface, ignoring origin {:?}", origin);
        }

        let mut planes = self.alloc(expected as usize)?;
        reader.seek(SeekFrom::Start(0)).map_err(read_error)?;
        reader.read_exact(&mut planes).map_err(read_error)?;

        let stride = self.surface.stride();
        let (mono, accent) = planes.split_at(self.surface.plane_len());
        info!(
            "Raw planes {}x{}, {} bytes each",
            self.surface.width,
            self.surface.height,
            mono.len()
        );

        for (y, (mono_row, accent_row)) in mono
            .chunks_exact(stride)
            .zip(accent.chunks_exact(stride))
            .enumerate()
        {
            rows.push_planes(mono_row, accent_row, 0, y as u16, self.surface.width)?;
        }
        Ok(())
    }
}
