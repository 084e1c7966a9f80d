//! Format detection from the leading bytes of an asset

use std::io::{self, Read, Seek, SeekFrom};

use crate::config::Surface;
use crate::error::PipelineError;
use crate::storage::Storage;

/// Bytes inspected at the start of an asset
pub const SNIFF_LEN: usize = 8;

const BMP_MAGIC: [u8; 2] = *b"BM";
const PNG_MAGIC: [u8; 4] = [0x89, b'P', b'N', b'G'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetFormat {
    Bmp,
    Png,
    /// Headerless mono plane + accent plane dump for the configured surface
    RawBitplane,
    Unknown,
}

/// Classification plus the asset length it was based on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sniffed {
    pub format: AssetFormat,
    pub len: u64,
}

/// Classify from the first bytes and the total length.
///
/// Signatures win over the length match, so a BMP that happens to have the raw size
/// is still a BMP.
pub fn classify_bytes(head: &[u8], len: u64, surface: Surface) -> AssetFormat {
    if head.starts_with(&BMP_MAGIC) {
        AssetFormat::Bmp
    } else if head.starts_with(&PNG_MAGIC) {
        AssetFormat::Png
    } else if len == surface.raw_asset_len() {
        AssetFormat::RawBitplane
    } else {
        AssetFormat::Unknown
    }
}

/// Classify an open asset and rewind it to the start
pub fn classify<R: Read + Seek>(reader: &mut R, surface: Surface) -> io::Result<Sniffed> {
    let len = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(0))?;

    let mut head = Vec::with_capacity(SNIFF_LEN);
    reader.by_ref().take(SNIFF_LEN as u64).read_to_end(&mut head)?;
    reader.seek(SeekFrom::Start(0))?;

    Ok(Sniffed {
        format: classify_bytes(&head, len, surface),
        len,
    })
}

/// Classify a stored asset by path
pub fn classify_asset<S: Storage>(
    storage: &S,
    path: &str,
    surface: Surface,
) -> Result<Sniffed, PipelineError> {
    let mut reader = storage
        .open_read(path)
        .map_err(PipelineError::storage("opening asset"))?;
    classify(&mut reader, surface).map_err(PipelineError::storage("sniffing asset"))
}
