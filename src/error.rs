//! Error types shared by the whole pipeline

use std::io;

use display_interface::DisplayError;
use thiserror::Error;

/// Why a single fetch attempt failed
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("unexpected HTTP status {0}")]
    Status(u16),
    #[error("missing or non-positive content length ({0:?})")]
    InvalidContentLength(Option<u64>),
    #[error("no data for {idle_ms} ms after {received} of {expected} bytes")]
    Stalled {
        received: u64,
        expected: u64,
        idle_ms: u64,
    },
    #[error("received {received} bytes, content length was {expected}")]
    LengthMismatch { received: u64, expected: u64 },
    #[error("reading response body: {0}")]
    Body(#[source] io::Error),
}

/// Stored bytes that cannot be rendered
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("unrecognised asset ({len} bytes)")]
    UnknownFormat { len: u64 },
    #[error("bad file signature")]
    BadSignature,
    #[error("unsupported header size {0}")]
    UnsupportedHeader(u32),
    #[error("unsupported bit depth {0}")]
    UnsupportedDepth(u16),
    #[error("unsupported compression {0}")]
    UnsupportedCompression(u32),
    #[error("invalid image dimensions {width}x{height}")]
    InvalidDimensions { width: i64, height: i64 },
    #[error("asset ends before the pixel data")]
    Truncated,
    #[error("row of {width} px exceeds the {capacity} px row buffer")]
    RowTooWide { width: usize, capacity: usize },
    #[error("expected {expected} bytes, asset has {actual}")]
    SizeMismatch { expected: u64, actual: u64 },
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("network failure: {0}")]
    NetworkFailure(#[from] NetworkError),
    #[error("storage failure while {context}: {source}")]
    StorageFailure {
        context: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("format error: {0}")]
    FormatError(#[from] FormatError),
    #[error("decoder failed: {0}")]
    DecodeFailure(String),
    #[error("could not allocate {bytes} bytes for {what}")]
    ResourceExhausted { what: &'static str, bytes: usize },
    #[error("display write failed: {0:?}")]
    Display(DisplayError),
    #[error("asset unavailable after {attempts} attempts")]
    Unavailable { attempts: u32 },
}

impl PipelineError {
    pub(crate) fn storage(context: &'static str) -> impl FnOnce(io::Error) -> Self {
        move |source| PipelineError::StorageFailure { context, source }
    }
}

impl From<DisplayError> for PipelineError {
    fn from(err: DisplayError) -> Self {
        PipelineError::Display(err)
    }
}
