//! Path addressed byte storage for downloaded assets.
//!
//! On the device this is the SPIFFS partition mounted into the VFS, on the host any
//! directory. Handles are plain owned values: dropping one closes the file, so every
//! early return releases it.

use std::fs;
use std::io::{self, Read, Seek, Write};
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::error::PipelineError;

/// Transfer buffer used when duplicating assets
pub const COPY_CHUNK: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetInfo {
    pub name: String,
    pub size: u64,
}

pub trait Storage {
    type Reader: Read + Seek;
    type Writer: Write;

    fn open_read(&self, path: &str) -> io::Result<Self::Reader>;
    /// Open for writing, truncating any existing content
    fn create(&self, path: &str) -> io::Result<Self::Writer>;
    fn size(&self, path: &str) -> io::Result<u64>;
    fn exists(&self, path: &str) -> bool;
    fn remove(&self, path: &str) -> io::Result<()>;
    fn list(&self) -> io::Result<Vec<AssetInfo>>;
    fn free_space(&self) -> io::Result<u64>;
}

/// Copy `from` over `to` through a fixed size buffer.
///
/// A failed copy removes `to` so no half written asset is left behind.
pub fn copy_asset<S: Storage>(storage: &S, from: &str, to: &str) -> Result<u64, PipelineError> {
    let result = copy_inner(storage, from, to);
    if let Err(err) = &result {
        warn!("Copy {} -> {} failed: {}", from, to, err);
        if storage.exists(to) {
            if let Err(e) = storage.remove(to) {
                warn!("Could not remove partial copy {}: {}", to, e);
            }
        }
    }
    result
}

fn copy_inner<S: Storage>(storage: &S, from: &str, to: &str) -> Result<u64, PipelineError> {
    let mut reader = storage
        .open_read(from)
        .map_err(PipelineError::storage("opening copy source"))?;
    let mut writer = storage
        .create(to)
        .map_err(PipelineError::storage("creating copy target"))?;

    let mut buffer = [0u8; COPY_CHUNK];
    let mut total = 0u64;
    loop {
        let read = reader
            .read(&mut buffer)
            .map_err(PipelineError::storage("reading copy source"))?;
        if read == 0 {
            break;
        }
        writer
            .write_all(&buffer[..read])
            .map_err(PipelineError::storage("writing copy target"))?;
        total += read as u64;
    }
    writer
        .flush()
        .map_err(PipelineError::storage("flushing copy target"))?;

    debug!("Copied {} bytes {} -> {}", total, from, to);
    Ok(total)
}

/// [`Storage`] over a directory of the std filesystem.
///
/// `capacity` emulates a fixed size partition; without it free space is unlimited.
#[derive(Debug, Clone)]
pub struct DirStorage {
    root: PathBuf,
    capacity: Option<u64>,
}

impl DirStorage {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            capacity: None,
        }
    }

    pub fn with_capacity(mut self, bytes: u64) -> Self {
        self.capacity = Some(bytes);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }

    /// Bytes taken by the files directly under the root
    pub fn used_space(&self) -> io::Result<u64> {
        Ok(self.list()?.iter().map(|asset| asset.size).sum())
    }
}

impl Storage for DirStorage {
    type Reader = fs::File;
    type Writer = fs::File;

    fn open_read(&self, path: &str) -> io::Result<Self::Reader> {
        fs::File::open(self.path(path))
    }

    fn create(&self, path: &str) -> io::Result<Self::Writer> {
        fs::File::create(self.path(path))
    }

    fn size(&self, path: &str) -> io::Result<u64> {
        Ok(fs::metadata(self.path(path))?.len())
    }

    fn exists(&self, path: &str) -> bool {
        self.path(path).is_file()
    }

    fn remove(&self, path: &str) -> io::Result<()> {
        fs::remove_file(self.path(path))
    }

    fn list(&self) -> io::Result<Vec<AssetInfo>> {
        let mut assets = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }
            assets.push(AssetInfo {
                name: entry.file_name().to_string_lossy().to_string(),
                size: metadata.len(),
            });
        }
        assets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(assets)
    }

    fn free_space(&self) -> io::Result<u64> {
        match self.capacity {
            Some(capacity) => Ok(capacity.saturating_sub(self.used_space()?)),
            None => Ok(u64::MAX),
        }
    }
}
