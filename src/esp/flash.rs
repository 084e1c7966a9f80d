//! SPIFFS partition mounted into the VFS, used as asset [`Storage`]

use std::ffi::CStr;
use std::io;

use esp_idf_svc::sys::{esp, esp_spiffs_info, esp_vfs_spiffs_conf_t, esp_vfs_spiffs_register};
use log::info;

use crate::storage::{AssetInfo, DirStorage, Storage};

/// VFS mount point of the default SPIFFS partition
pub const MOUNT_POINT: &str = "/spiffs";
const MOUNT_POINT_C: &CStr = c"/spiffs";
const MAX_OPEN_FILES: usize = 4;

/// Mounted partition, paths are relative to [`MOUNT_POINT`]
pub struct FlashStorage {
    dir: DirStorage,
}

impl FlashStorage {
    /// Register the partition with the VFS, formatting it when the mount fails
    pub fn mount() -> anyhow::Result<Self> {
        let conf = esp_vfs_spiffs_conf_t {
            base_path: MOUNT_POINT_C.as_ptr(),
            partition_label: core::ptr::null(),
            max_files: MAX_OPEN_FILES,
            format_if_mount_failed: true,
        };
        esp!(unsafe { esp_vfs_spiffs_register(&conf) })?;

        let storage = Self {
            dir: DirStorage::new(MOUNT_POINT),
        };
        let (total, used) = storage.partition_info()?;
        info!("SPIFFS mounted at {}: {} of {} bytes used", MOUNT_POINT, used, total);
        Ok(storage)
    }

    fn partition_info(&self) -> io::Result<(u64, u64)> {
        let mut total = 0usize;
        let mut used = 0usize;
        esp!(unsafe { esp_spiffs_info(core::ptr::null(), &mut total, &mut used) })
            .map_err(|e| io::Error::other(format!("{e:?}")))?;
        Ok((total as u64, used as u64))
    }
}

impl Storage for FlashStorage {
    type Reader = <DirStorage as Storage>::Reader;
    type Writer = <DirStorage as Storage>::Writer;

    fn open_read(&self, path: &str) -> io::Result<Self::Reader> {
        self.dir.open_read(path)
    }

    fn create(&self, path: &str) -> io::Result<Self::Writer> {
        self.dir.create(path)
    }

    fn size(&self, path: &str) -> io::Result<u64> {
        self.dir.size(path)
    }

    fn exists(&self, path: &str) -> bool {
        self.dir.exists(path)
    }

    fn remove(&self, path: &str) -> io::Result<()> {
        self.dir.remove(path)
    }

    fn list(&self) -> io::Result<Vec<AssetInfo>> {
        self.dir.list()
    }

    fn free_space(&self) -> io::Result<u64> {
        let (total, used) = self.partition_info()?;
        Ok(total.saturating_sub(used))
    }
}
