//! VFS-backed flash filesystem adapter.
//!
//! Implements [`FlashFs`] over `std::fs`, rooted at the directory the
//! firmware tree lives in.
//!
//! - **`target_os = "espidf"`**: the root is a FAT volume on the internal
//!   flash, mounted through the ESP-IDF VFS with wear levelling.  Capacity
//!   comes from `esp_vfs_fat_info()`.
//! - **all other targets**: any host directory; capacity is a fixed budget
//!   supplied at construction and free space is that budget minus the bytes
//!   already stored below the root.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::app::ports::{FlashFs, FlashUsage};
use crate::error::FsError;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

pub struct StdFlashFs {
    root: PathBuf,
    #[cfg(not(target_os = "espidf"))]
    capacity: u64,
}

impl StdFlashFs {
    /// Mount the FAT partition `label` at `base_path` and root the adapter
    /// there.
    #[cfg(target_os = "espidf")]
    pub fn mount(base_path: &str, label: &str) -> anyhow::Result<Self> {
        use std::ffi::CString;

        let base = CString::new(base_path)?;
        let part = CString::new(label)?;
        let cfg = esp_vfs_fat_mount_config_t {
            format_if_mount_failed: false,
            max_files: 8,
            allocation_unit_size: 0,
            ..Default::default()
        };
        let mut wl: wl_handle_t = 0;
        // SAFETY: called once from the main task before any file access;
        // both strings outlive the call.
        esp!(unsafe { esp_vfs_fat_spiflash_mount_rw_wl(base.as_ptr(), part.as_ptr(), &cfg, &mut wl) })?;
        log::info!("FS: mounted '{}' at {}", label, base_path);
        Ok(Self {
            root: PathBuf::from(base_path),
        })
    }

    /// Another handle on a volume already mounted at `base_path`.
    #[cfg(target_os = "espidf")]
    pub fn at(base_path: &str) -> Self {
        Self {
            root: PathBuf::from(base_path),
        }
    }

    /// Host directory with a simulated capacity of `capacity` bytes.
    #[cfg(not(target_os = "espidf"))]
    pub fn new(root: impl Into<PathBuf>, capacity: u64) -> Self {
        Self {
            root: root.into(),
            capacity,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full(&self, path: &str) -> PathBuf {
        let path = path.trim_matches('/');
        if path.is_empty() {
            self.root.clone()
        } else {
            self.root.join(path)
        }
    }
}

fn walk(dir: &Path, prefix: &str, out: &mut Vec<String>) -> Result<(), FsError> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let rel = if prefix.is_empty() {
            name
        } else {
            format!("{prefix}/{name}")
        };
        if entry.file_type()?.is_dir() {
            walk(&entry.path(), &rel, out)?;
        } else {
            out.push(rel);
        }
    }
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
fn tree_size(dir: &Path) -> Result<u64, FsError> {
    let mut total = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let meta = entry.metadata()?;
        total += if meta.is_dir() { tree_size(&entry.path())? } else { meta.len() };
    }
    Ok(total)
}

impl FlashFs for StdFlashFs {
    type Reader = fs::File;

    fn open(&self, path: &str) -> Result<Self::Reader, FsError> {
        Ok(fs::File::open(self.full(path))?)
    }

    fn write(&mut self, path: &str, data: &[u8]) -> Result<(), FsError> {
        Ok(fs::write(self.full(path), data)?)
    }

    fn exists(&self, path: &str) -> bool {
        self.full(path).exists()
    }

    fn ensure_dir(&mut self, path: &str) -> Result<(), FsError> {
        let full = self.full(path);
        match fs::create_dir(&full) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists && full.is_dir() => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn remove_file(&mut self, path: &str) -> Result<(), FsError> {
        Ok(fs::remove_file(self.full(path))?)
    }

    fn remove_dir_all(&mut self, path: &str) -> Result<(), FsError> {
        Ok(fs::remove_dir_all(self.full(path))?)
    }

    fn rename(&mut self, from: &str, to: &str) -> Result<(), FsError> {
        Ok(fs::rename(self.full(from), self.full(to))?)
    }

    fn list_files(&self, dir: &str) -> Result<Vec<String>, FsError> {
        let mut out = Vec::new();
        walk(&self.full(dir), "", &mut out)?;
        Ok(out)
    }

    #[cfg(target_os = "espidf")]
    fn usage(&self) -> Result<FlashUsage, FsError> {
        use std::ffi::CString;

        let base = CString::new(self.root.to_string_lossy().as_bytes()).map_err(|_| FsError::Io)?;
        let (mut total, mut free) = (0u64, 0u64);
        // SAFETY: `base` is a valid NUL-terminated path for the call.
        let ret = unsafe { esp_vfs_fat_info(base.as_ptr(), &mut total, &mut free) };
        if ret != ESP_OK {
            return Err(FsError::Io);
        }
        Ok(FlashUsage { total, free })
    }

    #[cfg(not(target_os = "espidf"))]
    fn usage(&self) -> Result<FlashUsage, FsError> {
        let used = tree_size(&self.root)?;
        Ok(FlashUsage {
            total: self.capacity,
            free: self.capacity.saturating_sub(used),
        })
    }
}
