//! In-memory flash filesystem.
//!
//! Simulation backend for host builds: a flat `path → bytes` map plus an
//! explicit directory set, with a fixed capacity so the resource budgeter
//! sees realistic free-space numbers.  Directory semantics follow a real
//! VFS closely enough that missing-parent and already-exists cases behave
//! the same as on the device.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Cursor;

use crate::app::ports::{FlashFs, FlashUsage};
use crate::error::FsError;

#[derive(Debug, Clone, Default)]
pub struct MemFlashFs {
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
    capacity: u64,
}

fn parent(path: &str) -> Option<&str> {
    path.rfind('/').map(|i| &path[..i])
}

fn normalise(path: &str) -> &str {
    path.trim_matches('/')
}

impl MemFlashFs {
    pub fn new(capacity: u64) -> Self {
        Self {
            files: BTreeMap::new(),
            dirs: BTreeSet::new(),
            capacity,
        }
    }

    /// Write a file, creating every missing parent directory.
    pub fn seed(&mut self, path: &str, data: &[u8]) {
        let path = normalise(path);
        let mut cur = path;
        while let Some(p) = parent(cur) {
            self.dirs.insert(p.to_string());
            cur = p;
        }
        self.files.insert(path.to_string(), data.to_vec());
    }

    pub fn set_capacity(&mut self, capacity: u64) {
        self.capacity = capacity;
    }

    pub fn used_bytes(&self) -> u64 {
        self.files.values().map(|v| v.len() as u64).sum()
    }

    fn is_dir(&self, path: &str) -> bool {
        path.is_empty() || self.dirs.contains(path)
    }

    fn parent_exists(&self, path: &str) -> bool {
        parent(path).is_none_or(|p| self.is_dir(p))
    }
}

impl FlashFs for MemFlashFs {
    type Reader = Cursor<Vec<u8>>;

    fn open(&self, path: &str) -> Result<Self::Reader, FsError> {
        self.files
            .get(normalise(path))
            .cloned()
            .map(Cursor::new)
            .ok_or(FsError::NotFound)
    }

    fn write(&mut self, path: &str, data: &[u8]) -> Result<(), FsError> {
        let path = normalise(path);
        if !self.parent_exists(path) {
            return Err(FsError::NotFound);
        }
        if self.is_dir(path) {
            return Err(FsError::AlreadyExists);
        }
        let existing = self.files.get(path).map_or(0, |v| v.len() as u64);
        if self.used_bytes() - existing + data.len() as u64 > self.capacity {
            return Err(FsError::StorageFull);
        }
        self.files.insert(path.to_string(), data.to_vec());
        Ok(())
    }

    fn exists(&self, path: &str) -> bool {
        let path = normalise(path);
        self.files.contains_key(path) || self.is_dir(path)
    }

    fn ensure_dir(&mut self, path: &str) -> Result<(), FsError> {
        let path = normalise(path);
        if self.is_dir(path) {
            return Ok(());
        }
        if self.files.contains_key(path) {
            return Err(FsError::AlreadyExists);
        }
        if !self.parent_exists(path) {
            return Err(FsError::NotFound);
        }
        self.dirs.insert(path.to_string());
        Ok(())
    }

    fn remove_file(&mut self, path: &str) -> Result<(), FsError> {
        self.files
            .remove(normalise(path))
            .map(|_| ())
            .ok_or(FsError::NotFound)
    }

    fn remove_dir_all(&mut self, path: &str) -> Result<(), FsError> {
        let path = normalise(path);
        if !self.dirs.contains(path) {
            return Err(FsError::NotFound);
        }
        let prefix = format!("{path}/");
        self.files.retain(|k, _| !k.starts_with(&prefix));
        self.dirs.retain(|d| d != path && !d.starts_with(&prefix));
        Ok(())
    }

    fn rename(&mut self, from: &str, to: &str) -> Result<(), FsError> {
        let (from, to) = (normalise(from), normalise(to));
        if !self.parent_exists(to) {
            return Err(FsError::NotFound);
        }
        let data = self.files.remove(from).ok_or(FsError::NotFound)?;
        self.files.insert(to.to_string(), data);
        Ok(())
    }

    fn list_files(&self, dir: &str) -> Result<Vec<String>, FsError> {
        let dir = normalise(dir);
        if !self.is_dir(dir) {
            return Err(FsError::NotFound);
        }
        let prefix = if dir.is_empty() { String::new() } else { format!("{dir}/") };
        Ok(self
            .files
            .keys()
            .filter_map(|k| k.strip_prefix(prefix.as_str()))
            .map(str::to_string)
            .collect())
    }

    fn usage(&self) -> Result<FlashUsage, FsError> {
        Ok(FlashUsage {
            total: self.capacity,
            free: self.capacity.saturating_sub(self.used_bytes()),
        })
    }
}
