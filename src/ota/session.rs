//! Per-attempt update session and its shared progress handle.
//!
//! An [`UpdateSession`] exists from a successful "update available" check
//! until the download finishes or fails.  It is never persisted: after a
//! reboot the flag files and the staged manifest copy are the only state.
//!
//! [`Progress`] is cloned out to whoever wants to watch a download (status
//! LED, progress log task) and read concurrently while the downloader writes.

use core::cell::RefCell;
use core::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

use super::manifest::{FileEntry, Manifest};

/// State for one update attempt.
#[derive(Debug, Clone)]
pub struct UpdateSession {
    manifest: Manifest,
}

impl UpdateSession {
    pub fn new(manifest: Manifest) -> Self {
        Self { manifest }
    }

    pub fn remote_version(&self) -> &str {
        &self.manifest.version
    }

    /// Files in manifest order.
    pub fn file_list(&self) -> impl Iterator<Item = &str> {
        self.manifest.files.paths()
    }

    pub fn file_count(&self) -> usize {
        self.manifest.files.len()
    }

    pub fn entry(&self, path: &str) -> Option<&FileEntry> {
        self.manifest.files.get(path)
    }

    pub fn hash_of(&self, path: &str) -> Option<&str> {
        self.entry(path).map(|e| e.sha256.as_str())
    }

    pub fn size_of(&self, path: &str) -> Option<u64> {
        self.entry(path).map(|e| e.size)
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }
}

struct ProgressState {
    percent: AtomicU8,
    current_file: Mutex<CriticalSectionRawMutex, RefCell<String>>,
}

/// Cloneable, thread-safe view of download progress.
#[derive(Clone)]
pub struct Progress {
    inner: Arc<ProgressState>,
}

impl Default for Progress {
    fn default() -> Self {
        Self::new()
    }
}

impl Progress {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ProgressState {
                percent: AtomicU8::new(0),
                current_file: Mutex::new(RefCell::new(String::new())),
            }),
        }
    }

    /// 0–100.
    pub fn percent(&self) -> u8 {
        self.inner.percent.load(Ordering::Acquire)
    }

    pub fn current_file(&self) -> String {
        self.inner.current_file.lock(|f| f.borrow().clone())
    }

    /// `"<current file> (<pct>%)"`.
    pub fn status(&self) -> String {
        format!("{} ({}%)", self.current_file(), self.percent())
    }

    /// Start of a new session.
    pub fn reset(&self) {
        self.set_current_file("");
        self.inner.percent.store(0, Ordering::Release);
    }

    pub fn set_current_file(&self, path: &str) {
        self.inner.current_file.lock(|f| {
            let mut f = f.borrow_mut();
            f.clear();
            f.push_str(path);
        });
    }

    /// Record `completed` of `total` files done.  Never moves backwards.
    pub fn record(&self, completed: usize, total: usize) -> u8 {
        let pct = percent_of(completed, total);
        self.inner.percent.fetch_max(pct, Ordering::AcqRel).max(pct)
    }
}

/// `round(100 * completed / total)`; an empty file list counts as complete.
pub fn percent_of(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let completed = completed.min(total) as u64;
    let total = total as u64;
    ((200 * completed + total) / (2 * total)) as u8
}
