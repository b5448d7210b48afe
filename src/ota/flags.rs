//! Persistent flag store.
//!
//! Two marker files survive power loss and are the only update state that
//! does: `pending` (staged, apply on next boot) and `commit-pending`
//! (applied, awaiting verification).  Content is a short debugging hint;
//! existence is the signal.

use log::{info, warn};

use crate::app::ports::FlashFs;
use crate::config::OtaConfig;
use crate::error::FsError;

/// Which update phase the flags say is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootPhase {
    /// No update in flight.
    Normal,
    /// A staged update must be applied.
    ApplyPending,
    /// An applied update must be verified.
    CommitPending,
}

/// Borrowed view of the two flag files.
pub struct FlagStore<'a, F: FlashFs> {
    fs: &'a mut F,
    pending: &'a str,
    commit_pending: &'a str,
}

impl<'a, F: FlashFs> FlagStore<'a, F> {
    pub fn new(fs: &'a mut F, config: &'a OtaConfig) -> Self {
        Self {
            fs,
            pending: &config.pending_flag,
            commit_pending: &config.commit_pending_flag,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.fs.exists(self.pending)
    }

    pub fn is_commit_pending(&self) -> bool {
        self.fs.exists(self.commit_pending)
    }

    /// `pending` wins if both exist: the apply phase ends by resolving it.
    pub fn phase(&self) -> BootPhase {
        if self.is_pending() {
            BootPhase::ApplyPending
        } else if self.is_commit_pending() {
            BootPhase::CommitPending
        } else {
            BootPhase::Normal
        }
    }

    pub fn set_pending(&mut self) -> Result<(), FsError> {
        self.fs.write(self.pending, b"ready")?;
        info!("OTA: {} written", self.pending);
        Ok(())
    }

    /// `pending` → `commit-pending`.
    pub fn promote(&mut self) -> Result<(), FsError> {
        if self.fs.exists(self.commit_pending) {
            self.fs.remove_file(self.commit_pending)?;
        }
        if let Err(e) = self.fs.rename(self.pending, self.commit_pending) {
            // Some VFS drivers refuse rename; write the new flag first so
            // there is never a moment with neither flag present.
            warn!("OTA: flag rename failed ({}), rewriting", e);
            self.fs.write(self.commit_pending, b"applied")?;
            self.remove(self.pending)?;
        }
        info!("OTA: {} -> {}", self.pending, self.commit_pending);
        Ok(())
    }

    pub fn clear_commit_pending(&mut self) -> Result<(), FsError> {
        self.remove(self.commit_pending)
    }

    /// Remove every flag that exists.  Returns the first failure, after
    /// attempting both.
    pub fn clear_all(&mut self) -> Result<(), FsError> {
        let a = self.remove(self.pending);
        let b = self.remove(self.commit_pending);
        a.and(b)
    }

    fn remove(&mut self, path: &str) -> Result<(), FsError> {
        match self.fs.remove_file(path) {
            Ok(()) => {
                info!("OTA: {} removed", path);
                Ok(())
            }
            Err(FsError::NotFound) => Ok(()),
            Err(e) => {
                warn!("OTA: failed to remove {}: {}", path, e);
                Err(e)
            }
        }
    }
}
