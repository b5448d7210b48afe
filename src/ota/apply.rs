//! Apply / rollback engine.
//!
//! Apply runs on the boot after a download, driven by the pending flag.  It
//! works from the manifest copy in the staging directory only.  For every
//! non-excluded file the live copy is backed up before it is overwritten;
//! the first failure restores everything backed up so far.
//!
//! ```text
//!   staged manifest ─▶ preflight hashes ─▶ ┌ backup live file ┐ ×N ─▶ version record
//!                                          └ copy staged file ┘        │
//!                                                │ error              installed manifest
//!                                                ▼                     │
//!                                            rollback            pending → commit-pending
//! ```
//!
//! A backup that already exists is never overwritten: it can only come from
//! an apply of the same update interrupted by power loss, and it holds the
//! pre-update original.
//!
//! A file with no live copy gets no backup.  Its path is appended to the
//! created record (`.created` under the backup root) before the staged copy
//! lands, and rollback deletes every recorded path.

use log::{debug, error, info, warn};

use super::digest::hash_raw;
use super::manifest::Manifest;
use super::{OtaUpdater, STAGED_MANIFEST, parent_dir, version};
use crate::app::events::OtaEvent;
use crate::app::ports::{Delay, EventSink, FlashFs, HttpClient, SystemPort};
use crate::error::{FsError, OtaError, Result};

/// Paths the update added, one per line, relative to the firmware root.
const CREATED_RECORD: &str = ".created";

impl<H, F, S, D> OtaUpdater<H, F, S, D>
where
    H: HttpClient,
    F: FlashFs,
    S: SystemPort,
    D: Delay,
{
    /// Install the staged update into the live tree.
    ///
    /// On `true` the commit-pending flag is set and the caller should
    /// reboot.  On `false` the live tree has been rolled back and both flags
    /// are cleared.
    pub fn apply_update(&mut self, sink: &mut impl EventSink) -> bool {
        let manifest = match self.install_staged(sink) {
            Ok(m) => m,
            Err(e) => {
                error!("OTA: apply failed: {}", e);
                sink.emit(&OtaEvent::ApplyFailed(e));
                self.rollback(sink);
                return false;
            }
        };

        if let Err(e) = self.flags().promote() {
            error!("OTA: could not record commit-pending: {}", e);
            sink.emit(&OtaEvent::ApplyFailed(OtaError::Storage(e)));
            self.rollback(sink);
            return false;
        }

        remove_tree(&mut self.fs, &self.config.staging_dir);
        info!("OTA: {} applied, awaiting commit verification", manifest.version);
        sink.emit(&OtaEvent::Applied {
            version: manifest.version,
        });
        true
    }

    fn install_staged(&mut self, sink: &mut impl EventSink) -> Result<Manifest> {
        let bytes = self.fs.read(&self.staged_path(STAGED_MANIFEST))?;
        let manifest = Manifest::parse(&bytes)?;
        info!("OTA: applying {} ({} files)", manifest.version, manifest.files.len());

        self.preflight(&manifest)?;
        self.fs.create_dir_all(&self.config.backup_dir)?;

        for (path, _) in manifest.files.iter() {
            if self.config.is_excluded(path) {
                info!("OTA: keeping device-local {}", path);
                continue;
            }
            self.backup_file(path)?;
            self.install_file(path)?;
            info!("OTA: applied {}", path);
            sink.emit(&OtaEvent::FileApplied {
                path: path.to_string(),
            });
        }

        let version_file = self.config.version_file.clone();
        self.backup_file(&version_file)?;
        version::write_local_version(&mut self.fs, &version_file, &manifest.version)
            .map_err(OtaError::Apply)?;
        info!("OTA: version record set to {}", manifest.version);

        let installed = self.config.installed_manifest.clone();
        self.backup_file(&installed)?;
        self.fs
            .write(&installed, &manifest.to_json())
            .map_err(OtaError::Apply)?;
        let recorded = self.local_version();
        if recorded != manifest.version {
            warn!("OTA: version mismatch: manifest={}, record={}", manifest.version, recorded);
        }

        Ok(manifest)
    }

    /// Re-hash every staged file before the live tree is touched.
    fn preflight(&self, manifest: &Manifest) -> Result<()> {
        for (path, entry) in manifest.files.iter() {
            if self.config.is_excluded(path) {
                continue;
            }
            let actual = hash_raw(&self.fs, &self.staged_path(path))?;
            if actual != entry.sha256 {
                error!("OTA: staged {} no longer matches its manifest hash", path);
                return Err(OtaError::Integrity);
            }
        }
        debug!("OTA: preflight ok");
        Ok(())
    }

    fn backup_file(&mut self, path: &str) -> Result<()> {
        let backup = self.backup_path(path);
        if self.fs.exists(&backup) {
            debug!("OTA: backup of {} already present", path);
            return Ok(());
        }
        let mut created = self.created_paths();
        if created.iter().any(|p| p == path) {
            // Live copy is our own from an interrupted apply.
            debug!("OTA: {} already recorded as new", path);
            return Ok(());
        }
        if !self.fs.exists(path) {
            info!("OTA: {} is new, recording it for rollback", path);
            created.push(path.to_string());
            return self.write_created(&created).map_err(|e| {
                error!("OTA: could not record new file {}: {}", path, e);
                OtaError::Apply(e)
            });
        }
        self.fs
            .create_dir_all(parent_dir(&backup))
            .and_then(|()| self.fs.copy(path, &backup))
            .map_err(|e| {
                error!("OTA: backup of {} failed: {}", path, e);
                OtaError::Apply(e)
            })
    }

    fn created_paths(&self) -> Vec<String> {
        match self.fs.read(&self.backup_path(CREATED_RECORD)) {
            Ok(bytes) => String::from_utf8_lossy(&bytes)
                .lines()
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect(),
            Err(FsError::NotFound) => Vec::new(),
            Err(e) => {
                warn!("OTA: created record unreadable: {}", e);
                Vec::new()
            }
        }
    }

    fn write_created(&mut self, paths: &[String]) -> core::result::Result<(), FsError> {
        let mut text = paths.join("\n");
        text.push('\n');
        self.fs.create_dir_all(&self.config.backup_dir)?;
        self.fs.write(&self.backup_path(CREATED_RECORD), text.as_bytes())
    }

    fn install_file(&mut self, path: &str) -> Result<()> {
        let staged = self.staged_path(path);
        self.fs
            .create_dir_all(parent_dir(path))
            .and_then(|()| self.fs.copy(&staged, path))
            .map_err(|e| {
                error!("OTA: copy of {} into place failed: {}", path, e);
                OtaError::Apply(e)
            })
    }

    /// Restore every backed-up file and delete every file the update added,
    /// then clear both flags and the staging tree.  Best effort: a file that
    /// cannot be restored is logged and counted, and the rest are still
    /// attempted.  The backup tree is kept unless every file came back.
    pub fn rollback(&mut self, sink: &mut impl EventSink) {
        let backups = match self.fs.list_files(&self.config.backup_dir) {
            Ok(files) => files,
            Err(FsError::NotFound) => Vec::new(),
            Err(e) => {
                error!("OTA: cannot list backups: {}", e);
                Vec::new()
            }
        };

        let (mut restored, mut failed) = (0usize, 0usize);
        for rel in &backups {
            if rel == CREATED_RECORD {
                continue;
            }
            if self.config.is_excluded(rel) {
                info!("OTA: rollback skips device-local {}", rel);
                continue;
            }
            match self.restore_file(rel) {
                Ok(()) => {
                    restored += 1;
                    info!("OTA: restored {}", rel);
                }
                Err(e) => {
                    failed += 1;
                    error!("OTA: restore of {} failed: {}", rel, e);
                }
            }
        }

        for rel in self.created_paths() {
            if self.config.is_excluded(&rel) {
                continue;
            }
            match self.fs.remove_file(&rel) {
                Ok(()) | Err(FsError::NotFound) => {
                    restored += 1;
                    info!("OTA: removed new {}", rel);
                }
                Err(e) => {
                    failed += 1;
                    error!("OTA: removal of new {} failed: {}", rel, e);
                }
            }
        }

        if let Err(e) = self.flags().clear_all() {
            warn!("OTA: flags not fully cleared after rollback: {}", e);
        }
        remove_tree(&mut self.fs, &self.config.staging_dir);
        if failed == 0 {
            self.cleanup_backups();
        }

        info!("OTA: rollback complete ({} restored, {} failed)", restored, failed);
        sink.emit(&OtaEvent::RolledBack { restored, failed });
    }

    fn restore_file(&mut self, rel: &str) -> core::result::Result<(), FsError> {
        let backup = self.backup_path(rel);
        self.fs.create_dir_all(parent_dir(rel))?;
        self.fs.copy(&backup, rel)
    }

    /// Drop the backup tree once the update it protects is resolved.
    pub fn cleanup_backups(&mut self) {
        remove_tree(&mut self.fs, &self.config.backup_dir);
    }
}

/// Recursive delete that logs instead of failing; a missing tree is fine.
pub(crate) fn remove_tree<F: FlashFs>(fs: &mut F, dir: &str) {
    match fs.remove_dir_all(dir) {
        Ok(()) => info!("OTA: removed {}/", dir),
        Err(FsError::NotFound) => {}
        Err(e) => warn!("OTA: could not remove {}/: {}", dir, e),
    }
}
