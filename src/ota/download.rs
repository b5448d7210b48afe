//! Staged downloader.
//!
//! Every manifest file is fetched into the staging directory in manifest
//! order and hashed straight after the write.  The first failure of any
//! kind aborts the batch: nothing after the failing file is fetched and the
//! live tree is never touched, since apply only runs from a pending flag
//! written after a complete download.

use core::time::Duration;

use log::{error, info};

use super::digest::{hash_raw, is_text_path, normalize_line_endings};
use super::session::UpdateSession;
use super::{OtaUpdater, STAGED_MANIFEST, parent_dir};
use crate::app::events::OtaEvent;
use crate::app::ports::{Delay, EventSink, FlashFs, HttpClient, SystemPort};
use crate::error::{NetworkError, OtaError, Result};

/// Pause after each file so other tasks get a turn.
const FILE_YIELD: Duration = Duration::from_millis(10);

impl<H, F, S, D> OtaUpdater<H, F, S, D>
where
    H: HttpClient,
    F: FlashFs,
    S: SystemPort,
    D: Delay,
{
    /// Stage the update found by the last successful
    /// [`check_for_update`](Self::check_for_update).
    ///
    /// Consumes the session either way.  Partially staged files are left
    /// in place for inspection; the next download overwrites them.
    pub async fn download_update(&mut self, sink: &mut impl EventSink) -> bool {
        let Some(session) = self.session.take() else {
            error!("OTA: download requested without an update session");
            return false;
        };

        match self.stage_all(&session, sink).await {
            Ok(()) => {
                info!("OTA: all {} files staged for {}", session.file_count(), session.remote_version());
                sink.emit(&OtaEvent::DownloadComplete {
                    version: session.remote_version().to_string(),
                });
                true
            }
            Err(e) => {
                error!("OTA: download aborted: {}", e);
                sink.emit(&OtaEvent::DownloadFailed(e));
                false
            }
        }
    }

    async fn stage_all(&mut self, session: &UpdateSession, sink: &mut impl EventSink) -> Result<()> {
        // Left over from a resolved update whose cleanup failed; a new apply
        // must back up the current tree, not an older one.
        if !self.update_in_flight() {
            self.cleanup_backups();
        }
        self.fs.create_dir_all(&self.config.staging_dir)?;

        let total = session.file_count();
        for (i, (path, entry)) in session.manifest().files.iter().enumerate() {
            self.progress.set_current_file(path);
            if let Err(e) = self.stage_file(path, &entry.sha256).await {
                error!("OTA: {} failed: {}", path, e);
                return Err(e);
            }
            let percent = self.progress.record(i + 1, total);
            info!("OTA: downloaded {} ({}%)", path, percent);
            sink.emit(&OtaEvent::DownloadProgress {
                percent,
                file: path.to_string(),
            });
            self.delay.sleep(FILE_YIELD).await;
        }

        // Apply runs after a reboot and reads only this copy.
        let copy = self.staged_path(STAGED_MANIFEST);
        self.fs.write(&copy, &session.manifest().to_json())?;
        Ok(())
    }

    async fn stage_file(&mut self, path: &str, expected: &str) -> Result<()> {
        let dest = self.staged_path(path);
        self.fs.create_dir_all(parent_dir(&dest))?;

        let resp = self.http.get(&self.config.file_url(path)).await?;
        if !resp.is_success() {
            return Err(NetworkError::HttpStatus(resp.status).into());
        }

        let body = if is_text_path(path, &self.config.text_extensions) {
            normalize_line_endings(&resp.body)
        } else {
            resp.body
        };
        self.fs.write(&dest, &body)?;

        // The body is already normalised; hash what landed on flash as is.
        let actual = hash_raw(&self.fs, &dest)?;
        if actual != expected {
            error!("OTA: hash mismatch for {}: expected {}, got {}", path, expected, actual);
            return Err(OtaError::Integrity);
        }
        Ok(())
    }
}
