//! Manifest fetcher.
//!
//! Pulls the remote manifest with a bounded number of transport retries and
//! decides whether an update is available by comparing its version with the
//! local record.  Version comparison is plain string inequality: a remote
//! version "older" than the local one is still an update.

use core::time::Duration;

use log::{info, warn};

use super::OtaUpdater;
use super::manifest::Manifest;
use super::session::UpdateSession;
use crate::app::events::OtaEvent;
use crate::app::ports::{Delay, EventSink, FlashFs, HttpClient, SystemPort};
use crate::error::{NetworkError, Result};

impl<H, F, S, D> OtaUpdater<H, F, S, D>
where
    H: HttpClient,
    F: FlashFs,
    S: SystemPort,
    D: Delay,
{
    /// Fetch and parse the remote manifest.
    ///
    /// Transport failures are retried up to `manifest_attempts` times with
    /// `manifest_retry_delay_ms` between them.  A non-200 answer ends the
    /// check immediately; so does a document that fails validation.
    pub async fn fetch_manifest(&mut self) -> Result<Manifest> {
        let url = self.config.manifest_url();
        let attempts = self.config.manifest_attempts.max(1);
        let retry_delay = Duration::from_millis(u64::from(self.config.manifest_retry_delay_ms));

        for attempt in 1..=attempts {
            match self.http.get(&url).await {
                Ok(resp) if resp.is_success() => {
                    let manifest = Manifest::parse(&resp.body).inspect_err(|e| {
                        warn!("OTA: manifest rejected: {}", e);
                    })?;
                    info!(
                        "OTA: manifest {} lists {} files ({} B)",
                        manifest.version,
                        manifest.files.len(),
                        manifest.total_size()
                    );
                    return Ok(manifest);
                }
                Ok(resp) => {
                    warn!("OTA: manifest request returned HTTP {}", resp.status);
                    return Err(NetworkError::HttpStatus(resp.status).into());
                }
                Err(e) => {
                    warn!("OTA: manifest attempt {}/{} failed: {}", attempt, attempts, e);
                    if attempt < attempts {
                        self.delay.sleep(retry_delay).await;
                    }
                }
            }
        }
        Err(NetworkError::RetriesExhausted.into())
    }

    /// Remote version only; used by commit verification.
    pub async fn fetch_remote_version(&mut self) -> Result<String> {
        self.fetch_manifest().await.map(|m| m.version)
    }

    /// Whether the server offers a version different from the installed one.
    ///
    /// On `true` a fresh [`UpdateSession`] is ready for
    /// [`download_update`](Self::download_update).  Any failure is logged,
    /// emitted as [`OtaEvent::CheckFailed`], clears the session and reads as
    /// "no update".
    pub async fn check_for_update(&mut self, sink: &mut impl EventSink) -> bool {
        self.session = None;
        let manifest = match self.fetch_manifest().await {
            Ok(m) => m,
            Err(e) => {
                warn!("OTA: update check failed: {}", e);
                sink.emit(&OtaEvent::CheckFailed(e));
                return false;
            }
        };

        let local = self.local_version();
        info!("OTA: local {} | remote {}", local, manifest.version);

        if manifest.version == local {
            info!("OTA: firmware is up to date");
            sink.emit(&OtaEvent::UpToDate { version: local });
            return false;
        }

        sink.emit(&OtaEvent::UpdateAvailable {
            local,
            remote: manifest.version.clone(),
        });
        self.progress.reset();
        self.session = Some(UpdateSession::new(manifest));
        true
    }
}
