//! Boot-time commit verifier.
//!
//! Runs once on the boot after an apply, while the commit-pending flag
//! exists.  The new firmware must reach the update server and see its own
//! version there within a bounded number of attempts; otherwise it is
//! treated as broken and rolled back.  Gated work stays paused throughout.

use core::time::Duration;

use log::{error, info, warn};

use super::OtaUpdater;
use crate::app::events::OtaEvent;
use crate::app::ports::{Delay, EventSink, FlashFs, HttpClient, SystemPort};
use crate::error::OtaError;
use crate::gate::UpdateGate;

/// Result of one verification run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// No commit-pending flag; nothing was checked.
    NotPending,
    /// The server confirmed the installed version on this attempt (1-based).
    Committed { attempt: u8 },
    /// Attempts exhausted; the previous firmware was restored.
    RolledBack,
}

impl<H, F, S, D> OtaUpdater<H, F, S, D>
where
    H: HttpClient,
    F: FlashFs,
    S: SystemPort,
    D: Delay,
{
    /// Confirm the applied update or roll it back.
    ///
    /// Each attempt fetches the remote manifest and compares its version
    /// with the local record written by apply.  A network failure costs an
    /// attempt like a mismatch does; it never counts as confirmation.
    pub async fn verify_ota_commit(&mut self, gate: &UpdateGate, sink: &mut impl EventSink) -> CommitOutcome {
        if !self.flags().is_commit_pending() {
            return CommitOutcome::NotPending;
        }
        let _hold = gate.close();

        let local = self.local_version();
        let attempts = self.config.commit_attempts.max(1);
        let spacing = Duration::from_millis(u64::from(self.config.commit_retry_delay_ms));
        info!("OTA: verifying commit of {} ({} attempts)", local, attempts);

        for attempt in 1..=attempts {
            match self.fetch_remote_version().await {
                Ok(remote) if remote == local => {
                    info!("OTA: {} confirmed on attempt {}", local, attempt);
                    if let Err(e) = self.flags().clear_commit_pending() {
                        warn!("OTA: commit flag not cleared, will re-verify next boot: {}", e);
                    }
                    self.cleanup_backups();
                    sink.emit(&OtaEvent::CommitVerified {
                        version: local,
                        attempt,
                    });
                    return CommitOutcome::Committed { attempt };
                }
                Ok(remote) => {
                    warn!("OTA: commit attempt {}/{}: server has {}, installed {}", attempt, attempts, remote, local);
                }
                Err(e) => {
                    warn!("OTA: commit attempt {}/{} failed: {}", attempt, attempts, e);
                }
            }
            if attempt < attempts {
                self.delay.sleep(spacing).await;
            }
        }

        let err = OtaError::CommitTimeout { attempts };
        error!("OTA: {}, rolling back", err);
        sink.emit(&OtaEvent::CommitFailed(err));
        self.rollback(sink);
        CommitOutcome::RolledBack
    }
}
