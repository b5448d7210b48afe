//! Periodic update-check task.
//!
//! One cycle per `check_interval_secs`.  A cycle never starts while a flag
//! from an earlier update is unresolved, and skips entirely when the link
//! does not come up in time, so missed cycles never pile up.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  run_cycle                                                   │
//! │                                                              │
//! │  flags clear? ─▶ link up? ─▶ check_for_update ─▶ budget      │
//! │       │             │              │               │         │
//! │   Unresolved     Offline        NoUpdate        Deferred     │
//! │                                                    │         │
//! │         ┌──────────── gate closed ───────────────┐ ▼         │
//! │         │  download_update  ‖  report_progress   │           │
//! │         └────────────────────────────────────────┘           │
//! │                          │                                   │
//! │            pending flag ─▶ countdown ─▶ reboot               │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use core::time::Duration;

use futures_lite::future;
use log::{debug, error, info, warn};

use crate::app::events::{OtaEvent, RebootReason};
use crate::app::ports::{Delay, EventSink, FlashFs, HttpClient, LinkPort, SystemPort};
use crate::gate::UpdateGate;
use crate::ota::OtaUpdater;
use crate::ota::session::Progress;

const LINK_POLL: Duration = Duration::from_secs(1);

/// How one scheduler cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The link did not come up within the connectivity wait.
    Offline,
    /// A flag from an earlier update is still present.
    Unresolved,
    /// Up to date, or the check failed.
    NoUpdate,
    /// Not enough heap or flash right now.
    Deferred,
    /// Staging aborted; nothing was applied.
    DownloadFailed,
    /// The update is staged and a reboot was requested.
    Staged,
}

/// Drives the update engine from a background task.
///
/// `timer` paces the scheduler's own waits (link polling, progress log,
/// countdown, check interval) independently of the engine's delays.
pub struct UpdateScheduler<'g, L, T> {
    link: L,
    timer: T,
    gate: &'g UpdateGate,
}

impl<'g, L: LinkPort, T: Delay> UpdateScheduler<'g, L, T> {
    pub fn new(link: L, timer: T, gate: &'g UpdateGate) -> Self {
        Self { link, timer, gate }
    }

    /// Check, budget, download and stage, once.
    pub async fn run_cycle<H, F, S, D>(
        &self,
        updater: &mut OtaUpdater<H, F, S, D>,
        sink: &mut impl EventSink,
    ) -> CycleOutcome
    where
        H: HttpClient,
        F: FlashFs,
        S: SystemPort,
        D: Delay,
    {
        if updater.update_in_flight() {
            warn!("SCHED: update flags unresolved, skipping check");
            return CycleOutcome::Unresolved;
        }
        if !self.wait_for_link(updater.config().connect_timeout_secs).await {
            warn!("SCHED: no link after {} s, skipping cycle", updater.config().connect_timeout_secs);
            return CycleOutcome::Offline;
        }
        if !updater.check_for_update(sink).await {
            return CycleOutcome::NoUpdate;
        }
        if let Err(e) = updater.check_resources() {
            warn!("SCHED: update deferred: {}", e);
            sink.emit(&OtaEvent::Deferred(e));
            return CycleOutcome::Deferred;
        }

        let version = updater
            .session()
            .map(|s| s.remote_version().to_string())
            .unwrap_or_default();
        let period = Duration::from_millis(u64::from(updater.config().progress_report_ms));
        let progress = updater.progress();

        let staged = {
            let _hold = self.gate.close();
            future::or(updater.download_update(sink), async {
                self.report_progress(&progress, period).await;
                false
            })
            .await
        };
        if !staged {
            return CycleOutcome::DownloadFailed;
        }

        if let Err(e) = updater.mark_pending() {
            error!("SCHED: staged {} but could not write pending flag: {}", version, e);
            return CycleOutcome::DownloadFailed;
        }
        sink.emit(&OtaEvent::Staged { version });

        self.countdown(updater.config().reboot_countdown_secs).await;
        sink.emit(&OtaEvent::Rebooting {
            reason: RebootReason::UpdateStaged,
        });
        updater.system_mut().reboot();
        CycleOutcome::Staged
    }

    /// [`run_cycle`](Self::run_cycle) every `check_interval_secs`.  Never
    /// returns.
    pub async fn run_forever<H, F, S, D>(&self, updater: &mut OtaUpdater<H, F, S, D>, sink: &mut impl EventSink)
    where
        H: HttpClient,
        F: FlashFs,
        S: SystemPort,
        D: Delay,
    {
        let interval = Duration::from_secs(u64::from(updater.config().check_interval_secs));
        info!("SCHED: update check every {} s", interval.as_secs());
        loop {
            let outcome = self.run_cycle(updater, sink).await;
            debug!("SCHED: cycle ended: {:?}", outcome);
            self.timer.sleep(interval).await;
        }
    }

    /// Log download progress every `period` until dropped.
    pub async fn report_progress(&self, progress: &Progress, period: Duration) {
        loop {
            self.timer.sleep(period).await;
            info!("OTA {:>3}% - {}", progress.percent(), progress.status());
        }
    }

    async fn wait_for_link(&self, timeout_secs: u32) -> bool {
        for _ in 0..timeout_secs {
            if self.link.is_connected() {
                return true;
            }
            self.timer.sleep(LINK_POLL).await;
        }
        self.link.is_connected()
    }

    async fn countdown(&self, secs: u8) {
        for remaining in (1..=secs).rev() {
            info!("SCHED: rebooting into update in {} s", remaining);
            self.timer.sleep(Duration::from_secs(1)).await;
        }
    }
}
