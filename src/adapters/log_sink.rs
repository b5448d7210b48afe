//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing update-engine events to the ESP-IDF
//! logger (UART / USB-CDC in production).  A telemetry uplink adapter would
//! implement the same trait.

use log::{error, info, warn};

use crate::app::events::OtaEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`OtaEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &OtaEvent) {
        match event {
            OtaEvent::UpdateAvailable { local, remote } => {
                info!("OTA | update available | local={} remote={}", local, remote);
            }
            OtaEvent::UpToDate { version } => info!("OTA | up to date | version={}", version),
            OtaEvent::CheckFailed(e) => warn!("OTA | check failed | {}", e),
            OtaEvent::Deferred(e) => warn!("OTA | deferred | {}", e),
            OtaEvent::DownloadProgress { percent, file } => {
                info!("OTA | download {:>3}% | {}", percent, file);
            }
            OtaEvent::DownloadComplete { version } => info!("OTA | downloaded | version={}", version),
            OtaEvent::DownloadFailed(e) => error!("OTA | download failed | {}", e),
            OtaEvent::Staged { version } => info!("OTA | staged | version={}", version),
            OtaEvent::FileApplied { path } => info!("OTA | applied | {}", path),
            OtaEvent::Applied { version } => info!("OTA | apply complete | version={}", version),
            OtaEvent::ApplyFailed(e) => error!("OTA | apply failed | {}", e),
            OtaEvent::CommitVerified { version, attempt } => {
                info!("OTA | committed | version={} attempt={}", version, attempt);
            }
            OtaEvent::CommitFailed(e) => error!("OTA | commit failed | {}", e),
            OtaEvent::RolledBack { restored, failed } => {
                warn!("OTA | rolled back | restored={} failed={}", restored, failed);
            }
            OtaEvent::Rebooting { reason } => warn!("OTA | rebooting | {:?}", reason),
        }
    }
}
