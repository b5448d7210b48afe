//! Outbound update-engine events.
//!
//! The [`OtaUpdater`](crate::ota::OtaUpdater), boot sequencer and scheduler
//! emit these through the [`EventSink`](super::ports::EventSink) port.
//! Adapters on the other side decide what to do with them: log to serial,
//! blink the status LED, publish over the uplink, etc.

use crate::error::{OtaError, ResourceError};

/// Structured events emitted by the update engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OtaEvent {
    /// The remote manifest names a different version than the local record.
    UpdateAvailable { local: String, remote: String },

    /// The remote manifest matches the local record.
    UpToDate { version: String },

    /// The manifest check itself failed (network or parse).
    CheckFailed(OtaError),

    /// Not enough heap or flash; retried next cycle.
    Deferred(ResourceError),

    /// One more file was staged and verified.
    DownloadProgress { percent: u8, file: String },

    /// Every file is staged and verified.
    DownloadComplete { version: String },

    /// Staging aborted; the live tree is untouched.
    DownloadFailed(OtaError),

    /// The pending flag is written; the next boot applies the update.
    Staged { version: String },

    /// One staged file was copied into the live tree.
    FileApplied { path: String },

    /// Every file is in place and the version record updated.
    Applied { version: String },

    /// Apply aborted; rollback follows.
    ApplyFailed(OtaError),

    /// The server confirmed the applied version.
    CommitVerified { version: String, attempt: u8 },

    /// The applied version could not be confirmed.
    CommitFailed(OtaError),

    /// Backed-up files were restored.
    RolledBack { restored: usize, failed: usize },

    /// The device is about to reset.
    Rebooting { reason: RebootReason },
}

/// Why the engine asked for a reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebootReason {
    /// A staged update is waiting for the apply phase.
    UpdateStaged,
    /// An applied update is waiting for commit verification.
    UpdateApplied,
}
