//! Boot-phase interpreter.
//!
//! The flag files are the only update state that survives a reset, so the
//! whole decision at boot is "which flag exists":
//!
//! | Flag present      | Action                                         |
//! |-------------------|------------------------------------------------|
//! | `pending`         | apply the staged update, reboot on success     |
//! | `commit-pending`  | verify the applied version, commit or rollback |
//! | neither           | normal boot                                    |
//!
//! Runs before the periodic tasks start.

use log::info;

use crate::app::events::{OtaEvent, RebootReason};
use crate::app::ports::{Delay, EventSink, FlashFs, HttpClient, SystemPort};
use crate::gate::UpdateGate;
use crate::ota::OtaUpdater;
use crate::ota::commit::CommitOutcome;
use crate::ota::flags::BootPhase;

/// What the boot sequence did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootOutcome {
    /// No update phase was pending.
    Normal,
    /// The staged update was applied and a reboot requested.
    Applied,
    /// Apply failed; the previous firmware was restored.
    ApplyRolledBack,
    /// The applied update was confirmed.
    Committed,
    /// The applied update was not confirmed and was rolled back.
    CommitRolledBack,
}

/// Resolve whatever update phase the flags say is outstanding.
pub async fn run_boot_sequence<H, F, S, D>(
    updater: &mut OtaUpdater<H, F, S, D>,
    gate: &UpdateGate,
    sink: &mut impl EventSink,
) -> BootOutcome
where
    H: HttpClient,
    F: FlashFs,
    S: SystemPort,
    D: Delay,
{
    let phase = updater.boot_phase();
    info!("BOOT: firmware {}, update phase {:?}", updater.local_version(), phase);

    match phase {
        BootPhase::Normal => BootOutcome::Normal,
        BootPhase::ApplyPending => {
            let applied = {
                let _hold = gate.close();
                updater.apply_update(sink)
            };
            if !applied {
                return BootOutcome::ApplyRolledBack;
            }
            sink.emit(&OtaEvent::Rebooting {
                reason: RebootReason::UpdateApplied,
            });
            updater.system_mut().reboot();
            BootOutcome::Applied
        }
        BootPhase::CommitPending => match updater.verify_ota_commit(gate, sink).await {
            CommitOutcome::Committed { .. } => BootOutcome::Committed,
            CommitOutcome::RolledBack => BootOutcome::CommitRolledBack,
            CommitOutcome::NotPending => BootOutcome::Normal,
        },
    }
}
