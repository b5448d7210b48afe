//! Scheduler cycle outcomes and the boot sequence.

use std::time::Duration;

use futures_lite::future::block_on;

use sensornode::app::events::{OtaEvent, RebootReason};
use sensornode::app::ports::FlashFs;
use sensornode::boot::{BootOutcome, run_boot_sequence};
use sensornode::error::ResourceError;
use sensornode::gate::UpdateGate;
use sensornode::ota::flags::BootPhase;
use sensornode::scheduler::{CycleOutcome, UpdateScheduler};

use crate::mock_hw::*;

const RELEASE: [(&str, &[u8]); 2] = [("main.py", b"print('v6')\n"), ("lib/net.py", b"TIMEOUT = 5\n")];

fn device() -> FaultyFs {
    let mut fs = FaultyFs::new(CAPACITY);
    fs.seed("version.txt", b"5.0.0");
    fs.seed("main.py", b"print('v5')\n");
    fs
}

fn online_updater() -> (TestUpdater, RecordingDelay) {
    let cfg = test_config();
    let manifest = manifest_for("6.0.0", &RELEASE);
    let mut http = MockHttp::new();
    publish(&mut http, &cfg, &manifest, &RELEASE);
    updater(cfg, http, device())
}

#[test]
fn cycle_stages_update_and_reboots() {
    let (mut ota, _delay) = online_updater();
    let gate = UpdateGate::new();
    let timer = RecordingDelay::new();
    let scheduler = UpdateScheduler::new(MockLink::up(), timer.clone(), &gate);
    let mut sink = RecordingSink::default();

    let outcome = block_on(scheduler.run_cycle(&mut ota, &mut sink));

    assert_eq!(outcome, CycleOutcome::Staged);
    assert_eq!(ota.boot_phase(), BootPhase::ApplyPending);
    assert_eq!(ota.system().reboots, 1);
    assert_eq!(timer.count_of(Duration::from_secs(1)), 10);
    assert!(gate.is_open());
    assert!(sink.contains(&OtaEvent::Staged {
        version: "6.0.0".into()
    }));
    assert_eq!(
        sink.events.last(),
        Some(&OtaEvent::Rebooting {
            reason: RebootReason::UpdateStaged
        })
    );
    // Still the old firmware until the apply boot.
    assert_eq!(ota.local_version(), "5.0.0");
}

#[test]
fn unresolved_flags_skip_the_cycle() {
    let (mut ota, _delay) = online_updater();
    ota.fs_mut().seed("ota_commit_pending.flag", b"applied");
    let gate = UpdateGate::new();
    let scheduler = UpdateScheduler::new(MockLink::up(), RecordingDelay::new(), &gate);

    let outcome = block_on(scheduler.run_cycle(&mut ota, &mut RecordingSink::default()));

    assert_eq!(outcome, CycleOutcome::Unresolved);
    assert!(ota.http().requests().is_empty());
}

#[test]
fn offline_cycle_gives_up_after_connect_timeout() {
    let (mut ota, _delay) = online_updater();
    let gate = UpdateGate::new();
    let timer = RecordingDelay::new();
    let scheduler = UpdateScheduler::new(MockLink::down(), timer.clone(), &gate);

    let outcome = block_on(scheduler.run_cycle(&mut ota, &mut RecordingSink::default()));

    assert_eq!(outcome, CycleOutcome::Offline);
    assert_eq!(timer.sleeps(), [Duration::from_secs(1); 30]);
    assert!(ota.http().requests().is_empty());
}

#[test]
fn up_to_date_cycle_downloads_nothing() {
    let cfg = test_config();
    let manifest = manifest_for("5.0.0", &RELEASE);
    let mut http = MockHttp::new();
    publish(&mut http, &cfg, &manifest, &RELEASE);
    let (mut ota, _delay) = updater(cfg.clone(), http, device());
    let gate = UpdateGate::new();
    let scheduler = UpdateScheduler::new(MockLink::up(), RecordingDelay::new(), &gate);

    let outcome = block_on(scheduler.run_cycle(&mut ota, &mut RecordingSink::default()));

    assert_eq!(outcome, CycleOutcome::NoUpdate);
    assert_eq!(ota.http().requests(), [cfg.manifest_url()]);
}

#[test]
fn low_memory_defers_before_any_download() {
    let (mut ota, _delay) = online_updater();
    ota.system_mut().heap = 50 * 1024;
    let gate = UpdateGate::new();
    let scheduler = UpdateScheduler::new(MockLink::up(), RecordingDelay::new(), &gate);
    let mut sink = RecordingSink::default();

    let outcome = block_on(scheduler.run_cycle(&mut ota, &mut sink));

    assert_eq!(outcome, CycleOutcome::Deferred);
    assert_eq!(ota.http().requests().len(), 1);
    assert!(!ota.fs().exists("update"));
    assert!(sink.contains(&OtaEvent::Deferred(ResourceError::LowMemory {
        free: 50 * 1024,
        floor: 100 * 1024,
    })));
    assert_eq!(ota.system().reboots, 0);
}

#[test]
fn low_flash_defers_before_any_download() {
    let (mut ota, _delay) = online_updater();
    let used = 5 + 12;
    let release: u64 = RELEASE.iter().map(|(_, d)| d.len() as u64).sum();
    // One byte short of staged + backup copies plus the buffer.
    ota.fs_mut().set_capacity(used + 2 * release + 16 * 1024 - 1);
    let gate = UpdateGate::new();
    let scheduler = UpdateScheduler::new(MockLink::up(), RecordingDelay::new(), &gate);
    let mut sink = RecordingSink::default();

    let outcome = block_on(scheduler.run_cycle(&mut ota, &mut sink));

    assert_eq!(outcome, CycleOutcome::Deferred);
    assert_eq!(sink.count(|e| matches!(e, OtaEvent::Deferred(ResourceError::LowFlash { .. }))), 1);
    assert!(!ota.fs().exists("update"));
}

#[test]
fn failed_download_writes_no_flag() {
    let cfg = test_config();
    let (mut ota, _delay) = online_updater();
    ota.http_mut().status(&cfg.file_url("lib/net.py"), 500);
    let gate = UpdateGate::new();
    let scheduler = UpdateScheduler::new(MockLink::up(), RecordingDelay::new(), &gate);

    let outcome = block_on(scheduler.run_cycle(&mut ota, &mut RecordingSink::default()));

    assert_eq!(outcome, CycleOutcome::DownloadFailed);
    assert_eq!(ota.boot_phase(), BootPhase::Normal);
    assert_eq!(ota.system().reboots, 0);
    assert!(gate.is_open());
}

// ── Boot sequence ─────────────────────────────────────────────

#[test]
fn boot_walks_an_update_from_staged_to_committed() {
    let (mut ota, _delay) = online_updater();
    let gate = UpdateGate::new();
    let scheduler = UpdateScheduler::new(MockLink::up(), RecordingDelay::new(), &gate);
    let mut sink = RecordingSink::default();

    assert_eq!(block_on(run_boot_sequence(&mut ota, &gate, &mut sink)), BootOutcome::Normal);
    assert_eq!(block_on(scheduler.run_cycle(&mut ota, &mut sink)), CycleOutcome::Staged);

    assert_eq!(block_on(run_boot_sequence(&mut ota, &gate, &mut sink)), BootOutcome::Applied);
    assert_eq!(ota.system().reboots, 2);
    assert_eq!(ota.local_version(), "6.0.0");
    assert!(sink.contains(&OtaEvent::Rebooting {
        reason: RebootReason::UpdateApplied
    }));

    assert_eq!(block_on(run_boot_sequence(&mut ota, &gate, &mut sink)), BootOutcome::Committed);
    assert_eq!(ota.boot_phase(), BootPhase::Normal);
    assert!(gate.is_open());
}

#[test]
fn boot_rolls_back_a_broken_apply() {
    let cfg = test_config();
    let (mut ota, _delay) = online_updater();
    ota.fs_mut().seed(&cfg.pending_flag, b"ready");
    // Pending flag without a staged tree.
    let gate = UpdateGate::new();
    let mut sink = RecordingSink::default();

    let outcome = block_on(run_boot_sequence(&mut ota, &gate, &mut sink));

    assert_eq!(outcome, BootOutcome::ApplyRolledBack);
    assert_eq!(ota.boot_phase(), BootPhase::Normal);
    assert_eq!(ota.system().reboots, 0);
    assert_eq!(ota.local_version(), "5.0.0");
}

#[test]
fn boot_rolls_back_an_unconfirmed_commit() {
    let cfg = test_config();
    let (mut ota, delay) = online_updater();
    ota.fs_mut().seed("version.txt", b"7.0.0");
    ota.fs_mut().seed("backup/version.txt", b"5.0.0");
    ota.fs_mut().seed(&cfg.commit_pending_flag, b"applied");
    let gate = UpdateGate::new();

    let outcome = block_on(run_boot_sequence(&mut ota, &gate, &mut RecordingSink::default()));

    assert_eq!(outcome, BootOutcome::CommitRolledBack);
    assert_eq!(delay.count_of(Duration::from_secs(5)), 11);
    assert_eq!(ota.local_version(), "5.0.0");
}
