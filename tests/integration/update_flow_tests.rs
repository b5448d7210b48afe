//! Check → download → apply → commit, across simulated reboots.

use futures_lite::future::block_on;

use sensornode::app::events::OtaEvent;
use sensornode::app::ports::FlashFs;
use sensornode::error::{ManifestError, NetworkError, OtaError, TransportError};
use sensornode::gate::UpdateGate;
use sensornode::ota::OtaUpdater;
use sensornode::ota::commit::CommitOutcome;
use sensornode::ota::flags::BootPhase;
use sensornode::ota::manifest::Manifest;

use crate::mock_hw::*;

const RELEASE: [(&str, &[u8]); 3] = [
    ("main.py", b"print('v2')\r\nrun()\r\n"),
    ("lib/ota.py", b"def check():\n    return True\n"),
    ("assets/logo.bin", &[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a]),
];

fn device_on_1_1_9() -> FaultyFs {
    let mut fs = FaultyFs::new(CAPACITY);
    fs.seed("version.txt", b"1.1.9");
    fs.seed("main.py", b"print('v1')\n");
    fs.seed("lib/ota.py", b"def check():\n    return False\n");
    fs.seed("config.json", b"{\"wifi\":\"home\"}");
    fs
}

#[test]
fn update_is_staged_applied_and_committed() {
    let cfg = test_config();
    let manifest = manifest_for("1.2.0", &RELEASE);
    let mut http = MockHttp::new();
    publish(&mut http, &cfg, &manifest, &RELEASE);
    let mut sink = RecordingSink::default();

    // ── boot N: check + download ──
    let (mut ota, _delay) = updater(cfg.clone(), http, device_on_1_1_9());
    assert!(block_on(ota.check_for_update(&mut sink)));
    assert!(sink.contains(&OtaEvent::UpdateAvailable {
        local: "1.1.9".into(),
        remote: "1.2.0".into(),
    }));
    assert!(ota.check_resources().is_ok());
    assert!(block_on(ota.download_update(&mut sink)));
    assert_eq!(ota.get_progress(), 100);
    ota.mark_pending().unwrap();
    assert_eq!(ota.boot_phase(), BootPhase::ApplyPending);

    // Text files are staged normalised, binaries verbatim.
    assert_eq!(ota.fs().read("update/main.py").unwrap(), b"print('v2')\nrun()\n");
    assert_eq!(ota.fs().read("update/assets/logo.bin").unwrap(), RELEASE[2].1);
    // Nothing live has changed yet.
    assert_eq!(ota.local_version(), "1.1.9");
    assert_eq!(ota.fs().text("main.py"), "print('v1')\n");

    // ── boot N+1: apply ──
    let (http, fs, _, _) = ota.into_ports();
    let (mut ota, _delay) = updater(cfg.clone(), http, fs);
    assert!(ota.apply_update(&mut sink));
    assert_eq!(ota.local_version(), "1.2.0");
    assert_eq!(ota.boot_phase(), BootPhase::CommitPending);
    assert_eq!(ota.fs().text("main.py"), "print('v2')\nrun()\n");
    assert_eq!(ota.fs().text("backup/main.py"), "print('v1')\n");
    assert_eq!(ota.fs().text("backup/version.txt"), "1.1.9");
    assert_eq!(ota.fs().text("config.json"), "{\"wifi\":\"home\"}");
    assert!(!ota.fs().exists("update"));
    let installed = Manifest::parse(&ota.fs().read("manifest.json").unwrap()).unwrap();
    assert_eq!(installed, manifest);

    // ── boot N+2: commit ──
    let (http, fs, _, _) = ota.into_ports();
    let (mut ota, delay) = updater(cfg.clone(), http, fs);
    let gate = UpdateGate::new();
    let outcome = block_on(ota.verify_ota_commit(&gate, &mut sink));
    assert_eq!(outcome, CommitOutcome::Committed { attempt: 1 });
    assert!(delay.sleeps().is_empty());
    assert_eq!(ota.boot_phase(), BootPhase::Normal);
    assert!(!ota.fs().exists("backup"));
    assert!(gate.is_open());
    assert!(sink.contains(&OtaEvent::CommitVerified {
        version: "1.2.0".into(),
        attempt: 1,
    }));
}

#[test]
fn up_to_date_check_is_idempotent() {
    let cfg = test_config();
    let manifest = manifest_for("1.1.9", &RELEASE);
    let mut http = MockHttp::new();
    publish(&mut http, &cfg, &manifest, &RELEASE);
    let (mut ota, _delay) = updater(cfg.clone(), http, device_on_1_1_9());
    let before = ota.fs().live_tree();
    let mut sink = RecordingSink::default();

    assert!(!block_on(ota.check_for_update(&mut sink)));
    assert!(!block_on(ota.check_for_update(&mut sink)));

    assert!(ota.session().is_none());
    assert_eq!(ota.http().requests(), [cfg.manifest_url(), cfg.manifest_url()]);
    assert_eq!(ota.fs().live_tree(), before);
    assert_eq!(sink.count(|e| matches!(e, OtaEvent::UpToDate { .. })), 2);
    assert!(!block_on(ota.download_update(&mut sink)));
}

#[test]
fn older_remote_version_still_counts_as_update() {
    let cfg = test_config();
    let manifest = manifest_for("1.0.0", &RELEASE);
    let mut http = MockHttp::new();
    publish(&mut http, &cfg, &manifest, &RELEASE);
    let (mut ota, _delay) = updater(cfg, http, device_on_1_1_9());

    assert!(block_on(ota.check_for_update(&mut RecordingSink::default())));
    assert_eq!(ota.session().unwrap().remote_version(), "1.0.0");
}

#[test]
fn missing_version_record_reads_as_zero() {
    let cfg = test_config();
    let manifest = manifest_for("0.0.1", &RELEASE);
    let mut http = MockHttp::new();
    publish(&mut http, &cfg, &manifest, &RELEASE);
    let (mut ota, _delay) = updater(cfg, http, FaultyFs::new(CAPACITY));
    let mut sink = RecordingSink::default();

    assert!(block_on(ota.check_for_update(&mut sink)));
    assert!(sink.contains(&OtaEvent::UpdateAvailable {
        local: "0.0.0".into(),
        remote: "0.0.1".into(),
    }));
}

// ── Manifest fetch failures ───────────────────────────────────

#[test]
fn transport_failures_are_retried_three_times() {
    let cfg = test_config();
    let mut http = MockHttp::new();
    http.fail(&cfg.manifest_url(), TransportError::Timeout);
    let (mut ota, delay) = updater(cfg.clone(), http, device_on_1_1_9());
    let mut sink = RecordingSink::default();

    assert!(!block_on(ota.check_for_update(&mut sink)));
    assert_eq!(ota.http().count(&cfg.manifest_url()), 3);
    assert_eq!(delay.sleeps(), [std::time::Duration::from_secs(1); 2]);
    assert!(sink.contains(&OtaEvent::CheckFailed(OtaError::Network(NetworkError::RetriesExhausted))));
}

#[test]
fn http_error_status_is_not_retried() {
    let cfg = test_config();
    let mut http = MockHttp::new();
    http.status(&cfg.manifest_url(), 500);
    let (mut ota, delay) = updater(cfg.clone(), http, device_on_1_1_9());
    let mut sink = RecordingSink::default();

    assert!(!block_on(ota.check_for_update(&mut sink)));
    assert_eq!(ota.http().count(&cfg.manifest_url()), 1);
    assert!(delay.sleeps().is_empty());
    assert!(sink.contains(&OtaEvent::CheckFailed(OtaError::Network(NetworkError::HttpStatus(500)))));
}

#[test]
fn malformed_manifest_fails_the_check() {
    let cfg = test_config();
    let mut http = MockHttp::new();
    http.serve(&cfg.manifest_url(), b"{\"version\":\"\",\"files\":{}}".to_vec());
    let (mut ota, _delay) = updater(cfg.clone(), http, device_on_1_1_9());
    let mut sink = RecordingSink::default();

    assert!(!block_on(ota.check_for_update(&mut sink)));
    assert!(sink.contains(&OtaEvent::CheckFailed(OtaError::Manifest(ManifestError::MissingVersion))));

    ota.http_mut().serve(&cfg.manifest_url(), b"<html>".to_vec());
    assert!(!block_on(ota.check_for_update(&mut sink)));
    assert!(sink.contains(&OtaEvent::CheckFailed(OtaError::Manifest(ManifestError::Malformed))));
}

#[test]
fn failed_check_discards_the_previous_session() {
    let cfg = test_config();
    let manifest = manifest_for("1.2.0", &RELEASE);
    let mut http = MockHttp::new();
    publish(&mut http, &cfg, &manifest, &RELEASE);
    let (mut ota, _delay) = updater(cfg.clone(), http, device_on_1_1_9());
    let mut sink = RecordingSink::default();

    assert!(block_on(ota.check_for_update(&mut sink)));
    assert!(ota.session().is_some());

    ota.http_mut().status(&cfg.manifest_url(), 404);
    assert!(!block_on(ota.check_for_update(&mut sink)));
    assert!(ota.session().is_none());
}

#[test]
fn engine_can_be_rebuilt_from_its_ports() {
    let cfg = test_config();
    let (ota, _delay) = updater(cfg.clone(), MockHttp::new(), device_on_1_1_9());
    let (http, fs, system, delay) = ota.into_ports();
    let ota = OtaUpdater::new(cfg, http, fs, system, delay);
    assert_eq!(ota.local_version(), "1.1.9");
}
