//! Apply / rollback engine against a pre-staged update.

use sensornode::app::events::OtaEvent;
use sensornode::app::ports::FlashFs;
use sensornode::error::{FsError, OtaError};
use sensornode::ota::flags::BootPhase;

use crate::mock_hw::*;

const NEW: [(&str, &[u8]); 5] = [
    ("a.py", b"new-a\n"),
    ("b.py", b"new-b\n"),
    ("lib/c.py", b"new-c\n"),
    ("d.py", b"new-d\n"),
    ("e.py", b"new-e\n"),
];

/// Device on 3.0.0 with `NEW` staged for 3.1.0 and the pending flag set.
fn staged_device() -> FaultyFs {
    let cfg = test_config();
    let mut fs = FaultyFs::new(CAPACITY);
    fs.seed("version.txt", b"3.0.0");
    fs.seed("a.py", b"old-a\n");
    fs.seed("b.py", b"old-b\n");
    fs.seed("lib/c.py", b"old-c\n");
    fs.seed("d.py", b"old-d\n");
    fs.seed("e.py", b"old-e\n");
    fs.seed("config.json", b"{\"id\":7}");
    stage(&mut fs, &cfg, &manifest_for("3.1.0", &NEW), &NEW);
    fs.seed(&cfg.pending_flag, b"ready");
    fs
}

fn position(writes: &[String], path: &str) -> usize {
    writes.iter().position(|w| w == path).unwrap_or_else(|| panic!("{path} never written"))
}

#[test]
fn apply_backs_up_before_overwriting() {
    let (mut ota, _delay) = updater(test_config(), MockHttp::new(), staged_device());
    let mut sink = RecordingSink::default();

    assert!(ota.apply_update(&mut sink));

    let writes = ota.fs().writes();
    for (path, _) in NEW {
        assert!(position(writes, &format!("backup/{path}")) < position(writes, path));
    }
    assert!(position(writes, "backup/version.txt") < position(writes, "version.txt"));
    for (path, data) in NEW {
        assert_eq!(ota.fs().read(path).unwrap(), data);
    }
    assert_eq!(ota.local_version(), "3.1.0");
    assert_eq!(ota.boot_phase(), BootPhase::CommitPending);
    assert!(!ota.fs().exists("update"));
    assert_eq!(sink.count(|e| matches!(e, OtaEvent::FileApplied { .. })), NEW.len());
    assert!(sink.contains(&OtaEvent::Applied {
        version: "3.1.0".into()
    }));
}

#[test]
fn failure_mid_apply_restores_everything_touched() {
    let mut fs = staged_device();
    fs.fail_next_write_to("lib/c.py");
    let (mut ota, _delay) = updater(test_config(), MockHttp::new(), fs);
    let live_before = ota.fs().live_tree();
    let mut sink = RecordingSink::default();

    assert!(!ota.apply_update(&mut sink));

    // Files 1..3 were backed up and come back; 4..5 were never touched.
    assert_eq!(ota.fs().text("a.py"), "old-a\n");
    assert_eq!(ota.fs().text("b.py"), "old-b\n");
    assert_eq!(ota.fs().text("lib/c.py"), "old-c\n");
    assert!(!ota.fs().writes().iter().any(|w| w == "d.py" || w == "e.py"));
    assert_eq!(ota.fs().live_tree(), live_before);
    assert_eq!(ota.local_version(), "3.0.0");
    assert_eq!(ota.fs().text("config.json"), "{\"id\":7}");

    assert_eq!(ota.boot_phase(), BootPhase::Normal);
    assert!(!ota.fs().exists("update"));
    assert!(!ota.fs().exists("backup"));
    assert!(sink.contains(&OtaEvent::ApplyFailed(OtaError::Apply(FsError::Io))));
    assert!(sink.contains(&OtaEvent::RolledBack { restored: 3, failed: 0 }));
}

#[test]
fn corrupted_staging_is_caught_before_the_live_tree_is_touched() {
    let mut fs = staged_device();
    fs.seed("update/d.py", b"bit rot\n");
    let (mut ota, _delay) = updater(test_config(), MockHttp::new(), fs);
    let live_before = ota.fs().live_tree();
    let mut sink = RecordingSink::default();

    assert!(!ota.apply_update(&mut sink));
    assert!(ota.fs().writes().is_empty());
    assert_eq!(ota.fs().live_tree(), live_before);
    assert_eq!(ota.boot_phase(), BootPhase::Normal);
    assert!(sink.contains(&OtaEvent::ApplyFailed(OtaError::Integrity)));
    assert!(sink.contains(&OtaEvent::RolledBack { restored: 0, failed: 0 }));
}

#[test]
fn missing_staged_manifest_rolls_back() {
    let mut fs = staged_device();
    fs.remove_file("update/manifest.json").unwrap();
    let (mut ota, _delay) = updater(test_config(), MockHttp::new(), fs);
    let mut sink = RecordingSink::default();

    assert!(!ota.apply_update(&mut sink));
    assert!(sink.contains(&OtaEvent::ApplyFailed(OtaError::Storage(FsError::NotFound))));
    assert_eq!(ota.boot_phase(), BootPhase::Normal);
    assert_eq!(ota.local_version(), "3.0.0");
}

#[test]
fn existing_backup_from_an_interrupted_apply_is_kept() {
    // Power was lost after a.py was already replaced.
    let mut fs = staged_device();
    fs.seed("backup/a.py", b"old-a\n");
    fs.seed("a.py", b"new-a\n");
    let (mut ota, _delay) = updater(test_config(), MockHttp::new(), fs);
    let mut sink = RecordingSink::default();

    assert!(ota.apply_update(&mut sink));
    assert_eq!(ota.fs().text("backup/a.py"), "old-a\n");

    ota.rollback(&mut sink);
    assert_eq!(ota.fs().text("a.py"), "old-a\n");
    assert_eq!(ota.local_version(), "3.0.0");
    assert_eq!(ota.boot_phase(), BootPhase::Normal);
}

#[test]
fn excluded_paths_survive_apply_and_rollback() {
    let cfg = test_config();
    let files: [(&str, &[u8]); 2] = [("a.py", b"new-a\n"), ("config.json", b"{\"id\":0}")];
    let mut fs = FaultyFs::new(CAPACITY);
    fs.seed("version.txt", b"3.0.0");
    fs.seed("a.py", b"old-a\n");
    fs.seed("config.json", b"{\"id\":7}");
    stage(&mut fs, &cfg, &manifest_for("3.1.0", &files), &files);
    fs.seed(&cfg.pending_flag, b"ready");
    let (mut ota, _delay) = updater(cfg, MockHttp::new(), fs);
    let mut sink = RecordingSink::default();

    assert!(ota.apply_update(&mut sink));
    assert_eq!(ota.fs().text("config.json"), "{\"id\":7}");
    assert!(!ota.fs().exists("backup/config.json"));

    // Even a stray backup of an excluded path is never restored.
    ota.fs_mut().seed("backup/config.json", b"{\"id\":1}");
    ota.rollback(&mut sink);
    assert_eq!(ota.fs().text("config.json"), "{\"id\":7}");
    assert_eq!(ota.fs().text("a.py"), "old-a\n");
}

/// Device on 3.0.0 with only `main.py`; 3.1.0 adds a driver module.
fn device_gaining_a_file() -> FaultyFs {
    let cfg = test_config();
    let files: [(&str, &[u8]); 2] = [
        ("main.py", b"print(31)\n"),
        ("lib/new_driver.py", b"class Driver: pass\n"),
    ];
    let mut fs = FaultyFs::new(CAPACITY);
    fs.seed("version.txt", b"3.0.0");
    fs.seed("main.py", b"print(30)\n");
    stage(&mut fs, &cfg, &manifest_for("3.1.0", &files), &files);
    fs.seed(&cfg.pending_flag, b"ready");
    fs
}

#[test]
fn new_files_are_removed_by_rollback() {
    let (mut ota, _delay) = updater(test_config(), MockHttp::new(), device_gaining_a_file());
    let live_before = ota.fs().live_tree();
    let mut sink = RecordingSink::default();

    assert!(ota.apply_update(&mut sink));
    assert!(ota.fs().exists("lib/new_driver.py"));
    assert!(!ota.fs().exists("backup/lib/new_driver.py"));

    ota.rollback(&mut sink);
    assert!(!ota.fs().exists("lib/new_driver.py"));
    // The installed-manifest record was new too.
    assert!(!ota.fs().exists("manifest.json"));
    assert_eq!(ota.fs().live_tree(), live_before);
    assert!(!ota.fs().exists("backup"));
}

#[test]
fn failure_after_a_new_file_landed_removes_it() {
    let mut fs = device_gaining_a_file();
    fs.fail_next_write_to("version.txt");
    let (mut ota, _delay) = updater(test_config(), MockHttp::new(), fs);
    let live_before = ota.fs().live_tree();
    let mut sink = RecordingSink::default();

    assert!(!ota.apply_update(&mut sink));
    assert_eq!(ota.fs().live_tree(), live_before);
    // main.py and version.txt restored, the new driver removed.
    assert!(sink.contains(&OtaEvent::RolledBack { restored: 3, failed: 0 }));
}

#[test]
fn rerun_apply_does_not_back_up_its_own_new_file() {
    // Power was lost after the new driver was already copied into place.
    let mut fs = device_gaining_a_file();
    fs.seed("backup/.created", b"lib/new_driver.py\n");
    fs.seed("lib/new_driver.py", b"class Driver: pass\n");
    let (mut ota, _delay) = updater(test_config(), MockHttp::new(), fs);
    let mut sink = RecordingSink::default();

    assert!(ota.apply_update(&mut sink));
    assert!(!ota.fs().exists("backup/lib/new_driver.py"));

    ota.rollback(&mut sink);
    assert!(!ota.fs().exists("lib/new_driver.py"));
    assert_eq!(ota.fs().text("main.py"), "print(30)\n");
}

#[test]
fn failed_restore_keeps_backups_and_reports_it() {
    let mut fs = FaultyFs::new(CAPACITY);
    fs.seed("a.py", b"new-a\n");
    fs.seed("b.py", b"new-b\n");
    fs.seed("backup/a.py", b"old-a\n");
    fs.seed("backup/b.py", b"old-b\n");
    fs.seed("ota_commit_pending.flag", b"applied");
    fs.fail_next_write_to("b.py");
    let (mut ota, _delay) = updater(test_config(), MockHttp::new(), fs);
    let mut sink = RecordingSink::default();

    ota.rollback(&mut sink);
    assert_eq!(ota.fs().text("a.py"), "old-a\n");
    assert_eq!(ota.fs().text("b.py"), "new-b\n");
    assert!(ota.fs().exists("backup/b.py"));
    assert_eq!(ota.boot_phase(), BootPhase::Normal);
    assert!(sink.contains(&OtaEvent::RolledBack { restored: 1, failed: 1 }));
}
