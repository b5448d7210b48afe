//! Fuzz target: `Manifest::parse`
//!
//! Drives arbitrary bytes into the manifest parser and asserts that it
//! never panics, and that anything it accepts is valid and survives the
//! staged-copy round trip unchanged.
//!
//! cargo fuzz run fuzz_manifest_parse

#![no_main]

use libfuzzer_sys::fuzz_target;
use sensornode::ota::manifest::{Manifest, is_valid_relative_path};

fuzz_target!(|data: &[u8]| {
    let Ok(manifest) = Manifest::parse(data) else {
        return;
    };

    assert!(!manifest.version.trim().is_empty(), "accepted an empty version");
    for (path, entry) in manifest.files.iter() {
        assert!(is_valid_relative_path(path), "accepted unsafe path {path:?}");
        assert_eq!(entry.sha256.len(), 64);
    }

    let again = Manifest::parse(&manifest.to_json()).expect("staged copy must parse");
    assert_eq!(again, manifest);
});
