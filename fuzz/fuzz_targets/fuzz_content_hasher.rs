//! Fuzz target: `ContentHasher` chunk splitting
//!
//! The first byte picks a chunk size; the rest is file content.  Streaming
//! the content in that chunk size must give the same digest as hashing it
//! in one piece, with and without CRLF normalisation.
//!
//! cargo fuzz run fuzz_content_hasher

#![no_main]

use libfuzzer_sys::fuzz_target;
use sensornode::ota::digest::{ContentHasher, hash_bytes};

const TEXT_EXTS: [&str; 1] = [".py"];

fuzz_target!(|data: &[u8]| {
    let Some((&size, content)) = data.split_first() else {
        return;
    };
    let chunk = usize::from(size).max(1);

    for (path, normalize) in [("a.py", true), ("a.bin", false)] {
        let mut hasher = ContentHasher::new(normalize);
        for piece in content.chunks(chunk) {
            hasher.update(piece);
        }
        assert_eq!(hasher.finalize(), hash_bytes(path, content, &TEXT_EXTS));
    }
});
