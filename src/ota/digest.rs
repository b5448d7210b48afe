//! Content verifier.
//!
//! SHA-256 over file content, with one transformation: for files whose name
//! ends in a text extension every `CR LF` pair is hashed as a single `LF`.
//! The manifest generator applies the same rule, so a file checked out with
//! Windows line endings and the same file on the device hash identically.
//! Binary files are hashed byte for byte.
//!
//! Normalisation is streaming: a `CR` at the end of one chunk is held back
//! until the next chunk shows whether an `LF` follows.

use std::io::Read;

use hmac_sha256::Hash;

use crate::app::ports::FlashFs;
use crate::error::FsError;

/// Read size used when hashing files from flash.
pub const CHUNK_SIZE: usize = 1024;

/// Whether `path` names a text file under the given extension list.
pub fn is_text_path<S: AsRef<str>>(path: &str, text_extensions: &[S]) -> bool {
    text_extensions.iter().any(|ext| path.ends_with(ext.as_ref()))
}

/// Replace every `CR LF` pair with `LF`.  Lone `CR`s are kept.
pub fn normalize_line_endings(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut iter = data.iter().copied().peekable();
    while let Some(b) = iter.next() {
        if b == b'\r' && iter.peek() == Some(&b'\n') {
            continue;
        }
        out.push(b);
    }
    out
}

/// Incremental SHA-256 with optional CRLF normalisation.
pub struct ContentHasher {
    hash: Hash,
    normalize: bool,
    pending_cr: bool,
    scratch: Vec<u8>,
}

impl ContentHasher {
    pub fn new(normalize: bool) -> Self {
        Self {
            hash: Hash::new(),
            normalize,
            pending_cr: false,
            scratch: Vec::new(),
        }
    }

    pub fn update(&mut self, chunk: &[u8]) {
        if !self.normalize {
            self.hash.update(chunk);
            return;
        }
        self.scratch.clear();
        for &b in chunk {
            if self.pending_cr {
                self.pending_cr = false;
                if b != b'\n' {
                    self.scratch.push(b'\r');
                }
            }
            if b == b'\r' {
                self.pending_cr = true;
            } else {
                self.scratch.push(b);
            }
        }
        self.hash.update(&self.scratch);
    }

    /// Lowercase hex digest.
    pub fn finalize(mut self) -> String {
        if self.pending_cr {
            self.hash.update(b"\r");
        }
        to_hex(&self.hash.finalize())
    }
}

/// Hash an in-memory buffer under the rule for `path`.
pub fn hash_bytes<S: AsRef<str>>(path: &str, data: &[u8], text_extensions: &[S]) -> String {
    let mut hasher = ContentHasher::new(is_text_path(path, text_extensions));
    hasher.update(data);
    hasher.finalize()
}

/// Hash a file on flash in [`CHUNK_SIZE`] reads.
///
/// `rule_path` selects the normalisation rule (the manifest path), which may
/// differ from `path` when hashing a copy kept under another name.
pub fn hash_of<F: FlashFs, S: AsRef<str>>(
    fs: &F,
    path: &str,
    rule_path: &str,
    text_extensions: &[S],
) -> Result<String, FsError> {
    hash_file(fs, path, is_text_path(rule_path, text_extensions))
}

/// Hash a file on flash exactly as stored.
///
/// Staged copies of text files were normalised when written; hashing them
/// through the text rule again would fold `CR CR LF` a second time.
pub fn hash_raw<F: FlashFs>(fs: &F, path: &str) -> Result<String, FsError> {
    hash_file(fs, path, false)
}

fn hash_file<F: FlashFs>(fs: &F, path: &str, normalize: bool) -> Result<String, FsError> {
    let mut reader = fs.open(path)?;
    let mut hasher = ContentHasher::new(normalize);
    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize())
}

fn to_hex(bytes: &[u8]) -> String {
    const DIGITS: &[u8; 16] = b"0123456789abcdef";
    let mut s = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        s.push(DIGITS[(b >> 4) as usize] as char);
        s.push(DIGITS[(b & 0x0f) as usize] as char);
    }
    s
}
