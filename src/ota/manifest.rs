//! Typed update manifest.
//!
//! ```json
//! {"version": "1.2.0",
//!  "files": {"main.py": {"sha256": "<64 hex>", "size": 5120}, ...}}
//! ```
//!
//! Validation happens once, at the parse boundary: anything that gets past
//! [`Manifest::parse`] has a non-empty version, lowercase 64-hex hashes and
//! relative paths that stay inside the firmware tree.  File order is the
//! document order and is preserved through a serialise/parse cycle.

use core::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ManifestError;

/// Integrity metadata for one firmware file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileEntry {
    pub sha256: String,
    pub size: u64,
}

/// Ordered `path → FileEntry` table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileTable(Vec<(String, FileEntry)>);

impl FileTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&FileEntry> {
        self.0.iter().find(|(p, _)| p == path).map(|(_, e)| e)
    }

    /// Append an entry.  Returns `false` (and changes nothing) on a duplicate path.
    pub fn insert(&mut self, path: String, entry: FileEntry) -> bool {
        if self.get(&path).is_some() {
            return false;
        }
        self.0.push((path, entry));
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FileEntry)> {
        self.0.iter().map(|(p, e)| (p.as_str(), e))
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(p, _)| p.as_str())
    }
}

impl Serialize for FileTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (path, entry) in &self.0 {
            map.serialize_entry(path, entry)?;
        }
        map.end()
    }
}

struct FileTableVisitor;

impl<'de> Visitor<'de> for FileTableVisitor {
    type Value = FileTable;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of relative path to {sha256, size}")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<FileTable, A::Error> {
        // Duplicates are kept here and rejected by `Manifest::validate`.
        let mut table = FileTable(Vec::with_capacity(access.size_hint().unwrap_or(0)));
        while let Some((path, entry)) = access.next_entry::<String, FileEntry>()? {
            table.0.push((path, entry));
        }
        Ok(table)
    }
}

impl<'de> Deserialize<'de> for FileTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(FileTableVisitor)
    }
}

/// Server-provided description of one firmware release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    pub version: String,
    pub files: FileTable,
}

impl Manifest {
    /// Parse and validate a manifest document.  Any structural problem is a
    /// single [`ManifestError`]; no partial manifest is ever returned.
    pub fn parse(bytes: &[u8]) -> Result<Self, ManifestError> {
        let mut manifest: Manifest =
            serde_json::from_slice(bytes).map_err(|_| ManifestError::Malformed)?;
        manifest.validate()?;
        for (_, entry) in &mut manifest.files.0 {
            entry.sha256.make_ascii_lowercase();
        }
        Ok(manifest)
    }

    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.version.trim().is_empty() {
            return Err(ManifestError::MissingVersion);
        }
        for (i, (path, entry)) in self.files.0.iter().enumerate() {
            if self.files.0[..i].iter().any(|(p, _)| p == path) {
                return Err(ManifestError::DuplicatePath);
            }
            if !is_valid_relative_path(path) {
                return Err(ManifestError::InvalidPath);
            }
            if !is_sha256_hex(&entry.sha256) {
                return Err(ManifestError::InvalidHash);
            }
        }
        Ok(())
    }

    /// Pretty-printed JSON, in file order.
    pub fn to_json(&self) -> Vec<u8> {
        // Serialising plain strings and integers into a Vec cannot fail.
        serde_json::to_vec_pretty(self).unwrap_or_default()
    }

    /// Sum of every declared file size.
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|(_, e)| e.size).sum()
    }
}

fn is_sha256_hex(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// `/`-separated, relative, no empty / `.` / `..` components, no backslashes.
pub fn is_valid_relative_path(path: &str) -> bool {
    !path.is_empty()
        && !path.contains('\\')
        && path
            .split('/')
            .all(|part| !part.is_empty() && part != "." && part != "..")
}
