//! Release packager: produces the `manifest.json` / `version.txt` pair the
//! update server publishes.
//!
//! Runs on the build host over a checked-out firmware tree.  Hashes use the
//! same line-ending rule as the device, so a manifest generated from a
//! CRLF checkout still verifies against the LF files the device stores.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use log::info;

use crate::ota::digest::hash_bytes;
use crate::ota::manifest::{FileEntry, FileTable, Manifest};
use crate::ota::version::{Bump, UNKNOWN_VERSION, bump_version};

pub const VERSION_FILE: &str = "version.txt";
pub const MANIFEST_FILE: &str = "manifest.json";

/// Never packaged: the manifest itself, release tooling, VCS and caches.
const SKIPPED: &[&str] = &[MANIFEST_FILE, "generate_manifest.py", "mkmanifest", ".git", "__pycache__"];

fn is_skipped(name: &str) -> bool {
    SKIPPED.contains(&name) || name.starts_with('_') || name.starts_with('.')
}

/// A freshly written release.
#[derive(Debug)]
pub struct Release {
    pub previous_version: String,
    pub manifest: Manifest,
}

/// Bump `version.txt`, then hash the tree and write `manifest.json`.
///
/// The version record is rewritten before the scan so it is part of the
/// manifest and rolls back with the rest of the firmware.
pub fn build_release<S: AsRef<str>>(root: &Path, bump: Bump, text_extensions: &[S]) -> Result<Release> {
    let version_path = root.join(VERSION_FILE);
    let previous_version = match fs::read_to_string(&version_path) {
        Ok(s) => s.trim().to_string(),
        Err(e) if e.kind() == ErrorKind::NotFound => UNKNOWN_VERSION.to_string(),
        Err(e) => return Err(e).with_context(|| format!("reading {}", version_path.display())),
    };
    let version = bump_version(&previous_version, bump)
        .ok_or_else(|| anyhow!("{VERSION_FILE} holds {previous_version:?}, expected MAJOR.MINOR.PATCH"))?;
    fs::write(&version_path, &version).with_context(|| format!("writing {}", version_path.display()))?;
    info!("version {} -> {}", previous_version, version);

    let files = collect_files(root, text_extensions)?;
    if files.is_empty() {
        bail!("no files to package under {}", root.display());
    }

    let manifest = Manifest { version, files };
    manifest
        .validate()
        .map_err(|e| anyhow!("generated manifest is invalid: {e}"))?;
    let manifest_path = root.join(MANIFEST_FILE);
    fs::write(&manifest_path, manifest.to_json()).with_context(|| format!("writing {}", manifest_path.display()))?;
    info!("wrote {} with {} files", manifest_path.display(), manifest.files.len());

    Ok(Release {
        previous_version,
        manifest,
    })
}

/// Hash every packaged file below `root`, sorted by relative path.
pub fn collect_files<S: AsRef<str>>(root: &Path, text_extensions: &[S]) -> Result<FileTable> {
    let mut paths = Vec::new();
    walk(root, root, &mut paths)?;
    paths.sort();

    let mut table = FileTable::new();
    for rel in paths {
        let full = root.join(&rel);
        let data = fs::read(&full).with_context(|| format!("reading {}", full.display()))?;
        let entry = FileEntry {
            sha256: hash_bytes(&rel, &data, text_extensions),
            size: data.len() as u64,
        };
        table.insert(rel, entry);
    }
    Ok(table)
}

fn walk(root: &Path, dir: &Path, out: &mut Vec<String>) -> Result<()> {
    for entry in fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            bail!("non UTF-8 file name under {}", dir.display());
        };
        if is_skipped(name) {
            continue;
        }
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            walk(root, &path, out)?;
        } else if file_type.is_file() {
            let rel = path.strip_prefix(root)?;
            out.push(rel.to_string_lossy().replace('\\', "/"));
        }
    }
    Ok(())
}
