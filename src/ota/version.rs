//! Local version record: a plain-text file holding the installed version.

use crate::app::ports::FlashFs;
use crate::error::FsError;

/// Reported when no version record exists (factory image).
pub const UNKNOWN_VERSION: &str = "0.0.0";

/// Installed version, trimmed.  Missing or unreadable → [`UNKNOWN_VERSION`].
pub fn read_local_version<F: FlashFs>(fs: &F, path: &str) -> String {
    match fs.read(path) {
        Ok(bytes) => {
            let v = String::from_utf8_lossy(&bytes).trim().to_string();
            if v.is_empty() { UNKNOWN_VERSION.to_string() } else { v }
        }
        Err(_) => UNKNOWN_VERSION.to_string(),
    }
}

pub fn write_local_version<F: FlashFs>(fs: &mut F, path: &str, version: &str) -> Result<(), FsError> {
    fs.write(path, version.trim().as_bytes())
}

/// Which `MAJOR.MINOR.PATCH` component to increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "tools", derive(clap::ValueEnum))]
pub enum Bump {
    Major,
    Minor,
    Patch,
}

/// Increment a `MAJOR.MINOR.PATCH` string.  `None` if it is not three integers.
pub fn bump_version(current: &str, bump: Bump) -> Option<String> {
    let mut parts = current.trim().split('.').map(str::parse::<u32>);
    let (Some(Ok(major)), Some(Ok(minor)), Some(Ok(patch)), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return None;
    };
    Some(match bump {
        Bump::Major => format!("{}.0.0", major + 1),
        Bump::Minor => format!("{}.{}.0", major, minor + 1),
        Bump::Patch => format!("{}.{}.{}", major, minor, patch + 1),
    })
}
