//! Unified error types for the update engine.
//!
//! A single [`OtaError`] enum that every update phase converts into, keeping
//! the boot sequencer's and scheduler's error handling uniform.  All variants
//! are `Copy` so they can be logged, emitted as events and compared in tests
//! without allocation.  Context such as the offending path is logged at the
//! failure site rather than carried in the error.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level update error
// ---------------------------------------------------------------------------

/// Every fallible update step funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtaError {
    /// Transport failure or timeout talking to the update server.
    Network(NetworkError),
    /// The manifest document is malformed or incomplete.
    Manifest(ManifestError),
    /// A downloaded or staged file does not match its manifest hash.
    Integrity,
    /// Not enough working memory or flash to run the update.
    Resource(ResourceError),
    /// Copying a file into the live tree failed.
    Apply(FsError),
    /// The remote version could not be confirmed within the attempt budget.
    CommitTimeout { attempts: u8 },
    /// A filesystem operation outside the apply copy step failed.
    Storage(FsError),
}

impl fmt::Display for OtaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(e) => write!(f, "network: {e}"),
            Self::Manifest(e) => write!(f, "manifest: {e}"),
            Self::Integrity => write!(f, "integrity: content hash mismatch"),
            Self::Resource(e) => write!(f, "resource: {e}"),
            Self::Apply(e) => write!(f, "apply: {e}"),
            Self::CommitTimeout { attempts } => {
                write!(f, "commit: version not confirmed after {attempts} attempts")
            }
            Self::Storage(e) => write!(f, "storage: {e}"),
        }
    }
}

impl std::error::Error for OtaError {}

// ---------------------------------------------------------------------------
// Network errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkError {
    /// The request could not be completed at the transport level.
    Transport(TransportError),
    /// The server answered with a non-success status code.
    HttpStatus(u16),
    /// Every retry attempt failed at the transport level.
    RetriesExhausted,
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "{e}"),
            Self::HttpStatus(code) => write!(f, "HTTP status {code}"),
            Self::RetriesExhausted => write!(f, "all attempts failed"),
        }
    }
}

impl From<NetworkError> for OtaError {
    fn from(e: NetworkError) -> Self {
        Self::Network(e)
    }
}

/// Low-level failures reported by an [`HttpClient`](crate::app::ports::HttpClient).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// No network link is available.
    NoLink,
    /// Connecting to the server failed.
    ConnectFailed,
    /// The request or response timed out.
    Timeout,
    /// Reading the response body failed part-way.
    ReadFailed,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoLink => write!(f, "no network link"),
            Self::ConnectFailed => write!(f, "connect failed"),
            Self::Timeout => write!(f, "timed out"),
            Self::ReadFailed => write!(f, "response read failed"),
        }
    }
}

impl From<TransportError> for OtaError {
    fn from(e: TransportError) -> Self {
        Self::Network(NetworkError::Transport(e))
    }
}

// ---------------------------------------------------------------------------
// Manifest errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestError {
    /// The document is not valid JSON or has unexpected/missing fields.
    Malformed,
    /// `version` is missing or empty.
    MissingVersion,
    /// A `sha256` value is not 64 hexadecimal characters.
    InvalidHash,
    /// A file path is absolute, empty, or escapes the firmware tree.
    InvalidPath,
    /// The same path appears twice in `files`.
    DuplicatePath,
}

impl fmt::Display for ManifestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => write!(f, "malformed document"),
            Self::MissingVersion => write!(f, "version missing or empty"),
            Self::InvalidHash => write!(f, "sha256 must be 64 hex characters"),
            Self::InvalidPath => write!(f, "file path must be relative and stay inside the tree"),
            Self::DuplicatePath => write!(f, "duplicate file path"),
        }
    }
}

impl From<ManifestError> for OtaError {
    fn from(e: ManifestError) -> Self {
        Self::Manifest(e)
    }
}

// ---------------------------------------------------------------------------
// Resource errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceError {
    /// Free heap is below the configured floor.
    LowMemory { free: u64, floor: u64 },
    /// Free flash cannot hold the staged and backup copies plus the buffer.
    LowFlash { free: u64, needed: u64 },
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LowMemory { free, floor } => {
                write!(f, "free heap {free} B below floor {floor} B")
            }
            Self::LowFlash { free, needed } => {
                write!(f, "free flash {free} B, need {needed} B")
            }
        }
    }
}

impl From<ResourceError> for OtaError {
    fn from(e: ResourceError) -> Self {
        Self::Resource(e)
    }
}

// ---------------------------------------------------------------------------
// Filesystem errors
// ---------------------------------------------------------------------------

/// Errors from [`FlashFs`](crate::app::ports::FlashFs) operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    NotFound,
    AlreadyExists,
    PermissionDenied,
    StorageFull,
    /// Any other I/O failure.
    Io,
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found"),
            Self::AlreadyExists => write!(f, "already exists"),
            Self::PermissionDenied => write!(f, "permission denied"),
            Self::StorageFull => write!(f, "storage full"),
            Self::Io => write!(f, "I/O error"),
        }
    }
}

impl From<std::io::Error> for FsError {
    fn from(e: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match e.kind() {
            ErrorKind::NotFound => Self::NotFound,
            ErrorKind::AlreadyExists => Self::AlreadyExists,
            ErrorKind::PermissionDenied => Self::PermissionDenied,
            ErrorKind::StorageFull => Self::StorageFull,
            _ => Self::Io,
        }
    }
}

impl From<FsError> for OtaError {
    fn from(e: FsError) -> Self {
        Self::Storage(e)
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// The config document could not be parsed.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Engine-wide `Result` alias.
pub type Result<T> = core::result::Result<T, OtaError>;
