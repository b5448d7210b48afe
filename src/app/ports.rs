//! Port traits: the hexagonal boundary between the update engine and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ OtaUpdater (domain)
//! ```
//!
//! Driven adapters (HTTP client, flash filesystem, system services, timers,
//! network link, event sinks) implement these traits.  The
//! [`OtaUpdater`](crate::ota::OtaUpdater) consumes them via generics, so the
//! domain core never touches ESP-IDF directly.
//!
//! ## Cooperative scheduling
//!
//! [`HttpClient::get`] and [`Delay::sleep`] are the only suspension points
//! the engine has.  Everything else (filesystem, heap queries) completes
//! synchronously.  Adapters backed by a blocking client must move the
//! request off the executor thread (the device HTTP client uses a worker
//! thread) or the other tasks stall for the whole request.
//!
//! ## Paths
//!
//! Filesystem paths are `/`-separated and relative to the firmware root,
//! e.g. `"lib/ota.py"` or `"update/lib/ota.py"`.  The empty string names the
//! root itself.

#![allow(async_fn_in_trait)]

use core::time::Duration;
use std::io::Read;

use crate::error::{FsError, TransportError};

// ───────────────────────────────────────────────────────────────
// HTTP port (driven adapter: domain → update server)
// ───────────────────────────────────────────────────────────────

/// A fully-read HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

/// Plain HTTP GET, no authentication.
pub trait HttpClient {
    /// Fetch `url` and return the whole body.
    async fn get(&mut self, url: &str) -> Result<HttpResponse, TransportError>;
}

// ───────────────────────────────────────────────────────────────
// Flash filesystem port (driven adapter: domain ↔ on-board flash)
// ───────────────────────────────────────────────────────────────

/// Total / free bytes of the filesystem holding the firmware tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashUsage {
    pub total: u64,
    pub free: u64,
}

impl FlashUsage {
    pub fn used(&self) -> u64 {
        self.total.saturating_sub(self.free)
    }
}

/// The root filesystem the firmware runs from.
///
/// Implementations MUST make [`write`](Self::write) replace the whole file;
/// partial appends are never used by the engine.
pub trait FlashFs {
    /// Streaming reader returned by [`open`](Self::open).
    type Reader: Read;

    /// Open a file for sequential reading.
    fn open(&self, path: &str) -> Result<Self::Reader, FsError>;

    /// Create or truncate `path` and write `data`.
    fn write(&mut self, path: &str, data: &[u8]) -> Result<(), FsError>;

    /// Whether a file or directory exists at `path`.
    fn exists(&self, path: &str) -> bool;

    /// Create a single directory.  An existing directory is success; a
    /// missing parent or any other failure is an error.
    fn ensure_dir(&mut self, path: &str) -> Result<(), FsError>;

    /// Delete a file.
    fn remove_file(&mut self, path: &str) -> Result<(), FsError>;

    /// Delete a directory and everything below it.
    fn remove_dir_all(&mut self, path: &str) -> Result<(), FsError>;

    /// Atomically rename `from` to `to`.
    fn rename(&mut self, from: &str, to: &str) -> Result<(), FsError>;

    /// Every regular file below `dir`, as paths relative to `dir`.
    fn list_files(&self, dir: &str) -> Result<Vec<String>, FsError>;

    /// Capacity of the filesystem.
    fn usage(&self) -> Result<FlashUsage, FsError>;

    /// Read a whole file into memory.
    fn read(&self, path: &str) -> Result<Vec<u8>, FsError> {
        let mut buf = Vec::new();
        self.open(path)?.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Copy `from` over `to`, replacing it.
    fn copy(&mut self, from: &str, to: &str) -> Result<(), FsError> {
        let data = self.read(from)?;
        self.write(to, &data)
    }

    /// Create every missing directory along `path`.
    fn create_dir_all(&mut self, path: &str) -> Result<(), FsError> {
        let path = path.trim_end_matches('/');
        for (i, _) in path.match_indices('/') {
            if i > 0 {
                self.ensure_dir(&path[..i])?;
            }
        }
        if path.is_empty() {
            return Ok(());
        }
        self.ensure_dir(path)
    }
}

// ───────────────────────────────────────────────────────────────
// System port (driven adapter: domain → SoC services)
// ───────────────────────────────────────────────────────────────

/// Heap statistics and the reset line.
pub trait SystemPort {
    /// Free heap right now (bytes), after any collection the platform offers.
    fn free_heap_bytes(&self) -> u64;

    /// Soft-reset the device.  On hardware this never returns.
    fn reboot(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Timer port
// ───────────────────────────────────────────────────────────────

/// Timed waits.  Implementations MUST yield to the executor, never spin.
pub trait Delay {
    async fn sleep(&self, duration: Duration);
}

// ───────────────────────────────────────────────────────────────
// Network link port (driven adapter: connectivity manager → domain)
// ───────────────────────────────────────────────────────────────

/// Narrow view of the connectivity manager: is the uplink usable right now.
pub trait LinkPort {
    fn is_connected(&self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / status LED)
// ───────────────────────────────────────────────────────────────

/// The engine emits structured [`OtaEvent`](super::events::OtaEvent)s
/// through this port.  Adapters decide where they go (serial log, status
/// LED, telemetry uplink, etc.).
pub trait EventSink {
    fn emit(&mut self, event: &super::events::OtaEvent);
}

/// Fan one event out to two sinks.
impl<A: EventSink, B: EventSink> EventSink for (A, B) {
    fn emit(&mut self, event: &super::events::OtaEvent) {
        self.0.emit(event);
        self.1.emit(event);
    }
}
