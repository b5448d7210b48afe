//! Over-the-air update engine.
//!
//! ```text
//!  periodic task                 boot N+1                 boot N+2
//!  ─────────────                 ────────                 ────────
//!  check_for_update              pending flag?            commit-pending flag?
//!    │ (manifest fetch)            │                        │
//!  resource budget                apply_update             verify_ota_commit
//!    │                             │ backup → copy           │ 12 × remote version
//!  download_update                 │ version record          │
//!    │ staging + hash             pending → commit-pending   ├─ match → clear flag
//!  pending flag, reboot ────────▶ reboot ─────────────────▶  └─ no match → rollback
//! ```
//!
//! The engine is split by phase: [`fetch`], [`budget`], [`download`],
//! [`apply`] and [`commit`] each add methods to [`OtaUpdater`].  Only the
//! flag files in [`flags`] survive a reboot.

pub mod apply;
pub mod budget;
pub mod commit;
pub mod digest;
pub mod download;
pub mod fetch;
pub mod flags;
pub mod manifest;
pub mod session;
pub mod version;

use crate::app::ports::{Delay, FlashFs, HttpClient, SystemPort};
use crate::config::OtaConfig;
use crate::error::FsError;

use flags::{BootPhase, FlagStore};
use session::{Progress, UpdateSession};

/// Name of the manifest copy kept inside the staging directory.
pub const STAGED_MANIFEST: &str = "manifest.json";

/// The update engine.  Owns its ports; one instance drives one phase at a
/// time, so no internal locking is needed.
pub struct OtaUpdater<H, F, S, D> {
    config: OtaConfig,
    http: H,
    fs: F,
    system: S,
    delay: D,
    session: Option<UpdateSession>,
    progress: Progress,
}

impl<H, F, S, D> OtaUpdater<H, F, S, D>
where
    H: HttpClient,
    F: FlashFs,
    S: SystemPort,
    D: Delay,
{
    pub fn new(config: OtaConfig, http: H, fs: F, system: S, delay: D) -> Self {
        Self {
            config,
            http,
            fs,
            system,
            delay,
            session: None,
            progress: Progress::new(),
        }
    }

    pub fn config(&self) -> &OtaConfig {
        &self.config
    }

    /// The session created by the last successful "update available" check.
    pub fn session(&self) -> Option<&UpdateSession> {
        self.session.as_ref()
    }

    /// Shared handle for UI / log tasks.
    pub fn progress(&self) -> Progress {
        self.progress.clone()
    }

    pub fn get_progress(&self) -> u8 {
        self.progress.percent()
    }

    pub fn get_status(&self) -> String {
        self.progress.status()
    }

    /// Installed version from the local record.
    pub fn local_version(&self) -> String {
        version::read_local_version(&self.fs, &self.config.version_file)
    }

    /// What the flag files say this boot must do.
    pub fn boot_phase(&mut self) -> BootPhase {
        self.flags().phase()
    }

    /// Whether any update phase is still unresolved on flash.
    pub fn update_in_flight(&mut self) -> bool {
        self.boot_phase() != BootPhase::Normal
    }

    /// Record that a fully staged update must be applied on next boot.
    pub fn mark_pending(&mut self) -> Result<(), FsError> {
        self.flags().set_pending()
    }

    pub fn fs(&self) -> &F {
        &self.fs
    }

    pub fn fs_mut(&mut self) -> &mut F {
        &mut self.fs
    }

    pub fn http(&self) -> &H {
        &self.http
    }

    pub fn http_mut(&mut self) -> &mut H {
        &mut self.http
    }

    pub fn system(&self) -> &S {
        &self.system
    }

    pub fn system_mut(&mut self) -> &mut S {
        &mut self.system
    }

    pub fn delay(&self) -> &D {
        &self.delay
    }

    /// Give the ports back, e.g. to rebuild the engine after a reset.
    pub fn into_ports(self) -> (H, F, S, D) {
        (self.http, self.fs, self.system, self.delay)
    }

    fn flags(&mut self) -> FlagStore<'_, F> {
        FlagStore::new(&mut self.fs, &self.config)
    }

    fn staged_path(&self, rel: &str) -> String {
        join(&self.config.staging_dir, rel)
    }

    fn backup_path(&self, rel: &str) -> String {
        join(&self.config.backup_dir, rel)
    }
}

/// `dir/rel`, tolerating an empty `dir` (the firmware root).
pub fn join(dir: &str, rel: &str) -> String {
    let dir = dir.trim_end_matches('/');
    if dir.is_empty() {
        rel.to_string()
    } else {
        format!("{dir}/{rel}")
    }
}

/// Directory part of a relative path, `""` for top-level files.
pub fn parent_dir(path: &str) -> &str {
    path.rfind('/').map_or("", |i| &path[..i])
}
