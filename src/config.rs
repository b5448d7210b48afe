//! Update engine configuration parameters
//!
//! All tunable parameters for the OTA engine. Defaults match the deployed
//! firmware; the optional `"ota"` object of the device's JSON runtime config
//! overrides individual fields.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Core update-engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OtaConfig {
    // --- Server ---
    /// Base URL the manifest and every firmware file are fetched from
    pub repo_url: String,
    /// Manifest document name, relative to `repo_url`
    pub manifest_name: String,
    /// Manifest fetch attempts per check
    pub manifest_attempts: u8,
    /// Delay between failed manifest attempts (milliseconds)
    pub manifest_retry_delay_ms: u32,
    /// Per-request HTTP timeout (milliseconds)
    pub http_timeout_ms: u32,

    // --- Filesystem layout (relative to the firmware root) ---
    /// Plain-text local version record
    pub version_file: String,
    /// Staging area for a downloaded candidate update
    pub staging_dir: String,
    /// Backup root mirroring overwritten live files
    pub backup_dir: String,
    /// Flag: update staged, apply on next boot
    pub pending_flag: String,
    /// Flag: update applied, awaiting commit verification
    pub commit_pending_flag: String,
    /// Where the manifest of the installed firmware is recorded
    pub installed_manifest: String,
    /// Device-local paths never downloaded over, backed up or rolled back
    pub excluded: Vec<String>,
    /// Extensions whose CRLF pairs are normalised before hashing
    pub text_extensions: Vec<String>,

    // --- Resource budget ---
    /// Minimum free heap required to start a download (bytes)
    pub min_free_heap_bytes: u64,
    /// Flash kept free on top of the staged + backup copies (bytes)
    pub flash_buffer_bytes: u64,

    // --- Timing ---
    /// Commit verification attempts after an applied update
    pub commit_attempts: u8,
    /// Spacing between commit verification attempts (milliseconds)
    pub commit_retry_delay_ms: u32,
    /// Period of the background update check (seconds)
    pub check_interval_secs: u32,
    /// How long a check cycle waits for connectivity before skipping (seconds)
    pub connect_timeout_secs: u32,
    /// Countdown logged before rebooting into a staged update (seconds)
    pub reboot_countdown_secs: u8,
    /// Download progress log period (milliseconds)
    pub progress_report_ms: u32,
}

impl Default for OtaConfig {
    fn default() -> Self {
        Self {
            // Server
            repo_url: "https://raw.githubusercontent.com/liftronix/eleECG/refs/heads/main".into(),
            manifest_name: "manifest.json".into(),
            manifest_attempts: 3,
            manifest_retry_delay_ms: 1000,
            http_timeout_ms: 5000,

            // Layout
            version_file: "version.txt".into(),
            staging_dir: "update".into(),
            backup_dir: "backup".into(),
            pending_flag: "ota_pending.flag".into(),
            commit_pending_flag: "ota_commit_pending.flag".into(),
            installed_manifest: "manifest.json".into(),
            excluded: vec!["config.json".into(), "output_info.txt".into()],
            text_extensions: vec![".py".into(), ".txt".into(), ".json".into(), ".md".into()],

            // Budget
            min_free_heap_bytes: 100 * 1024,
            flash_buffer_bytes: 16 * 1024,

            // Timing
            commit_attempts: 12,
            commit_retry_delay_ms: 5000,
            check_interval_secs: 60,
            connect_timeout_secs: 30,
            reboot_countdown_secs: 10,
            progress_report_ms: 400,
        }
    }
}

/// Shape of the device runtime config; only the `ota` section is ours.
#[derive(Deserialize)]
struct DeviceConfig {
    #[serde(default)]
    ota: OtaConfig,
}

impl OtaConfig {
    /// URL of the manifest document.
    pub fn manifest_url(&self) -> String {
        format!("{}/{}", self.repo_url.trim_end_matches('/'), self.manifest_name)
    }

    /// URL of one firmware file.
    pub fn file_url(&self, path: &str) -> String {
        format!("{}/{}", self.repo_url.trim_end_matches('/'), path)
    }

    /// Whether `path` is device-local state rather than firmware.
    pub fn is_excluded(&self, path: &str) -> bool {
        self.excluded.iter().any(|p| p == path)
    }

    /// Extract and validate the `"ota"` section of the device runtime config.
    pub fn from_device_config(bytes: &[u8]) -> Result<Self, ConfigError> {
        let doc: DeviceConfig = serde_json::from_slice(bytes).map_err(|_| ConfigError::Corrupted)?;
        doc.ota.validate()?;
        Ok(doc.ota)
    }

    /// Range-check every field. Invalid values are rejected, never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.repo_url.starts_with("http://") || self.repo_url.starts_with("https://")) {
            return Err(ConfigError::ValidationFailed(
                "repo_url must be an http:// or https:// URL",
            ));
        }
        if self.manifest_name.is_empty() {
            return Err(ConfigError::ValidationFailed("manifest_name must not be empty"));
        }
        if !(1..=10).contains(&self.manifest_attempts) {
            return Err(ConfigError::ValidationFailed("manifest_attempts must be 1–10"));
        }
        if !(1000..=60_000).contains(&self.http_timeout_ms) {
            return Err(ConfigError::ValidationFailed("http_timeout_ms must be 1000–60000"));
        }
        let layout = [
            &self.version_file,
            &self.staging_dir,
            &self.backup_dir,
            &self.pending_flag,
            &self.commit_pending_flag,
            &self.installed_manifest,
        ];
        if layout.iter().any(|p| p.is_empty() || p.starts_with('/')) {
            return Err(ConfigError::ValidationFailed(
                "layout paths must be non-empty and relative to the firmware root",
            ));
        }
        if self.staging_dir == self.backup_dir || self.pending_flag == self.commit_pending_flag {
            return Err(ConfigError::ValidationFailed(
                "staging/backup dirs and the two flags must be distinct paths",
            ));
        }
        if !(1..=60).contains(&self.commit_attempts) {
            return Err(ConfigError::ValidationFailed("commit_attempts must be 1–60"));
        }
        if !(100..=60_000).contains(&self.commit_retry_delay_ms) {
            return Err(ConfigError::ValidationFailed(
                "commit_retry_delay_ms must be 100–60000",
            ));
        }
        if !(10..=86_400).contains(&self.check_interval_secs) {
            return Err(ConfigError::ValidationFailed("check_interval_secs must be 10–86400"));
        }
        if self.connect_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed("connect_timeout_secs must be > 0"));
        }
        if self.progress_report_ms == 0 {
            return Err(ConfigError::ValidationFailed("progress_report_ms must be > 0"));
        }
        Ok(())
    }
}
