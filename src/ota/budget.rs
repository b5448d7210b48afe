//! Resource budgeter.
//!
//! A download is allowed only when the heap is above a floor and the flash
//! can hold a staged copy and a backup copy of every manifest file, plus a
//! fixed buffer for filesystem metadata.  Failing either check defers the
//! update to the next cycle.

use log::{info, warn};

use super::OtaUpdater;
use crate::app::ports::{Delay, FlashFs, HttpClient, SystemPort};
use crate::error::ResourceError;

/// Staged copy + backup copy.
pub const FLASH_MULTIPLIER: u64 = 2;

/// `free >= required + buffer`, saturating.
pub fn has_flash_headroom(required: u64, free: u64, buffer: u64) -> bool {
    free >= required.saturating_add(buffer)
}

impl<H, F, S, D> OtaUpdater<H, F, S, D>
where
    H: HttpClient,
    F: FlashFs,
    S: SystemPort,
    D: Delay,
{
    pub fn has_enough_memory(&self) -> bool {
        self.system.free_heap_bytes() >= self.config.min_free_heap_bytes
    }

    /// Twice the manifest's total size; `0` without a session.
    pub fn get_required_flash_bytes(&self) -> u64 {
        self.session
            .as_ref()
            .map_or(0, |s| s.manifest().total_size().saturating_mul(FLASH_MULTIPLIER))
    }

    /// Free bytes on the firmware filesystem; `0` if it cannot be queried.
    pub fn get_free_flash_bytes(&self) -> u64 {
        match self.fs.usage() {
            Ok(u) => u.free,
            Err(e) => {
                warn!("OTA: flash usage query failed: {}", e);
                0
            }
        }
    }

    /// Both checks, memory first.
    pub fn check_resources(&self) -> Result<(), ResourceError> {
        let heap = self.system.free_heap_bytes();
        if heap < self.config.min_free_heap_bytes {
            return Err(ResourceError::LowMemory {
                free: heap,
                floor: self.config.min_free_heap_bytes,
            });
        }

        let required = self.get_required_flash_bytes();
        let free = self.get_free_flash_bytes();
        if !has_flash_headroom(required, free, self.config.flash_buffer_bytes) {
            return Err(ResourceError::LowFlash {
                free,
                needed: required.saturating_add(self.config.flash_buffer_bytes),
            });
        }

        info!("OTA: resources ok (heap {} B, flash {} B free, {} B required)", heap, free, required);
        Ok(())
    }
}
