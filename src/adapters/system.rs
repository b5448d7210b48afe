//! SoC services adapter: heap statistics and soft reset.
//!
//! - **`target_os = "espidf"`**: `esp_get_free_heap_size()` / `esp_restart()`.
//! - **all other targets**: a simulated heap figure and a reboot counter.

use log::warn;

use crate::app::ports::SystemPort;

pub struct EspSystem {
    #[cfg(not(target_os = "espidf"))]
    heap_free: u64,
    #[cfg(not(target_os = "espidf"))]
    reboots: u32,
}

impl Default for EspSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl EspSystem {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            heap_free: 300 * 1024,
            #[cfg(not(target_os = "espidf"))]
            reboots: 0,
        }
    }

    /// Simulated free heap reported from now on.
    #[cfg(not(target_os = "espidf"))]
    pub fn set_heap_free(&mut self, bytes: u64) {
        self.heap_free = bytes;
    }

    /// Reboots requested so far.
    #[cfg(not(target_os = "espidf"))]
    pub fn reboots(&self) -> u32 {
        self.reboots
    }
}

impl SystemPort for EspSystem {
    #[cfg(target_os = "espidf")]
    fn free_heap_bytes(&self) -> u64 {
        // SAFETY: read-only query of the heap allocator statistics.
        u64::from(unsafe { esp_idf_svc::sys::esp_get_free_heap_size() })
    }

    #[cfg(not(target_os = "espidf"))]
    fn free_heap_bytes(&self) -> u64 {
        self.heap_free
    }

    #[cfg(target_os = "espidf")]
    fn reboot(&mut self) {
        warn!("SYS: restarting");
        // SAFETY: esp_restart never returns; all flash writes are complete.
        unsafe { esp_idf_svc::sys::esp_restart() }
    }

    #[cfg(not(target_os = "espidf"))]
    fn reboot(&mut self) {
        self.reboots += 1;
        warn!("SYS: reboot requested (simulation, #{})", self.reboots);
    }
}
