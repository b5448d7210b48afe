//! WiFi station link adapter.
//!
//! Implements [`LinkPort`], the narrow view of the connectivity manager the
//! update scheduler needs: is the station associated with an AP right now.
//! Association and reconnection stay with the connectivity manager.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_wifi_sta_get_ap_info()` succeeds only
//!   while associated.
//! - **all other targets**: a flag set by the simulation.

use crate::app::ports::LinkPort;

#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::{AtomicBool, Ordering};

pub struct StaLink {
    #[cfg(not(target_os = "espidf"))]
    up: AtomicBool,
}

impl Default for StaLink {
    fn default() -> Self {
        Self::new()
    }
}

impl StaLink {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            up: AtomicBool::new(true),
        }
    }

    /// Signal strength of the current AP, if associated.
    #[cfg(target_os = "espidf")]
    pub fn rssi(&self) -> Option<i8> {
        use esp_idf_svc::sys::*;
        // SAFETY: plain C struct, all-zero is a valid bit pattern.
        let mut ap_info: wifi_ap_record_t = unsafe { core::mem::zeroed() };
        // SAFETY: `ap_info` is a valid out-pointer for the duration of the call.
        let ret = unsafe { esp_wifi_sta_get_ap_info(&mut ap_info) };
        if ret == ESP_OK { Some(ap_info.rssi) } else { None }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn rssi(&self) -> Option<i8> {
        self.is_connected().then_some(-60)
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn set_connected(&self, up: bool) {
        self.up.store(up, Ordering::Release);
    }
}

impl LinkPort for StaLink {
    #[cfg(target_os = "espidf")]
    fn is_connected(&self) -> bool {
        self.rssi().is_some()
    }

    #[cfg(not(target_os = "espidf"))]
    fn is_connected(&self) -> bool {
        self.up.load(Ordering::Acquire)
    }
}
