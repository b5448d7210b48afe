//! Runtime resource diagnostics.
//!
//! A [`ResourceSnapshot`] of heap and flash usage, collected on demand and
//! logged periodically by [`monitor_resources`].  The monitor reads shared
//! state, so it parks on the update gate while an update phase holds it.

use core::fmt::Write as _;
use core::time::Duration;

use log::{info, warn};
use serde::Serialize;

use crate::app::ports::{Delay, FlashFs, SystemPort};
use crate::gate::UpdateGate;

/// Heap and flash usage at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResourceSnapshot {
    pub heap_free: u64,
    pub flash_total: u64,
    pub flash_free: u64,
}

impl ResourceSnapshot {
    /// Flash figures read as zero if the filesystem cannot be queried.
    pub fn collect<S: SystemPort, F: FlashFs>(system: &S, fs: &F) -> Self {
        let (flash_total, flash_free) = match fs.usage() {
            Ok(u) => (u.total, u.free),
            Err(e) => {
                warn!("DIAG: flash usage unavailable: {}", e);
                (0, 0)
            }
        };
        Self {
            heap_free: system.free_heap_bytes(),
            flash_total,
            flash_free,
        }
    }

    pub fn flash_used(&self) -> u64 {
        self.flash_total.saturating_sub(self.flash_free)
    }

    /// Whole percent of flash in use; 0 for an unknown total.
    pub fn flash_used_pct(&self) -> u8 {
        if self.flash_total == 0 {
            return 0;
        }
        (self.flash_used() * 100 / self.flash_total) as u8
    }

    /// One-line rendering for the serial log.
    pub fn summary(&self) -> heapless::String<96> {
        let mut s = heapless::String::new();
        let _ = write!(
            s,
            "heap {} KiB free | flash {}/{} KiB ({}%)",
            self.heap_free / 1024,
            self.flash_used() / 1024,
            self.flash_total / 1024,
            self.flash_used_pct()
        );
        s
    }
}

/// Log a [`ResourceSnapshot`] every `period`, pausing while the gate is
/// closed.  Never returns.
pub async fn monitor_resources<S, F, T>(system: &S, fs: &F, gate: &UpdateGate, timer: &T, period: Duration)
where
    S: SystemPort,
    F: FlashFs,
    T: Delay,
{
    loop {
        gate.wait_open().await;
        let snap = ResourceSnapshot::collect(system, fs);
        info!("DIAG: {}", snap.summary());
        timer.sleep(period).await;
    }
}
