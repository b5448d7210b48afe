//! Update gate: the single pausable signal shared by the update phases and
//! every periodic task that reads shared sensor / telemetry state.
//!
//! ```text
//!   download / apply / verify          sampling, telemetry, sysmon
//!   ────────────────────────           ───────────────────────────
//!   let _hold = GATE.close();  ──▶     GATE.wait_open().await  (parks)
//!   ... touch flash ...
//!   drop(_hold)                ──▶     woken, proceeds
//! ```
//!
//! Holds nest: the gate reopens when the last [`GateHold`] is dropped.
//! Waiters never spin; they register a waker and are woken on reopen.

use core::cell::RefCell;
use core::future::poll_fn;
use core::sync::atomic::{AtomicUsize, Ordering};
use core::task::Poll;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::waitqueue::MultiWakerRegistration;

/// Maximum number of tasks parked on the gate at once.  Registering past
/// this wakes everyone early; they simply re-check and park again.
const MAX_WAITERS: usize = 8;

pub struct UpdateGate {
    holds: AtomicUsize,
    waiters: Mutex<CriticalSectionRawMutex, RefCell<MultiWakerRegistration<MAX_WAITERS>>>,
}

impl Default for UpdateGate {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdateGate {
    pub const fn new() -> Self {
        Self {
            holds: AtomicUsize::new(0),
            waiters: Mutex::new(RefCell::new(MultiWakerRegistration::new())),
        }
    }

    /// Pause gated work until the returned hold is dropped.
    #[must_use = "the gate reopens as soon as the hold is dropped"]
    pub fn close(&self) -> GateHold<'_> {
        self.holds.fetch_add(1, Ordering::AcqRel);
        GateHold { gate: self }
    }

    pub fn is_open(&self) -> bool {
        self.holds.load(Ordering::Acquire) == 0
    }

    /// Resolve immediately if open, otherwise park until it reopens.
    pub async fn wait_open(&self) {
        poll_fn(|cx| {
            if self.is_open() {
                return Poll::Ready(());
            }
            self.waiters.lock(|w| w.borrow_mut().register(cx.waker()));
            // Reopened between the check and the registration.
            if self.is_open() {
                Poll::Ready(())
            } else {
                Poll::Pending
            }
        })
        .await;
    }

    fn release(&self) {
        if self.holds.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.waiters.lock(|w| w.borrow_mut().wake());
        }
    }
}

/// RAII hold on an [`UpdateGate`].
pub struct GateHold<'a> {
    gate: &'a UpdateGate,
}

impl Drop for GateHold<'_> {
    fn drop(&mut self) {
        self.gate.release();
    }
}
