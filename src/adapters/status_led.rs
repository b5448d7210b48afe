//! Update status LED.
//!
//! Drives a single GPIO LED from update events: toggles once per staged
//! file while downloading, solid on once an update is staged, applied or
//! committed, off after any failure.  Works with any `embedded-hal`
//! output pin; pin errors are ignored since the LED is cosmetic.

use embedded_hal::digital::OutputPin;

use crate::app::events::OtaEvent;
use crate::app::ports::EventSink;

pub struct ProgressLed<P: OutputPin> {
    pin: P,
    lit: bool,
}

impl<P: OutputPin> ProgressLed<P> {
    pub fn new(pin: P) -> Self {
        let mut led = Self { pin, lit: false };
        led.set(false);
        led
    }

    pub fn is_lit(&self) -> bool {
        self.lit
    }

    pub fn release(self) -> P {
        self.pin
    }

    fn set(&mut self, on: bool) {
        let _ = if on { self.pin.set_high() } else { self.pin.set_low() };
        self.lit = on;
    }
}

impl<P: OutputPin> EventSink for ProgressLed<P> {
    fn emit(&mut self, event: &OtaEvent) {
        match event {
            OtaEvent::DownloadProgress { .. } => self.set(!self.lit),
            OtaEvent::Staged { .. } | OtaEvent::Applied { .. } | OtaEvent::CommitVerified { .. } => {
                self.set(true);
            }
            OtaEvent::DownloadFailed(_)
            | OtaEvent::ApplyFailed(_)
            | OtaEvent::CommitFailed(_)
            | OtaEvent::RolledBack { .. } => self.set(false),
            _ => {}
        }
    }
}
