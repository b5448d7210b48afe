//! Timer adapter.
//!
//! Implements [`Delay`] with `async-io-mini` reactor timers, so a sleeping
//! task parks on the reactor instead of blocking the executor thread.  The
//! same reactor runs on ESP-IDF and on the host.

use core::time::Duration;

use crate::app::ports::Delay;

#[derive(Debug, Clone, Copy, Default)]
pub struct ReactorDelay;

impl ReactorDelay {
    pub fn new() -> Self {
        Self
    }
}

impl Delay for ReactorDelay {
    async fn sleep(&self, duration: Duration) {
        async_io_mini::Timer::after(duration).await;
    }
}
