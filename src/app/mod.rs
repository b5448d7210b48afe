//! Application boundary: port traits and outbound events.
//!
//! The update engine in [`crate::ota`] holds the business rules; this module
//! defines how it talks to the world.  All interaction with hardware and the
//! network happens through **port traits** defined in [`ports`], keeping the
//! engine fully testable without real peripherals.

pub mod events;
pub mod ports;
