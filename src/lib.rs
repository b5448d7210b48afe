//! SensorNode firmware library: the over-the-air update engine.
//!
//! Exposes the pure-logic modules for integration testing and the release
//! tooling. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod boot;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod gate;
pub mod ota;
#[cfg(not(target_os = "espidf"))]
pub mod packager;
pub mod scheduler;
