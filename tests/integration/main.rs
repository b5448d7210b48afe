//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that drives one phase of the update
//! engine against mock adapters.  All tests run on the host (x86_64) with
//! no real hardware or network required.

mod apply_tests;
mod scheduler_tests;
mod update_flow_tests;
