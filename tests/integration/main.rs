//! Integration test driver for the `tests/integration/` submodules.
//!
//! Each `mod` below exercises one layer against mock event sources and
//! a manual clock.  No real pins, no real sleeps.

mod dispatch_tests;
mod mock_hw;
mod run_loop_tests;
