//! Event-source drivers: debounced buttons and countdown timers.

pub mod button;
pub mod timer;
