//! StateModel: event-driven state machines for polled controllers.
//!
//! A [`Model`] owns a transition table keyed by `(state, event name)`,
//! a set of registered event sources (debounced buttons, countdown
//! timers, custom events), and a [`StateHandler`] whose entry, exit, and
//! do actions drive the hardware.  A cooperative run loop polls the
//! sources at a fixed interval and dispatches whatever fired.
//!
//! ```text
//!  drivers/ sensors/ ──▶ fsm::Machine ──▶ StateHandler ──▶ app::ports
//!  (EdgeInput, timers)   (table, dispatch)  (controller)     (servo, LCD, ...)
//! ```

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod drivers;
pub mod error;
pub mod events;
pub mod fsm;
pub mod model;
pub mod sensors;

pub use config::ModelConfig;
pub use error::{ConfigError, DriverError, Error, Result};
pub use events::{ButtonId, EventInbox, EventKind, TimerId};
pub use fsm::{Machine, StateHandler, StateId, StateTable, StopHandle};
pub use model::Model;
