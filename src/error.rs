//! Unified error types for the state model runtime.
//!
//! A single [`Error`] enum that every subsystem converts into, keeping the
//! run loop's error handling uniform.  Configuration errors are programmer
//! errors raised at registration time; driver errors are recoverable and
//! never stop the run loop; a dispatch-depth fault is fatal.

use core::fmt;

use crate::events::EventName;
use crate::fsm::StateId;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the runtime funnels into this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The machine was configured incorrectly.  Fatal to setup.
    Config(ConfigError),
    /// Nested dispatch exceeded the configured depth.  Fatal to the machine.
    ReentrancyDepth {
        /// Depth at which the guard tripped.
        depth: u8,
        /// Event (or forced-transition label) that would have gone deeper.
        event: EventName,
    },
    /// An event source or peripheral failed.
    Driver(DriverError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "config: {e}"),
            Self::ReentrancyDepth { depth, event } => write!(
                f,
                "dispatch depth {depth} exceeded while handling '{event}' (transition cycle?)"
            ),
            Self::Driver(e) => write!(f, "driver: {e}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A model needs at least one state.
    NoStates,
    /// State id outside `[0, state_count)`.
    InvalidState { state: StateId, state_count: usize },
    /// Two event sources would produce the same event name.
    DuplicateEvent(EventName),
    /// A transition names an event that no source produces.
    UnknownEvent(EventName),
    /// `(state, event)` already maps to a destination.
    ConflictingTransition {
        state: StateId,
        event: EventName,
        existing: StateId,
        requested: StateId,
    },
    /// The handler has actions for a different number of states.
    StateCountMismatch { state_count: usize, handler_states: usize },
    /// `add_transition` was called with no trigger events.
    EmptyEventList { state: StateId },
    /// Event or source name is empty or contains whitespace.
    InvalidName,
    /// Event name does not fit in [`MAX_EVENT_NAME_LEN`](crate::events::MAX_EVENT_NAME_LEN) bytes.
    NameTooLong,
    /// A runtime configuration value is out of range.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Configuration text could not be parsed.
    Malformed,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoStates => write!(f, "model must have at least one state"),
            Self::InvalidState { state, state_count } => {
                write!(f, "state {state} out of range (model has {state_count} states)")
            }
            Self::DuplicateEvent(name) => write!(f, "event '{name}' is already registered"),
            Self::UnknownEvent(name) => write!(f, "event '{name}' is not registered"),
            Self::ConflictingTransition {
                state,
                event,
                existing,
                requested,
            } => write!(
                f,
                "state {state} on '{event}' already goes to {existing}, cannot also go to {requested}"
            ),
            Self::StateCountMismatch {
                state_count,
                handler_states,
            } => write!(
                f,
                "model has {state_count} states but the handler describes {handler_states}"
            ),
            Self::EmptyEventList { state } => {
                write!(f, "transition from state {state} has no trigger events")
            }
            Self::InvalidName => write!(f, "names must be non-empty and contain no whitespace"),
            Self::NameTooLong => write!(f, "event name too long"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
            Self::Malformed => write!(f, "malformed configuration"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Driver errors
// ---------------------------------------------------------------------------

/// Failure reported by an event source or peripheral driver.
/// Opaque to the dispatch core: a failed poll counts as "no event".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverError {
    /// A digital input could not be read.
    ReadFailed,
    /// An output could not be driven.
    WriteFailed,
    /// The peripheral is not responding.
    Unavailable,
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFailed => write!(f, "input read failed"),
            Self::WriteFailed => write!(f, "output write failed"),
            Self::Unavailable => write!(f, "peripheral unavailable"),
        }
    }
}

impl std::error::Error for DriverError {}

impl From<DriverError> for Error {
    fn from(e: DriverError) -> Self {
        Self::Driver(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
