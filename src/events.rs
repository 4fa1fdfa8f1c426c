//! Event naming and the cross-thread event inbox.
//!
//! Events are produced by:
//! - debounced digital inputs (`<button>_press`, `<button>_release`)
//! - countdown timers (`<timer>_timeout`)
//! - software (custom events raised by handlers or posted to the inbox)
//!
//! All of them are consumed by the single dispatch thread that owns the
//! [`Model`](crate::model::Model).
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ Button poll │────▶│              │     │              │
//! │ Timer check │────▶│   Run loop   │────▶│   Dispatch   │
//! │ Inbox drain │────▶│ (one thread) │     │   engine     │
//! │ Do action   │────▶│              │     │              │
//! └─────────────┘     └──────────────┘     └──────────────┘
//!        ▲
//!        │ post()
//! ┌──────┴──────┐
//! │ other thread│
//! │ / interrupt │
//! └─────────────┘
//! ```

use core::fmt;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use crate::error::ConfigError;

/// Longest event name accepted, in bytes.
pub const MAX_EVENT_NAME_LEN: usize = 32;

/// Fixed-capacity event name.
pub type EventName = heapless::String<MAX_EVENT_NAME_LEN>;

/// Suffix appended to a button name for its press edge.
pub const PRESS_SUFFIX: &str = "_press";
/// Suffix appended to a button name for its release edge.
pub const RELEASE_SUFFIX: &str = "_release";
/// Suffix appended to a timer name for its expiry.
pub const TIMEOUT_SUFFIX: &str = "_timeout";

/// Validate `name` and copy it into an [`EventName`].
pub fn event_name(name: &str) -> Result<EventName, ConfigError> {
    if name.is_empty() || name.chars().any(char::is_whitespace) {
        return Err(ConfigError::InvalidName);
    }
    let mut out = EventName::new();
    out.push_str(name).map_err(|()| ConfigError::NameTooLong)?;
    Ok(out)
}

/// Build `<base><suffix>`, e.g. `b_press`.
pub fn derived_name(base: &str, suffix: &str) -> Result<EventName, ConfigError> {
    let mut out = event_name(base)?;
    out.push_str(suffix).map_err(|()| ConfigError::NameTooLong)?;
    Ok(out)
}

// ---------------------------------------------------------------------------
// Source categories
// ---------------------------------------------------------------------------

/// Index of a registered button, returned by `add_button`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ButtonId(pub(crate) usize);

/// Index of a registered timer, returned by `add_timer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(pub(crate) usize);

/// Which kind of source produces a registered event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    ButtonPress(ButtonId),
    ButtonRelease(ButtonId),
    TimerTimeout(TimerId),
    Custom,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ButtonPress(_) => write!(f, "button press"),
            Self::ButtonRelease(_) => write!(f, "button release"),
            Self::TimerTimeout(_) => write!(f, "timer timeout"),
            Self::Custom => write!(f, "custom"),
        }
    }
}

// ---------------------------------------------------------------------------
// Inbox
// ---------------------------------------------------------------------------

/// Pending-event capacity of an [`EventInbox`].
pub const INBOX_DEPTH: usize = 16;

/// Why [`EventInbox::post`] refused an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostError {
    /// The name is not a valid event name.
    InvalidName,
    /// The inbox is full; the event was dropped.
    Full,
}

impl fmt::Display for PostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidName => write!(f, "invalid event name"),
            Self::Full => write!(f, "inbox full, event dropped"),
        }
    }
}

/// Bounded queue that carries custom events from other threads (or
/// interrupt handlers) onto the dispatch thread.
///
/// Intended to live in a `static`:
///
/// ```
/// use statemodel::events::EventInbox;
/// static INBOX: EventInbox = EventInbox::new();
/// INBOX.post("motion").unwrap();
/// ```
pub struct EventInbox {
    channel: Channel<CriticalSectionRawMutex, EventName, INBOX_DEPTH>,
}

impl EventInbox {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
        }
    }

    /// Queue `name` for dispatch on the next tick.  Never blocks.
    pub fn post(&self, name: &str) -> Result<(), PostError> {
        let name = event_name(name).map_err(|_| PostError::InvalidName)?;
        self.channel.try_send(name).map_err(|_| PostError::Full)
    }

    /// Take the oldest pending event, if any.
    pub(crate) fn take(&self) -> Option<EventName> {
        self.channel.try_receive().ok()
    }

    /// True when nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }
}

impl Default for EventInbox {
    fn default() -> Self {
        Self::new()
    }
}
