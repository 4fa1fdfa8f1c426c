//! Handler contract and the function-pointer state table.
//!
//! Application controllers implement [`StateHandler`].  Every callback
//! receives the [`Machine`] so it can raise events, force transitions,
//! start/cancel timers, or stop the loop.  Re-entrant dispatch passes
//! the handler back in:
//!
//! ```ignore
//! fn state_do(&mut self, fsm: &mut Machine, state: StateId) {
//!     if state == 0 && self.motion.is_tripped() {
//!         let _ = fsm.process_event("motion", self);
//!     }
//! }
//! ```
//!
//! [`StateTable`] is a ready-made handler for the classic embedded
//! pattern of one `(on_enter, on_exit, on_do)` row per state:
//!
//! ```text
//! ┌─────────┬───────────┬──────────┬───────────┐
//! │ StateId │ on_enter  │ on_exit  │ on_do     │
//! ├─────────┼───────────┼──────────┼───────────┤
//! │ 0       │ fn(..)    │ -        │ fn(..)    │
//! │ 1       │ fn(..)    │ fn(..)   │ -         │
//! │ ...     │           │          │           │
//! └─────────┴───────────┴──────────┴───────────┘
//! ```

use super::{Machine, StateId};

/// Callbacks fired by the dispatch engine and run loop.
///
/// Implementations must return promptly: a slow callback stalls polling
/// of every event source for its duration.
pub trait StateHandler {
    /// Entry action.  `event` is `None` only for the initial entry.
    fn state_entered(&mut self, fsm: &mut Machine, state: StateId, event: Option<&str>);

    /// Exit action for the state being left.
    fn state_left(&mut self, fsm: &mut Machine, state: StateId, event: &str);

    /// Do action, once per tick for the current state.
    fn state_do(&mut self, fsm: &mut Machine, state: StateId);

    /// Human-readable state name for diagnostics.
    fn state_name(&self, _state: StateId) -> Option<&'static str> {
        None
    }

    /// Number of states the handler has actions for, when it knows.
    /// A model refuses a handler whose count differs from its own.
    fn state_count(&self) -> Option<usize> {
        None
    }
}

// ---------------------------------------------------------------------------
// Function-pointer table
// ---------------------------------------------------------------------------

/// Entry action: `(table, machine, triggering event)`.
pub type EnterFn<C> = fn(&mut StateTable<C>, &mut Machine, Option<&str>);

/// Exit action: `(table, machine, triggering event)`.
pub type ExitFn<C> = fn(&mut StateTable<C>, &mut Machine, &str);

/// Do action: `(table, machine)`.
pub type DoFn<C> = fn(&mut StateTable<C>, &mut Machine);

/// One row of a [`StateTable`].
pub struct StateDescriptor<C> {
    pub name: &'static str,
    pub on_enter: Option<EnterFn<C>>,
    pub on_exit: Option<ExitFn<C>>,
    pub on_do: Option<DoFn<C>>,
}

impl<C> StateDescriptor<C> {
    /// Row with no actions.
    pub const fn named(name: &'static str) -> Self {
        Self {
            name,
            on_enter: None,
            on_exit: None,
            on_do: None,
        }
    }
}

/// Handler built from per-state function pointers plus shared context `C`.
///
/// Actions receive the whole table so they can re-dispatch:
/// `fsm.process_event("next", table)`.
pub struct StateTable<C> {
    states: Vec<StateDescriptor<C>>,
    pub ctx: C,
}

impl<C> StateTable<C> {
    /// Build from one descriptor per state, indexed by state id.
    pub fn new(states: Vec<StateDescriptor<C>>, ctx: C) -> Self {
        Self { states, ctx }
    }

    /// Number of rows; use as the model's state count.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

impl<C> StateHandler for StateTable<C> {
    fn state_entered(&mut self, fsm: &mut Machine, state: StateId, event: Option<&str>) {
        if let Some(enter) = self.states.get(state).and_then(|d| d.on_enter) {
            enter(self, fsm, event);
        }
    }

    fn state_left(&mut self, fsm: &mut Machine, state: StateId, event: &str) {
        if let Some(exit) = self.states.get(state).and_then(|d| d.on_exit) {
            exit(self, fsm, event);
        }
    }

    fn state_do(&mut self, fsm: &mut Machine, state: StateId) {
        if let Some(update) = self.states.get(state).and_then(|d| d.on_do) {
            update(self, fsm);
        }
    }

    fn state_name(&self, state: StateId) -> Option<&'static str> {
        self.states.get(state).map(|d| d.name)
    }

    fn state_count(&self) -> Option<usize> {
        Some(self.states.len())
    }
}
