//! Event-driven finite state machine engine.
//!
//! ```text
//!  ┌───────────────┐   name    ┌──────────────────┐  (state, name)  ┌──────────────────┐
//!  │ Event sources │─────────▶│  process_event   │───────────────▶│ TransitionTable  │
//!  │ button/timer/ │           │                  │◀───────────────│                  │
//!  │ custom/inbox  │           │  on match:       │   Some(dest)    └──────────────────┘
//!  └───────────────┘           │   state_left     │
//!                              │   current = dest │──▶ StateHandler callbacks
//!                              │   state_entered  │    (may re-enter process_event)
//!                              └──────────────────┘
//! ```
//!
//! [`Machine`] owns the transition table, the registered event sources,
//! and the current state.  The handler is passed into every dispatch
//! rather than owned, so callbacks can hold `&mut Machine` and dispatch
//! again from inside an entry, exit, or do action.  Nested dispatch from
//! entry and do actions runs inline and is bounded by
//! `ModelConfig::max_dispatch_depth`; tripping the bound latches a fatal
//! fault.  A dispatch requested while an exit action runs is held until
//! the new state has been entered, then runs against that state.

pub mod handler;
pub mod table;

use core::fmt;
use core::time::Duration;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use heapless::HistoryBuffer;
use log::{debug, error, info, warn};

use crate::adapters::time::Clock;
use crate::config::ModelConfig;
use crate::drivers::button::{Edge, EdgeInput};
use crate::drivers::timer::CountdownTimer;
use crate::error::{ConfigError, Error, Result};
use crate::events::{
    ButtonId, EventInbox, EventKind, EventName, INBOX_DEPTH, MAX_EVENT_NAME_LEN, PRESS_SUFFIX,
    RELEASE_SUFFIX, TIMEOUT_SUFFIX, TimerId, derived_name, event_name,
};

pub use handler::{StateDescriptor, StateHandler, StateTable};
pub use table::TransitionTable;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// A state is an index in `[0, state_count)`.
pub type StateId = usize;

/// Every machine starts here.
pub const INITIAL_STATE: StateId = 0;

/// Number of transitions kept for inspection.
pub const HISTORY_LEN: usize = 16;

/// Dispatches one exit action may request.
pub const DEFERRED_DEPTH: usize = 4;

/// One completed transition, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRecord {
    pub from: StateId,
    pub event: EventName,
    pub to: StateId,
    /// True for [`Machine::force_transition`], false for table lookups.
    pub forced: bool,
}

/// Cloneable, thread-safe handle that requests the run loop to stop.
#[derive(Debug, Clone)]
pub struct StopHandle {
    running: Arc<AtomicBool>,
}

impl StopHandle {
    /// Request a stop; observed at the top of the next tick.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

// ---------------------------------------------------------------------------
// Registered sources
// ---------------------------------------------------------------------------

struct ButtonSlot {
    name: EventName,
    press: EventName,
    release: EventName,
    input: Box<dyn EdgeInput>,
}

struct TimerSlot {
    name: EventName,
    timeout: EventName,
    timer: Box<dyn CountdownTimer>,
    /// Engine-side arming, so a timeout is dispatched at most once per start
    /// whatever the driver does.
    armed: bool,
}

/// Dispatch requested from inside an exit action.
enum Deferred {
    Event(EventName),
    Force(StateId, EventName),
}

struct Registered {
    name: EventName,
    kind: EventKind,
}

/// `3 (Opening)` when the handler names its states, `3` otherwise.
struct Named(StateId, Option<&'static str>);

impl fmt::Display for Named {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.1 {
            Some(name) => write!(f, "{} ({})", self.0, name),
            None => write!(f, "{}", self.0),
        }
    }
}

/// Copy `text` into an [`EventName`], cutting at a char boundary if needed.
fn truncated(text: &str) -> EventName {
    let mut out = EventName::new();
    for ch in text.chars() {
        if out.len() + ch.len_utf8() > MAX_EVENT_NAME_LEN || out.push(ch).is_err() {
            break;
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Machine
// ---------------------------------------------------------------------------

/// Dispatch engine plus event-source registry.
pub struct Machine {
    table: TransitionTable,
    events: Vec<Registered>,
    buttons: Vec<ButtonSlot>,
    timers: Vec<TimerSlot>,
    current: StateId,
    /// Dispatches currently on the stack.
    depth: u8,
    /// Destination of the transition whose exit action is running.
    leaving_to: Option<StateId>,
    deferred: heapless::Vec<Deferred, DEFERRED_DEPTH>,
    fault: Option<Error>,
    started: bool,
    running: Arc<AtomicBool>,
    config: ModelConfig,
    clock: Box<dyn Clock>,
    history: HistoryBuffer<TransitionRecord, HISTORY_LEN>,
    tick_count: u64,
    dispatch_count: u64,
}

impl Machine {
    /// Create a machine with `state_count` states, starting in state 0.
    pub fn new(
        state_count: usize,
        config: ModelConfig,
        clock: Box<dyn Clock>,
    ) -> core::result::Result<Self, ConfigError> {
        if state_count == 0 {
            return Err(ConfigError::NoStates);
        }
        config.validate()?;
        Ok(Self {
            table: TransitionTable::new(state_count),
            events: Vec::new(),
            buttons: Vec::new(),
            timers: Vec::new(),
            current: INITIAL_STATE,
            depth: 0,
            leaving_to: None,
            deferred: heapless::Vec::new(),
            fault: None,
            started: false,
            running: Arc::new(AtomicBool::new(false)),
            config,
            clock,
            history: HistoryBuffer::new(),
            tick_count: 0,
            dispatch_count: 0,
        })
    }

    // ── Registration ─────────────────────────────────────────────

    /// Register a button; it emits `<name>_press` and `<name>_release`.
    pub fn add_button(
        &mut self,
        name: &str,
        input: impl EdgeInput + 'static,
    ) -> core::result::Result<ButtonId, ConfigError> {
        let base = event_name(name)?;
        let press = derived_name(name, PRESS_SUFFIX)?;
        let release = derived_name(name, RELEASE_SUFFIX)?;
        self.ensure_unregistered(&press)?;
        self.ensure_unregistered(&release)?;

        let id = ButtonId(self.buttons.len());
        self.register(press.clone(), EventKind::ButtonPress(id));
        self.register(release.clone(), EventKind::ButtonRelease(id));
        info!("registered button '{}' ({} / {})", base, press, release);
        self.buttons.push(ButtonSlot {
            name: base,
            press,
            release,
            input: Box::new(input),
        });
        Ok(id)
    }

    /// Register a timer; it emits `<name>_timeout`.
    pub fn add_timer(
        &mut self,
        name: &str,
        timer: impl CountdownTimer + 'static,
    ) -> core::result::Result<TimerId, ConfigError> {
        let base = event_name(name)?;
        let timeout = derived_name(name, TIMEOUT_SUFFIX)?;
        self.ensure_unregistered(&timeout)?;

        let id = TimerId(self.timers.len());
        self.register(timeout.clone(), EventKind::TimerTimeout(id));
        info!("registered timer '{}' ({})", base, timeout);
        self.timers.push(TimerSlot {
            name: base,
            timeout,
            timer: Box::new(timer),
            armed: false,
        });
        Ok(id)
    }

    /// Register an event with no hardware source.
    pub fn add_custom_event(&mut self, name: &str) -> core::result::Result<(), ConfigError> {
        let name = event_name(name)?;
        self.ensure_unregistered(&name)?;
        info!("registered custom event '{}'", name);
        self.register(name, EventKind::Custom);
        Ok(())
    }

    /// Register `source --e--> dest` for each `e` in `events`.
    ///
    /// Every event must already be registered.  All-or-nothing.
    pub fn add_transition(
        &mut self,
        source: StateId,
        events: &[&str],
        dest: StateId,
    ) -> core::result::Result<(), ConfigError> {
        self.table.check_state(source)?;
        self.table.check_state(dest)?;
        for &raw in events {
            let name = event_name(raw)?;
            if self.event_kind(&name).is_none() {
                return Err(ConfigError::UnknownEvent(name));
            }
        }
        self.table.insert_all(source, events, dest)?;
        debug!("transition {} --{:?}--> {}", source, events, dest);
        Ok(())
    }

    /// Which source produces `event`, if any.
    pub fn event_kind(&self, event: &str) -> Option<EventKind> {
        self.events
            .iter()
            .find(|r| r.name.as_str() == event)
            .map(|r| r.kind)
    }

    fn ensure_unregistered(&self, name: &EventName) -> core::result::Result<(), ConfigError> {
        match self.event_kind(name) {
            Some(kind) => {
                error!("event '{}' already registered as {}", name, kind);
                Err(ConfigError::DuplicateEvent(name.clone()))
            }
            None => Ok(()),
        }
    }

    fn register(&mut self, name: EventName, kind: EventKind) {
        self.events.push(Registered { name, kind });
    }

    // ── Timers ───────────────────────────────────────────────────

    /// Arm (or re-arm) a registered timer.
    pub fn start_timer(&mut self, id: TimerId, duration: Duration) {
        match self.timers.get_mut(id.0) {
            Some(slot) => {
                slot.timer.start(duration);
                slot.armed = true;
                debug!("timer '{}' started ({:?})", slot.name, duration);
            }
            None => warn!("start_timer: no timer with id {}", id.0),
        }
    }

    /// Disarm a registered timer.  No timeout is dispatched for the
    /// cancelled arming.
    pub fn cancel_timer(&mut self, id: TimerId) {
        match self.timers.get_mut(id.0) {
            Some(slot) => {
                slot.timer.cancel();
                if slot.armed {
                    debug!("timer '{}' cancelled", slot.name);
                }
                slot.armed = false;
            }
            None => warn!("cancel_timer: no timer with id {}", id.0),
        }
    }

    /// Whether the timer is armed and has not yet fired.
    pub fn timer_armed(&self, id: TimerId) -> bool {
        self.timers.get(id.0).is_some_and(|slot| slot.armed)
    }

    // ── Dispatch ─────────────────────────────────────────────────

    /// Dispatch `event` against the current state.
    ///
    /// Returns `Ok(None)` when the current state ignores the event (the
    /// normal case for most events), otherwise the state that is current
    /// once the transition, including anything its callbacks chained,
    /// has completed.  `Err` only for a latched fatal fault.
    ///
    /// A matched event on a machine that has not started fires the
    /// initial entry action first.  Called from an exit action, the event
    /// is held until the pending entry completes and `Ok(None)` is
    /// returned.
    pub fn process_event<H: StateHandler + ?Sized>(
        &mut self,
        event: &str,
        handler: &mut H,
    ) -> Result<Option<StateId>> {
        self.check_fault()?;
        if self.leaving_to.is_some() {
            match event_name(event) {
                Ok(name) => self.defer(Deferred::Event(name)),
                Err(_) => debug!("unregistered event '{}' ignored", event),
            }
            return Ok(None);
        }
        if !self.started && self.table.lookup(self.current, event).is_some() {
            self.start(handler)?;
        }
        let Some(dest) = self.table.lookup(self.current, event) else {
            if self.event_kind(event).is_none() {
                debug!("unregistered event '{}' ignored", event);
            } else {
                debug!("'{}' ignored in state {}", event, self.current);
            }
            return Ok(None);
        };
        self.transition(dest, event, false, handler).map(Some)
    }

    /// Move to `dest` without a table lookup, firing exit and entry
    /// actions with `label` as the pseudo-event.
    ///
    /// Called from an exit action, the move is held like an event in
    /// [`process_event`](Self::process_event) and the pending destination
    /// of the enclosing transition is returned.
    pub fn force_transition<H: StateHandler + ?Sized>(
        &mut self,
        dest: StateId,
        label: &str,
        handler: &mut H,
    ) -> Result<StateId> {
        self.check_fault()?;
        self.table.check_state(dest)?;
        if let Some(pending) = self.leaving_to {
            self.defer(Deferred::Force(dest, truncated(label)));
            return Ok(pending);
        }
        self.start(handler)?;
        self.transition(dest, label, true, handler)
    }

    fn defer(&mut self, request: Deferred) {
        if self.deferred.push(request).is_err() {
            warn!(
                "more than {} dispatches requested from one exit action; extra dropped",
                DEFERRED_DEPTH
            );
        }
    }

    fn transition<H: StateHandler + ?Sized>(
        &mut self,
        dest: StateId,
        event: &str,
        forced: bool,
        handler: &mut H,
    ) -> Result<StateId> {
        if self.depth >= self.config.max_dispatch_depth {
            return Err(self.latch(Error::ReentrancyDepth {
                depth: self.depth,
                event: truncated(event),
            }));
        }
        self.depth += 1;

        let from = self.current;
        let started = self.clock.now_ms();
        self.leaving_to = Some(dest);
        handler.state_left(self, from, event);
        self.leaving_to = None;
        self.check_budget("exit", from, started);
        let held = core::mem::take(&mut self.deferred);

        self.current = dest;
        self.dispatch_count += 1;
        self.record(from, event, dest, forced, handler);

        let started = self.clock.now_ms();
        handler.state_entered(self, dest, Some(event));
        self.check_budget("entry", dest, started);

        // Requests from the exit action see the state just entered.
        let mut outcome = Ok(());
        for request in held {
            let result = match request {
                Deferred::Event(name) => self.process_event(&name, handler).map(|_| ()),
                Deferred::Force(to, label) => {
                    self.force_transition(to, &label, handler).map(|_| ())
                }
            };
            if let Err(e) = result {
                outcome = Err(e);
                break;
            }
        }

        self.depth -= 1;
        outcome?;
        self.check_fault()?;
        Ok(self.current)
    }

    fn record<H: StateHandler + ?Sized>(
        &mut self,
        from: StateId,
        event: &str,
        to: StateId,
        forced: bool,
        handler: &H,
    ) {
        let from_n = Named(from, handler.state_name(from));
        let to_n = Named(to, handler.state_name(to));
        let kind = if forced { "forced" } else { "event" };
        if self.config.log_transitions {
            info!("FSM | {} -[{} '{}']-> {}", from_n, kind, event, to_n);
        } else {
            debug!("FSM | {} -[{} '{}']-> {}", from_n, kind, event, to_n);
        }
        if self.config.history_enabled {
            self.history.write(TransitionRecord {
                from,
                event: truncated(event),
                to,
                forced,
            });
        }
    }

    fn check_budget(&self, phase: &str, state: StateId, started_ms: u64) {
        let took = self.clock.now_ms().saturating_sub(started_ms);
        if took > u64::from(self.config.callback_budget_ms) {
            warn!(
                "{} action of state {} took {}ms (budget {}ms); polling stalled",
                phase, state, took, self.config.callback_budget_ms
            );
        }
    }

    fn check_fault(&self) -> Result<()> {
        match &self.fault {
            Some(fault) => Err(fault.clone()),
            None => Ok(()),
        }
    }

    fn latch(&mut self, fault: Error) -> Error {
        error!("FSM fault: {} (machine halted)", fault);
        self.fault = Some(fault.clone());
        self.running.store(false, Ordering::Release);
        fault
    }

    // ── Run-loop phases ──────────────────────────────────────────

    /// Fire the initial entry action, once per machine lifetime.
    ///
    /// Dispatch and [`tick`](Self::tick) call this on their own; call it
    /// directly to enter the initial state before any event arrives.
    pub fn start<H: StateHandler + ?Sized>(&mut self, handler: &mut H) -> Result<()> {
        self.check_fault()?;
        if self.started {
            return Ok(());
        }
        self.started = true;
        info!(
            "FSM starting in state {}",
            Named(self.current, handler.state_name(self.current))
        );
        self.depth += 1;
        let state = self.current;
        let started = self.clock.now_ms();
        handler.state_entered(self, state, None);
        self.check_budget("entry", state, started);
        self.depth -= 1;
        self.check_fault()
    }

    /// One poll tick: buttons, timers, inbox, then the do action.
    pub(crate) fn tick<H: StateHandler + ?Sized>(
        &mut self,
        handler: &mut H,
        inbox: Option<&EventInbox>,
    ) -> Result<()> {
        self.start(handler)?;
        self.tick_count += 1;

        // 1. Buttons
        for idx in 0..self.buttons.len() {
            let slot = &mut self.buttons[idx];
            let edge = match slot.input.poll_edge() {
                Ok(edge) => edge,
                Err(e) => {
                    warn!("button '{}': {} (no event this tick)", slot.name, e);
                    None
                }
            };
            let event = match edge {
                Some(Edge::Pressed) => slot.press.clone(),
                Some(Edge::Released) => slot.release.clone(),
                None => continue,
            };
            self.process_event(&event, handler)?;
        }

        // 2. Timers (disarm before dispatch so callbacks may re-arm)
        for idx in 0..self.timers.len() {
            let slot = &mut self.timers[idx];
            if !slot.armed || !slot.timer.check_expired() {
                continue;
            }
            slot.armed = false;
            let event = slot.timeout.clone();
            self.process_event(&event, handler)?;
        }

        // 3. Events marshalled from other threads
        if let Some(inbox) = inbox {
            for _ in 0..INBOX_DEPTH {
                let Some(event) = inbox.take() else { break };
                self.process_event(&event, handler)?;
            }
        }

        // 4. Do action for whichever state is current now
        let state = self.current;
        let started = self.clock.now_ms();
        handler.state_do(self, state);
        self.check_budget("do", state, started);
        self.check_fault()
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Request the run loop to stop.  Idempotent.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::AcqRel) {
            info!("FSM stop requested in state {}", self.current);
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub(crate) fn set_running(&self) {
        self.running.store(true, Ordering::Release);
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            running: Arc::clone(&self.running),
        }
    }

    // ── Queries ──────────────────────────────────────────────────

    pub fn current_state(&self) -> StateId {
        self.current
    }

    pub fn state_count(&self) -> usize {
        self.table.state_count()
    }

    pub fn table(&self) -> &TransitionTable {
        &self.table
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Whether the initial entry action has run.
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// The latched fatal fault, if any.
    pub fn fault(&self) -> Option<&Error> {
        self.fault.as_ref()
    }

    /// Recent transitions, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &TransitionRecord> {
        self.history.oldest_ordered()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn dispatch_count(&self) -> u64 {
        self.dispatch_count
    }

    pub(crate) fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }
}
