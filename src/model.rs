//! The state model: machine + handler + tick pacing.
//!
//! [`Model`] is the object application controllers build and run.  It
//! owns the [`Machine`], the [`StateHandler`], and the delay provider
//! that paces the cooperative run loop.
//!
//! ```text
//!  run() ──▶ initial entry (once)
//!              │
//!              ▼
//!       ┌─▶ running? ──no──▶ return Ok(())
//!       │      │ yes
//!       │      ▼
//!       │   tick: buttons → timers → inbox → do
//!       │      │
//!       │      ▼
//!       └── sleep(interval - elapsed)
//! ```

use core::time::Duration;

use embedded_hal::delay::DelayNs;
use log::{debug, error, info};

use crate::adapters::time::{Clock, MonotonicClock, StdDelay};
use crate::config::ModelConfig;
use crate::drivers::button::EdgeInput;
use crate::drivers::timer::CountdownTimer;
use crate::error::{ConfigError, Result};
use crate::events::{ButtonId, EventInbox, TimerId};
use crate::fsm::{Machine, StateHandler, StateId, StopHandle};

/// A configured, runnable state machine.
pub struct Model<H> {
    machine: Machine,
    handler: H,
    delay: Box<dyn DelayNs>,
    inbox: Option<&'static EventInbox>,
}

impl<H: StateHandler> Model<H> {
    /// Model with default configuration on the host clock.
    pub fn new(state_count: usize, handler: H) -> core::result::Result<Self, ConfigError> {
        Self::with_config(
            state_count,
            handler,
            ModelConfig::default(),
            MonotonicClock::new(),
            StdDelay,
        )
    }

    /// Model with explicit configuration, clock, and tick delay.
    pub fn with_config(
        state_count: usize,
        handler: H,
        config: ModelConfig,
        clock: impl Clock + 'static,
        delay: impl DelayNs + 'static,
    ) -> core::result::Result<Self, ConfigError> {
        if let Some(handler_states) = handler.state_count() {
            if handler_states != state_count {
                return Err(ConfigError::StateCountMismatch {
                    state_count,
                    handler_states,
                });
            }
        }
        Ok(Self {
            machine: Machine::new(state_count, config, Box::new(clock))?,
            handler,
            delay: Box::new(delay),
            inbox: None,
        })
    }

    // ── Registration ─────────────────────────────────────────────

    pub fn add_button(
        &mut self,
        name: &str,
        input: impl EdgeInput + 'static,
    ) -> core::result::Result<ButtonId, ConfigError> {
        self.machine.add_button(name, input)
    }

    pub fn add_timer(
        &mut self,
        name: &str,
        timer: impl CountdownTimer + 'static,
    ) -> core::result::Result<TimerId, ConfigError> {
        self.machine.add_timer(name, timer)
    }

    pub fn add_custom_event(&mut self, name: &str) -> core::result::Result<(), ConfigError> {
        self.machine.add_custom_event(name)
    }

    pub fn add_transition(
        &mut self,
        source: StateId,
        events: &[&str],
        dest: StateId,
    ) -> core::result::Result<(), ConfigError> {
        self.machine.add_transition(source, events, dest)
    }

    /// Drain `inbox` once per tick, between the timer and do phases.
    pub fn attach_inbox(&mut self, inbox: &'static EventInbox) {
        self.inbox = Some(inbox);
    }

    // ── Dispatch ─────────────────────────────────────────────────

    /// Programmatic trigger from outside the loop.
    pub fn process_event(&mut self, event: &str) -> Result<Option<StateId>> {
        self.machine.process_event(event, &mut self.handler)
    }

    pub fn force_transition(&mut self, dest: StateId, label: &str) -> Result<StateId> {
        self.machine.force_transition(dest, label, &mut self.handler)
    }

    // ── Running ──────────────────────────────────────────────────

    /// Fire the initial state's entry action if it has not run yet.
    pub fn start(&mut self) -> Result<()> {
        self.machine.start(&mut self.handler)
    }

    /// Run a single poll tick (starting the machine first if needed).
    pub fn tick(&mut self) -> Result<()> {
        self.machine.tick(&mut self.handler, self.inbox)
    }

    /// Run at the configured poll interval until stopped.
    pub fn run(&mut self) -> Result<()> {
        let interval = self.machine.config().poll_interval();
        self.run_every(interval)
    }

    /// Run at `interval` until [`stop`](Self::stop) (or a stop handle)
    /// is called, or a fatal fault occurs.  Resumes from the current
    /// state if called again after a stop.
    pub fn run_every(&mut self, interval: Duration) -> Result<()> {
        self.arm();
        self.run_armed_every(interval)
    }

    /// Mark the loop as running ahead of [`run_armed`](Self::run_armed).
    ///
    /// A stop requested between `arm` and `run_armed`, e.g. from a
    /// console thread spawned in between, is kept: the loop then returns
    /// without ticking.
    pub fn arm(&self) -> StopHandle {
        self.machine.set_running();
        self.machine.stop_handle()
    }

    /// Run at the configured poll interval while armed.
    pub fn run_armed(&mut self) -> Result<()> {
        let interval = self.machine.config().poll_interval();
        self.run_armed_every(interval)
    }

    fn run_armed_every(&mut self, interval: Duration) -> Result<()> {
        let period_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        info!(
            "run loop starting in state {} (poll every {}ms)",
            self.machine.current_state(),
            period_ms
        );

        if let Err(e) = self.start() {
            self.machine.stop();
            return Err(e);
        }

        while self.machine.is_running() {
            let started = self.machine.now_ms();
            if let Err(e) = self.machine.tick(&mut self.handler, self.inbox) {
                error!("run loop aborted: {}", e);
                self.machine.stop();
                return Err(e);
            }
            if !self.machine.is_running() {
                break;
            }

            let elapsed = self.machine.now_ms().saturating_sub(started);
            if elapsed < period_ms {
                let remaining = u32::try_from(period_ms - elapsed).unwrap_or(u32::MAX);
                self.delay.delay_ms(remaining);
            } else {
                debug!("tick overran poll interval ({}ms >= {}ms)", elapsed, period_ms);
            }
        }

        info!(
            "run loop stopped in state {} after {} ticks",
            self.machine.current_state(),
            self.machine.tick_count()
        );
        Ok(())
    }

    /// Request the loop to stop.  Not a transition: no exit action fires.
    pub fn stop(&self) {
        self.machine.stop();
    }

    /// Thread-safe stop handle (e.g. for a Ctrl-C handler).
    pub fn stop_handle(&self) -> StopHandle {
        self.machine.stop_handle()
    }

    // ── Accessors ────────────────────────────────────────────────

    pub fn state(&self) -> StateId {
        self.machine.current_state()
    }

    pub fn is_running(&self) -> bool {
        self.machine.is_running()
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    /// Mutable machine access, e.g. to start timers from outside the loop.
    pub fn machine_mut(&mut self) -> &mut Machine {
        &mut self.machine
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }
}
