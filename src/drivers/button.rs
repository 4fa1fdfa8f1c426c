//! Polled, debounced button driver.
//!
//! ## Hardware
//!
//! Momentary switch on a digital input, active-low (external pull-up) by
//! default.  The run loop calls [`EdgeInput::poll_edge`] once per tick;
//! the driver runs a small debounce state machine and reports a press or
//! release only after the raw level has held for the debounce window.
//!
//! ```text
//!   Stable(released) ──[raw != stable]──▶ Settling{since}
//!          ▲                                 │      │
//!          │             [raw == stable]─────┘      │ [held >= debounce]
//!          │                                        ▼
//!          └──────────── edge reported ◀──── Stable(pressed)
//! ```

use embedded_hal::digital::InputPin;

use crate::adapters::time::Clock;
use crate::error::DriverError;

/// Default debounce window.
pub const DEBOUNCE_MS: u32 = 50;

/// A debounced level change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Pressed,
    Released,
}

/// Anything the run loop can poll for debounced edges.
pub trait EdgeInput {
    /// Report at most one edge since the last poll.
    fn poll_edge(&mut self) -> Result<Option<Edge>, DriverError>;
}

/// Debounce state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Debounce {
    Stable,
    Settling { since_ms: u64 },
}

/// Level-debounced button on an `embedded-hal` input pin.
pub struct DebouncedButton<P, C> {
    pin: P,
    clock: C,
    active_low: bool,
    debounce_ms: u32,
    pressed: bool,
    state: Debounce,
}

impl<P: InputPin, C: Clock> DebouncedButton<P, C> {
    /// Active-low button with the default debounce window.
    pub fn new(pin: P, clock: C) -> Self {
        Self {
            pin,
            clock,
            active_low: true,
            debounce_ms: DEBOUNCE_MS,
            pressed: false,
            state: Debounce::Stable,
        }
    }

    /// Treat a high level as pressed.
    #[must_use]
    pub fn active_high(mut self) -> Self {
        self.active_low = false;
        self
    }

    /// Override the debounce window.  `0` reports edges on the first poll.
    #[must_use]
    pub fn with_debounce_ms(mut self, ms: u32) -> Self {
        self.debounce_ms = ms;
        self
    }

    /// Debounced level.
    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    fn read_raw(&mut self) -> Result<bool, DriverError> {
        let high = self.pin.is_high().map_err(|_| DriverError::ReadFailed)?;
        Ok(high != self.active_low)
    }
}

impl<P: InputPin, C: Clock> EdgeInput for DebouncedButton<P, C> {
    fn poll_edge(&mut self) -> Result<Option<Edge>, DriverError> {
        let raw = self.read_raw()?;
        let now_ms = self.clock.now_ms();

        if raw == self.pressed {
            // Bounce settled back to where it was.
            self.state = Debounce::Stable;
            return Ok(None);
        }

        let since_ms = match self.state {
            Debounce::Stable => {
                self.state = Debounce::Settling { since_ms: now_ms };
                now_ms
            }
            Debounce::Settling { since_ms } => since_ms,
        };

        if now_ms.saturating_sub(since_ms) < u64::from(self.debounce_ms) {
            return Ok(None);
        }

        self.pressed = raw;
        self.state = Debounce::Stable;
        Ok(Some(if raw { Edge::Pressed } else { Edge::Released }))
    }
}
