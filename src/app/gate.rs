//! Motion-activated gate controller.
//!
//! ```text
//!   CLOSED ──[b_press]──▶ MANUAL_OPEN ──[b_press]──▶ CLOSED
//!     │  ▲
//!  [motion] └──────────[t_timeout]────────────┐
//!     ▼                                       │
//!  OPENING ──[presence]──▶ PASSING ──[nonpresence]──▶ CLOSING
//!     │                                               │
//!     └───────────[t_timeout]──▶ CLOSED ◀──[t_timeout]┘
//! ```
//!
//! States are a closed enum matched exhaustively in every callback.  The
//! single timer `t` holds OPENING and CLOSING for [`GATE_HOLD`] and is
//! cancelled on leaving either.

use core::time::Duration;

use log::info;

use crate::app::ports::{Servo, TextDisplay};
use crate::drivers::button::EdgeInput;
use crate::drivers::timer::CountdownTimer;
use crate::error::ConfigError;
use crate::events::TimerId;
use crate::fsm::{Machine, StateHandler, StateId};
use crate::model::Model;
use crate::sensors::TripSensor;

pub const OPEN_ANGLE: u16 = 0;
pub const CLOSE_ANGLE: u16 = 90;

/// How long the gate waits for presence, and how long it stays open after.
pub const GATE_HOLD: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum GateState {
    Closed = 0,
    ManualOpen = 1,
    Opening = 2,
    Passing = 3,
    Closing = 4,
}

impl GateState {
    pub const COUNT: usize = 5;

    pub fn from_index(idx: StateId) -> Option<Self> {
        match idx {
            0 => Some(Self::Closed),
            1 => Some(Self::ManualOpen),
            2 => Some(Self::Opening),
            3 => Some(Self::Passing),
            4 => Some(Self::Closing),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Closed => "Closed",
            Self::ManualOpen => "ManualOpen",
            Self::Opening => "Opening",
            Self::Passing => "Passing",
            Self::Closing => "Closing",
        }
    }
}

/// The physical gate: a servo plus the two sensors guarding it.
pub struct Gate<S, M, P> {
    servo: S,
    motion: M,
    proximity: P,
}

impl<S: Servo, M: TripSensor, P: TripSensor> Gate<S, M, P> {
    pub fn new(servo: S, motion: M, proximity: P) -> Self {
        Self {
            servo,
            motion,
            proximity,
        }
    }

    pub fn open(&mut self) {
        self.servo.set_angle(OPEN_ANGLE);
    }

    pub fn close(&mut self) {
        self.servo.set_angle(CLOSE_ANGLE);
    }

    pub fn check_motion(&mut self) -> bool {
        self.motion.is_tripped()
    }

    pub fn check_presence(&mut self) -> bool {
        self.proximity.is_tripped()
    }

    pub fn servo(&self) -> &S {
        &self.servo
    }
}

pub struct GateController<S, M, P, D> {
    gate: Gate<S, M, P>,
    display: D,
    timer: Option<TimerId>,
}

impl<S, M, P, D> GateController<S, M, P, D>
where
    S: Servo,
    M: TripSensor,
    P: TripSensor,
    D: TextDisplay,
{
    pub fn new(gate: Gate<S, M, P>, display: D) -> Self {
        Self {
            gate,
            display,
            timer: None,
        }
    }

    /// Register the controller's events and transitions on `model`.
    pub fn configure(
        model: &mut Model<Self>,
        button: impl EdgeInput + 'static,
        timer: impl CountdownTimer + 'static,
    ) -> Result<(), ConfigError> {
        use GateState::{Closed, Closing, ManualOpen, Opening, Passing};

        model.add_button("b", button)?;
        model.add_custom_event("motion")?;
        model.add_custom_event("presence")?;
        model.add_custom_event("nonpresence")?;
        let t = model.add_timer("t", timer)?;
        model.handler_mut().timer = Some(t);

        model.add_transition(Closed as StateId, &["b_press"], ManualOpen as StateId)?;
        model.add_transition(ManualOpen as StateId, &["b_press"], Closed as StateId)?;
        model.add_transition(Closed as StateId, &["motion"], Opening as StateId)?;
        model.add_transition(Opening as StateId, &["t_timeout"], Closed as StateId)?;
        model.add_transition(Opening as StateId, &["presence"], Passing as StateId)?;
        model.add_transition(Passing as StateId, &["nonpresence"], Closing as StateId)?;
        model.add_transition(Closing as StateId, &["t_timeout"], Closed as StateId)?;
        Ok(())
    }

    pub fn gate(&self) -> &Gate<S, M, P> {
        &self.gate
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    fn start_hold(&self, fsm: &mut Machine) {
        if let Some(t) = self.timer {
            fsm.start_timer(t, GATE_HOLD);
        }
    }

    fn cancel_hold(&self, fsm: &mut Machine) {
        if let Some(t) = self.timer {
            fsm.cancel_timer(t);
        }
    }
}

impl<S, M, P, D> StateHandler for GateController<S, M, P, D>
where
    S: Servo,
    M: TripSensor,
    P: TripSensor,
    D: TextDisplay,
{
    fn state_entered(&mut self, fsm: &mut Machine, state: StateId, event: Option<&str>) {
        let Some(state) = GateState::from_index(state) else {
            return;
        };
        info!("gate: entered {} on {}", state.name(), event.unwrap_or("start"));
        match state {
            GateState::Closed => {
                self.display.show_text("Welcome Home");
                self.gate.close();
            }
            GateState::ManualOpen => {
                self.display.show_text("Door is opening");
                self.gate.open();
            }
            GateState::Opening => {
                self.display.show_text("Door is opening");
                self.start_hold(fsm);
            }
            GateState::Passing => {
                self.display.show_text("Caution Go Quick");
                self.gate.open();
            }
            GateState::Closing => {
                self.display.show_text("Door Closing");
                self.start_hold(fsm);
            }
        }
    }

    fn state_left(&mut self, fsm: &mut Machine, state: StateId, _event: &str) {
        match GateState::from_index(state) {
            Some(GateState::Opening | GateState::Closing) => self.cancel_hold(fsm),
            Some(GateState::Closed | GateState::ManualOpen | GateState::Passing) | None => {}
        }
    }

    fn state_do(&mut self, fsm: &mut Machine, state: StateId) {
        let raise = match GateState::from_index(state) {
            Some(GateState::Closed) if self.gate.check_motion() => "motion",
            Some(GateState::Opening) if self.gate.check_presence() => "presence",
            Some(GateState::Passing) if !self.gate.check_presence() => "nonpresence",
            _ => return,
        };
        let _ = fsm.process_event(raise, self);
    }

    fn state_name(&self, state: StateId) -> Option<&'static str> {
        GateState::from_index(state).map(GateState::name)
    }
}
