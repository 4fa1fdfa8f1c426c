//! Mock event sources and a recording handler for integration tests.
//!
//! Every callback is recorded so tests can assert on the exact
//! exit/entry/do ordering without any real pins or sleeps.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::time::Duration;

use statemodel::adapters::time::ManualClock;
use statemodel::config::ModelConfig;
use statemodel::drivers::button::{Edge, EdgeInput};
use statemodel::error::DriverError;
use statemodel::events::TimerId;
use statemodel::fsm::{Machine, StateHandler, StateId};
use statemodel::model::Model;

// ── Scripted button ───────────────────────────────────────────

/// Button whose polls return a queued script; `Ok(None)` once drained.
/// Clones share the script.
#[derive(Clone, Default)]
pub struct ScriptedButton {
    script: Rc<RefCell<VecDeque<Result<Option<Edge>, DriverError>>>>,
}

#[allow(dead_code)]
impl ScriptedButton {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&self) {
        self.script.borrow_mut().push_back(Ok(Some(Edge::Pressed)));
    }

    pub fn release(&self) {
        self.script.borrow_mut().push_back(Ok(Some(Edge::Released)));
    }

    /// One press-release cycle, one edge per tick.
    pub fn click(&self) {
        self.press();
        self.release();
    }

    pub fn fail(&self) {
        self.script.borrow_mut().push_back(Err(DriverError::ReadFailed));
    }

    pub fn idle(&self) {
        self.script.borrow_mut().push_back(Ok(None));
    }
}

impl EdgeInput for ScriptedButton {
    fn poll_edge(&mut self) -> Result<Option<Edge>, DriverError> {
        self.script.borrow_mut().pop_front().unwrap_or(Ok(None))
    }
}

// ── Recording handler ─────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Enter(StateId, Option<String>),
    Exit(StateId, String),
    Do(StateId),
}

/// What a state does on entry or in its do action, besides recording.
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub enum Action {
    Raise(&'static str),
    Force(StateId, &'static str),
    StartTimer(TimerId, Duration),
    CancelTimer(TimerId),
    Stop,
}

#[derive(Default)]
pub struct Recorder {
    pub calls: Vec<Call>,
    pub on_enter: HashMap<StateId, Vec<Action>>,
    pub on_exit: HashMap<StateId, Vec<Action>>,
    pub on_do: HashMap<StateId, Vec<Action>>,
    /// Stop the loop once this many do actions have run.
    pub stop_after_do: Option<usize>,
    pub names: Vec<&'static str>,
}

#[allow(dead_code)]
impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(mut self, state: StateId, action: Action) -> Self {
        self.on_enter.entry(state).or_default().push(action);
        self
    }

    pub fn exit(mut self, state: StateId, action: Action) -> Self {
        self.on_exit.entry(state).or_default().push(action);
        self
    }

    pub fn during(mut self, state: StateId, action: Action) -> Self {
        self.on_do.entry(state).or_default().push(action);
        self
    }

    pub fn stop_after(mut self, ticks: usize) -> Self {
        self.stop_after_do = Some(ticks);
        self
    }

    pub fn named(mut self, names: &[&'static str]) -> Self {
        self.names = names.to_vec();
        self
    }

    pub fn entries(&self) -> Vec<StateId> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Enter(s, _) => Some(*s),
                _ => None,
            })
            .collect()
    }

    pub fn do_count(&self) -> usize {
        self.calls.iter().filter(|c| matches!(c, Call::Do(_))).count()
    }

    /// Calls other than do actions.
    pub fn transitions(&self) -> Vec<Call> {
        self.calls
            .iter()
            .filter(|c| !matches!(c, Call::Do(_)))
            .cloned()
            .collect()
    }

    fn run(&mut self, fsm: &mut Machine, actions: Option<Vec<Action>>) {
        for action in actions.unwrap_or_default() {
            match action {
                Action::Raise(event) => {
                    let _ = fsm.process_event(event, self);
                }
                Action::Force(dest, label) => {
                    let _ = fsm.force_transition(dest, label, self);
                }
                Action::StartTimer(id, d) => fsm.start_timer(id, d),
                Action::CancelTimer(id) => fsm.cancel_timer(id),
                Action::Stop => fsm.stop(),
            }
        }
    }
}

impl StateHandler for Recorder {
    fn state_entered(&mut self, fsm: &mut Machine, state: StateId, event: Option<&str>) {
        self.calls.push(Call::Enter(state, event.map(str::to_owned)));
        let actions = self.on_enter.get(&state).cloned();
        self.run(fsm, actions);
    }

    fn state_left(&mut self, fsm: &mut Machine, state: StateId, event: &str) {
        self.calls.push(Call::Exit(state, event.to_owned()));
        let actions = self.on_exit.get(&state).cloned();
        self.run(fsm, actions);
    }

    fn state_do(&mut self, fsm: &mut Machine, state: StateId) {
        self.calls.push(Call::Do(state));
        let actions = self.on_do.get(&state).cloned();
        self.run(fsm, actions);
        if self.stop_after_do.is_some_and(|n| self.do_count() >= n) {
            fsm.stop();
        }
    }

    fn state_name(&self, state: StateId) -> Option<&'static str> {
        self.names.get(state).copied()
    }
}

// ── Builders ──────────────────────────────────────────────────

/// Model on a manual clock that also serves as the tick delay.
#[allow(dead_code)]
pub fn manual_model(states: usize, handler: Recorder) -> (Model<Recorder>, ManualClock) {
    manual_model_with(states, handler, ModelConfig::default())
}

#[allow(dead_code)]
pub fn manual_model_with(
    states: usize,
    handler: Recorder,
    config: ModelConfig,
) -> (Model<Recorder>, ManualClock) {
    let clock = ManualClock::new();
    let model = Model::with_config(states, handler, config, clock.clone(), clock.clone())
        .expect("valid model");
    (model, clock)
}
