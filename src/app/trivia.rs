//! Trivia game controller built on a [`StateTable`].
//!
//! ```text
//!  STANDBY ──[tripped | Test_press]──▶ INTRO ──[pause]──▶ QUESTION ◀─────────────┐
//!     ▲                                                   │      │              │
//!     │                                  [colour_press]   │      │ [game_timer] │
//!     │                                                   ▼      ▼              │
//!     │                              RESULT ◀──[pause]── ANSWER  TIMEOUT        │
//!     │                                │ forced: win / lose / next_question ────┘
//!     │                                ▼                          │ [pause]
//!     ├────────[pause]──────────── WIN                            ▼
//!     └────────[pause]──────────── LOSE ◀─────────────────────────┘
//! ```
//!
//! Every multi-second pause is a `pause` timer started on entry and
//! consumed as `pause_timeout`, so the run loop keeps polling buttons
//! while the game waits.  RESULT decides its successor on entry and
//! leaves by forced transition.

use core::time::Duration;

use log::{info, warn};

use crate::adapters::sim::{LogBuzzer, LogDisplay, LogLightStrip, LogServo, SimPin};
use crate::app::ports::{
    BLUE, Buzzer, GREEN, LightStrip, ORANGE, RED, Servo, TextDisplay, YELLOW, notes,
};
use crate::drivers::button::EdgeInput;
use crate::drivers::timer::CountdownTimer;
use crate::error::ConfigError;
use crate::events::TimerId;
use crate::fsm::{Machine, StateDescriptor, StateTable};
use crate::model::Model;
use crate::sensors::{DigitalSensor, TripSensor};

pub mod state {
    use crate::fsm::StateId;

    pub const STANDBY: StateId = 0;
    pub const INTRO: StateId = 1;
    pub const QUESTION: StateId = 2;
    pub const ANSWER: StateId = 3;
    pub const RESULT: StateId = 4;
    pub const TIMEOUT: StateId = 5;
    pub const WIN: StateId = 6;
    pub const LOSE: StateId = 7;

    pub const COUNT: usize = 8;
}

/// Answer buttons, in answer-index order.  Pixel `i` shows button `i`'s colour.
pub const ANSWER_BUTTONS: [&str; 4] = ["Red", "Green", "Blue", "Yellow"];
pub const TEST_BUTTON: &str = "Test";

pub const QUESTION_TIME: Duration = Duration::from_secs(15);
pub const INTRO_PAUSE: Duration = Duration::from_secs(1);
pub const ANSWER_PAUSE: Duration = Duration::from_secs(2);
pub const TIMEOUT_PAUSE: Duration = Duration::from_secs(2);
pub const WIN_HOLD: Duration = Duration::from_secs(5);
pub const LOSE_PAUSE: Duration = Duration::from_secs(3);

/// Correct answers needed to win a round.
pub const WIN_SCORE: u32 = 2;
/// Questions asked before a round is lost.
pub const QUESTIONS_PER_ROUND: u32 = 3;

pub const CANDY_OPEN_ANGLE: u16 = 90;
pub const CANDY_CLOSED_ANGLE: u16 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Question {
    pub text: &'static str,
    pub answers: [&'static str; 4],
    pub correct: usize,
}

pub const QUESTIONS: [Question; 3] = [
    Question {
        text: "What spooky creature flies on a broom?",
        answers: ["Witch", "Ghost", "Vampire", "Zombie"],
        correct: 0,
    },
    Question {
        text: "What do you carve at Halloween?",
        answers: ["Watermelons", "Pumpkins", "Turnips", "Cantaloupes"],
        correct: 1,
    },
    Question {
        text: "What colors are associated with Halloween?",
        answers: [
            "Red and Green",
            "Orange and Black",
            "Purple and Gold",
            "Blue and Silver",
        ],
        correct: 1,
    },
];

// ── Props ─────────────────────────────────────────────────────

/// The game's output hardware, plus an optional motion sensor.
pub trait TriviaProps {
    fn question_display(&mut self) -> &mut dyn TextDisplay;
    fn answer_display(&mut self) -> &mut dyn TextDisplay;
    fn buzzer(&mut self) -> &mut dyn Buzzer;
    fn lights(&mut self) -> &mut dyn LightStrip;
    fn candy_box(&mut self) -> &mut dyn Servo;

    fn motion(&mut self) -> Option<&mut dyn TripSensor> {
        None
    }
}

/// Props wired to the logging simulation adapters.
pub struct SimProps {
    pub question: LogDisplay,
    pub answer: LogDisplay,
    pub buzzer: LogBuzzer,
    pub lights: LogLightStrip,
    pub candy_box: LogServo,
    pub motion: Option<DigitalSensor<SimPin>>,
}

impl SimProps {
    pub fn new() -> Self {
        Self {
            question: LogDisplay::new("question"),
            answer: LogDisplay::new("answer"),
            buzzer: LogBuzzer::new(),
            lights: LogLightStrip::new(ANSWER_BUTTONS.len()),
            candy_box: LogServo::new("CandyBox"),
            motion: None,
        }
    }

    pub fn with_motion(mut self, sensor: DigitalSensor<SimPin>) -> Self {
        self.motion = Some(sensor);
        self
    }
}

impl Default for SimProps {
    fn default() -> Self {
        Self::new()
    }
}

impl TriviaProps for SimProps {
    fn question_display(&mut self) -> &mut dyn TextDisplay {
        &mut self.question
    }

    fn answer_display(&mut self) -> &mut dyn TextDisplay {
        &mut self.answer
    }

    fn buzzer(&mut self) -> &mut dyn Buzzer {
        &mut self.buzzer
    }

    fn lights(&mut self) -> &mut dyn LightStrip {
        &mut self.lights
    }

    fn candy_box(&mut self) -> &mut dyn Servo {
        &mut self.candy_box
    }

    fn motion(&mut self) -> Option<&mut dyn TripSensor> {
        self.motion.as_mut().map(|m| m as &mut dyn TripSensor)
    }
}

// ── Game context ──────────────────────────────────────────────

pub struct Trivia<P> {
    pub props: P,
    score: u32,
    asked: u32,
    /// Index into [`QUESTIONS`] of the question on screen.
    current: usize,
    /// Rotates across rounds so consecutive games open differently.
    next_question: usize,
    game_timer: Option<TimerId>,
    pause: Option<TimerId>,
}

impl<P: TriviaProps> Trivia<P> {
    pub fn new(props: P) -> Self {
        Self {
            props,
            score: 0,
            asked: 0,
            current: 0,
            next_question: 0,
            game_timer: None,
            pause: None,
        }
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn asked(&self) -> u32 {
        self.asked
    }

    pub fn current_question(&self) -> &Question {
        &QUESTIONS[self.current % QUESTIONS.len()]
    }

    fn ask_next(&mut self) {
        self.current = self.next_question % QUESTIONS.len();
        self.next_question = self.next_question.wrapping_add(1);
        self.asked += 1;
        let text = QUESTIONS[self.current].text;
        self.props.question_display().show_text(text);
    }

    fn set_answer_lights(&mut self) {
        let lights = self.props.lights();
        for (i, colour) in [RED, GREEN, BLUE, YELLOW].into_iter().enumerate() {
            lights.set_pixel(i, colour);
        }
    }

    fn start_pause(&self, fsm: &mut Machine, duration: Duration) {
        if let Some(id) = self.pause {
            fsm.start_timer(id, duration);
        }
    }

    fn cancel_pause(&self, fsm: &mut Machine) {
        if let Some(id) = self.pause {
            fsm.cancel_timer(id);
        }
    }
}

pub type TriviaTable<P> = StateTable<Trivia<P>>;

/// Index of the answer chosen by `event`, e.g. `"Blue_press"` is 2.
pub fn answer_index(event: &str) -> Option<usize> {
    let colour = event.strip_suffix("_press")?;
    ANSWER_BUTTONS.iter().position(|&b| b == colour)
}

// ── State actions ─────────────────────────────────────────────

fn standby_enter<P: TriviaProps>(t: &mut TriviaTable<P>, _: &mut Machine, _: Option<&str>) {
    let props = &mut t.ctx.props;
    props.question_display().show_text("Candy Troll");
    props.answer_display().show_text("Press Button");
    props.lights().off();
}

fn standby_do<P: TriviaProps>(t: &mut TriviaTable<P>, fsm: &mut Machine) {
    let tripped = t.ctx.props.motion().is_some_and(|m| m.is_tripped());
    if tripped {
        let _ = fsm.process_event("tripped", t);
    }
}

fn intro_enter<P: TriviaProps>(t: &mut TriviaTable<P>, fsm: &mut Machine, _: Option<&str>) {
    let g = &mut t.ctx;
    g.props.answer_display().clear();
    g.props.buzzer().beep(notes::DO, 250);
    g.props.lights().set_color(ORANGE);
    g.score = 0;
    g.asked = 0;
    g.ask_next();
    g.start_pause(fsm, INTRO_PAUSE);
}

fn question_enter<P: TriviaProps>(t: &mut TriviaTable<P>, fsm: &mut Machine, _: Option<&str>) {
    let g = &mut t.ctx;
    if let Some(id) = g.game_timer {
        fsm.start_timer(id, QUESTION_TIME);
    }
    g.props.lights().off();
    let answer = g.props.answer_display();
    answer.clear();
    answer.show_text(&format!("Time: {}", QUESTION_TIME.as_secs()));
    g.set_answer_lights();
}

fn question_exit<P: TriviaProps>(t: &mut TriviaTable<P>, fsm: &mut Machine, _: &str) {
    if let Some(id) = t.ctx.game_timer {
        fsm.cancel_timer(id);
    }
}

fn answer_enter<P: TriviaProps>(t: &mut TriviaTable<P>, fsm: &mut Machine, event: Option<&str>) {
    let g = &mut t.ctx;
    let Some(selected) = event.and_then(answer_index) else {
        warn!("trivia: answer state entered without an answer ({:?})", event);
        g.start_pause(fsm, ANSWER_PAUSE);
        return;
    };
    let question = *g.current_question();
    info!(
        "trivia: picked '{}' for \"{}\"",
        question.answers[selected], question.text
    );
    if selected == question.correct {
        g.score += 1;
        g.props.buzzer().beep(notes::MI, 500);
        g.props.lights().set_pixel(selected, GREEN);
        g.props.answer_display().show_text("Correct!");
    } else {
        g.props.buzzer().beep(notes::DO, 100);
        g.props.buzzer().beep(notes::RE, 100);
        g.props.lights().set_pixel(selected, RED);
        g.props.answer_display().show_text("Incorrect!");
    }
    g.start_pause(fsm, ANSWER_PAUSE);
}

fn result_enter<P: TriviaProps>(t: &mut TriviaTable<P>, fsm: &mut Machine, _: Option<&str>) {
    info!("trivia: score {}/{}", t.ctx.score, t.ctx.asked);
    let (dest, label) = if t.ctx.score >= WIN_SCORE {
        (state::WIN, "win")
    } else if t.ctx.asked >= QUESTIONS_PER_ROUND {
        (state::LOSE, "lose")
    } else {
        t.ctx.ask_next();
        (state::QUESTION, "next_question")
    };
    let _ = fsm.force_transition(dest, label, t);
}

fn timeout_enter<P: TriviaProps>(t: &mut TriviaTable<P>, fsm: &mut Machine, _: Option<&str>) {
    t.ctx.props.answer_display().show_text("Too Slow!");
    t.ctx.start_pause(fsm, TIMEOUT_PAUSE);
}

fn win_enter<P: TriviaProps>(t: &mut TriviaTable<P>, fsm: &mut Machine, _: Option<&str>) {
    let g = &mut t.ctx;
    g.props.question_display().show_text("You Win!");
    g.props.answer_display().clear();
    g.props.lights().set_color(GREEN);
    g.props.candy_box().set_angle(CANDY_OPEN_ANGLE);
    g.start_pause(fsm, WIN_HOLD);
}

fn win_exit<P: TriviaProps>(t: &mut TriviaTable<P>, fsm: &mut Machine, _: &str) {
    t.ctx.props.candy_box().set_angle(CANDY_CLOSED_ANGLE);
    t.ctx.cancel_pause(fsm);
}

fn lose_enter<P: TriviaProps>(t: &mut TriviaTable<P>, fsm: &mut Machine, _: Option<&str>) {
    let g = &mut t.ctx;
    g.props.question_display().show_text("Try Again");
    g.props.answer_display().clear();
    g.props.lights().set_color(RED);
    g.start_pause(fsm, LOSE_PAUSE);
}

/// Exit for every state that waits on `pause`.
fn pause_exit<P: TriviaProps>(t: &mut TriviaTable<P>, fsm: &mut Machine, _: &str) {
    t.ctx.cancel_pause(fsm);
}

fn descriptors<P: TriviaProps>() -> Vec<StateDescriptor<Trivia<P>>> {
    vec![
        StateDescriptor {
            on_enter: Some(standby_enter::<P>),
            on_do: Some(standby_do::<P>),
            ..StateDescriptor::named("Standby")
        },
        StateDescriptor {
            on_enter: Some(intro_enter::<P>),
            on_exit: Some(pause_exit::<P>),
            ..StateDescriptor::named("Intro")
        },
        StateDescriptor {
            on_enter: Some(question_enter::<P>),
            on_exit: Some(question_exit::<P>),
            ..StateDescriptor::named("Question")
        },
        StateDescriptor {
            on_enter: Some(answer_enter::<P>),
            on_exit: Some(pause_exit::<P>),
            ..StateDescriptor::named("Answer")
        },
        StateDescriptor {
            on_enter: Some(result_enter::<P>),
            ..StateDescriptor::named("Result")
        },
        StateDescriptor {
            on_enter: Some(timeout_enter::<P>),
            on_exit: Some(pause_exit::<P>),
            ..StateDescriptor::named("Timeout")
        },
        StateDescriptor {
            on_enter: Some(win_enter::<P>),
            on_exit: Some(win_exit::<P>),
            ..StateDescriptor::named("Win")
        },
        StateDescriptor {
            on_enter: Some(lose_enter::<P>),
            on_exit: Some(pause_exit::<P>),
            ..StateDescriptor::named("Lose")
        },
    ]
}

/// State table for a fresh game over `props`.
pub fn table<P: TriviaProps>(props: P) -> TriviaTable<P> {
    StateTable::new(descriptors::<P>(), Trivia::new(props))
}

/// Register the game's buttons, timers, events, and transitions on `model`.
pub fn configure<P, B, T>(
    model: &mut Model<TriviaTable<P>>,
    answer_buttons: [B; 4],
    test_button: B,
    game_timer: T,
    pause: T,
) -> Result<(), ConfigError>
where
    P: TriviaProps,
    B: EdgeInput + 'static,
    T: CountdownTimer + 'static,
{
    use state::*;

    for (name, button) in ANSWER_BUTTONS.iter().zip(answer_buttons) {
        model.add_button(name, button)?;
    }
    model.add_button(TEST_BUTTON, test_button)?;
    let game_timer = model.add_timer("game_timer", game_timer)?;
    let pause = model.add_timer("pause", pause)?;
    model.add_custom_event("tripped")?;

    let ctx = &mut model.handler_mut().ctx;
    ctx.game_timer = Some(game_timer);
    ctx.pause = Some(pause);

    model.add_transition(STANDBY, &["tripped", "Test_press"], INTRO)?;
    model.add_transition(INTRO, &["pause_timeout"], QUESTION)?;
    model.add_transition(
        QUESTION,
        &["Red_press", "Green_press", "Blue_press", "Yellow_press"],
        ANSWER,
    )?;
    model.add_transition(QUESTION, &["game_timer_timeout"], TIMEOUT)?;
    model.add_transition(ANSWER, &["pause_timeout"], RESULT)?;
    model.add_transition(TIMEOUT, &["pause_timeout"], LOSE)?;
    model.add_transition(WIN, &["pause_timeout"], STANDBY)?;
    model.add_transition(LOSE, &["pause_timeout"], STANDBY)?;
    Ok(())
}
