//! `statemodel-sim`: run an example controller against simulated pins.
//!
//! ```text
//!  stdin thread ──▶ SimPin levels ──────────▶ ┌──────────────┐
//!       │                                     │  Model::run  │──▶ LogServo / LogDisplay / ...
//!       └────────▶ EVENT_INBOX.post(name) ──▶ │  (main thread)│
//!  Ctrl-C ───────▶ StopHandle::stop ────────▶ └──────────────┘
//! ```
//!
//! Commands (one per line): a button name pulses that button, a sensor
//! name toggles that sensor, `post <event>` raises an event through the
//! inbox, `q` quits.

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use log::{info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use statemodel::adapters::sim::{LogDisplay, LogServo, SimPin};
use statemodel::adapters::time::{MonotonicClock, StdDelay};
use statemodel::app::gate::{Gate, GateController, GateState};
use statemodel::app::trivia::{self, ANSWER_BUTTONS, SimProps, TEST_BUTTON};
use statemodel::drivers::button::{DEBOUNCE_MS, DebouncedButton};
use statemodel::drivers::timer::SoftwareTimer;
use statemodel::sensors::DigitalSensor;
use statemodel::{EventInbox, Model, ModelConfig, StateHandler, StopHandle};

static EVENT_INBOX: EventInbox = EventInbox::new();

// ── CLI ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Controller {
    /// Motion-activated gate (button `b`, sensors `motion` and `presence`)
    Gate,
    /// Trivia game (buttons Red/Green/Blue/Yellow/Test, sensor `motion`)
    Trivia,
}

#[derive(Parser)]
#[command(
    name = "statemodel-sim",
    about = "Run a state-model controller against simulated hardware"
)]
struct Cli {
    /// JSON model configuration; defaults apply when omitted
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Controller to run
    #[arg(long, value_enum, default_value_t = Controller::Gate)]
    controller: Controller,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

// ── Simulated inputs ──────────────────────────────────────────

enum Input {
    /// Active-low push button: a command presses then releases it.
    Button(SimPin),
    /// High-active sensor: a command flips it.
    Sensor(SimPin),
}

struct Inputs {
    named: Vec<(String, Input)>,
    /// How long a button is held per command.
    hold: Duration,
}

impl Inputs {
    fn new(config: &ModelConfig) -> Self {
        let hold = config.poll_interval() * 3 + Duration::from_millis(u64::from(DEBOUNCE_MS));
        Self {
            named: Vec::new(),
            hold,
        }
    }

    fn button(&mut self, name: &str) -> DebouncedButton<SimPin, MonotonicClock> {
        let pin = SimPin::new(true);
        self.named.push((name.to_owned(), Input::Button(pin.clone())));
        DebouncedButton::new(pin, MonotonicClock::new())
    }

    fn sensor(&mut self, name: &'static str) -> DigitalSensor<SimPin> {
        let pin = SimPin::new(false);
        self.named.push((name.to_owned(), Input::Sensor(pin.clone())));
        DigitalSensor::high_active(name, pin)
    }

    fn names(&self) -> Vec<&str> {
        self.named.iter().map(|(n, _)| n.as_str()).collect()
    }

    fn apply(&self, command: &str) -> bool {
        let Some((_, input)) = self.named.iter().find(|(n, _)| n == command) else {
            return false;
        };
        match input {
            Input::Button(pin) => {
                pin.set(false);
                thread::sleep(self.hold);
                pin.set(true);
                info!("SIM   | button '{}' pulsed", command);
            }
            Input::Sensor(pin) => {
                let level = pin.toggle();
                info!("SIM   | sensor '{}' {}", command, if level { "on" } else { "off" });
            }
        }
        true
    }
}

/// Read commands until `q` or end of input.
fn spawn_console(inputs: Inputs, stop: StopHandle) -> Result<()> {
    thread::Builder::new()
        .name("console".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                let command = line.trim();
                match command {
                    "" => {}
                    "q" | "quit" => break,
                    "help" => println!(
                        "inputs: {}  |  post <event>  |  q",
                        inputs.names().join(", ")
                    ),
                    _ => {
                        if let Some(event) = command.strip_prefix("post ") {
                            if let Err(e) = EVENT_INBOX.post(event.trim()) {
                                warn!("post '{}' rejected: {}", event.trim(), e);
                            }
                        } else if !inputs.apply(command) {
                            warn!("unknown command '{}' (try 'help')", command);
                        }
                    }
                }
                if !stop.is_running() {
                    return;
                }
            }
            stop.stop();
        })
        .context("failed to spawn console thread")?;
    Ok(())
}

// ── Controllers ───────────────────────────────────────────────

type SimGate = GateController<LogServo, DigitalSensor<SimPin>, DigitalSensor<SimPin>, LogDisplay>;

fn build_gate(config: ModelConfig, inputs: &mut Inputs) -> Result<Model<SimGate>> {
    let gate = Gate::new(
        LogServo::new("gate"),
        inputs.sensor("motion"),
        inputs.sensor("presence"),
    );
    let controller = GateController::new(gate, LogDisplay::new("lcd"));
    let mut model = Model::with_config(
        GateState::COUNT,
        controller,
        config,
        MonotonicClock::new(),
        StdDelay,
    )
    .context("invalid model configuration")?;
    GateController::configure(
        &mut model,
        inputs.button("b"),
        SoftwareTimer::new(MonotonicClock::new()),
    )
    .context("failed to configure gate controller")?;
    Ok(model)
}

fn build_trivia(
    config: ModelConfig,
    inputs: &mut Inputs,
) -> Result<Model<trivia::TriviaTable<SimProps>>> {
    let props = SimProps::new().with_motion(inputs.sensor("motion"));
    let mut model = Model::with_config(
        trivia::state::COUNT,
        trivia::table(props),
        config,
        MonotonicClock::new(),
        StdDelay,
    )
    .context("invalid model configuration")?;
    let answers = ANSWER_BUTTONS.map(|name| inputs.button(name));
    trivia::configure(
        &mut model,
        answers,
        inputs.button(TEST_BUTTON),
        SoftwareTimer::new(MonotonicClock::new()),
        SoftwareTimer::new(MonotonicClock::new()),
    )
    .context("failed to configure trivia controller")?;
    Ok(model)
}

fn run<H: StateHandler>(mut model: Model<H>, inputs: Inputs) -> Result<()> {
    model.attach_inbox(&EVENT_INBOX);
    // Armed before any stop source exists, so an early Ctrl-C or EOF sticks.
    let stop = model.arm();

    let ctrlc_stop = stop.clone();
    ctrlc::set_handler(move || ctrlc_stop.stop()).context("failed to install Ctrl-C handler")?;

    info!("inputs: {} (type 'help')", inputs.names().join(", "));
    spawn_console(inputs, stop)?;

    model.run_armed().context("state model halted")?;
    info!(
        "stopped in state {} after {} transitions",
        model.state(),
        model.machine().dispatch_count()
    );
    Ok(())
}

// ── Entry ─────────────────────────────────────────────────────

fn load_config(path: Option<&Path>) -> Result<ModelConfig> {
    let Some(path) = path else {
        return Ok(ModelConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    ModelConfig::from_json(&text).with_context(|| format!("invalid config {}", path.display()))
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with(fmt::layer().with_target(false))
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(cli.config.as_deref())?;
    let mut inputs = Inputs::new(&config);
    info!("statemodel-sim: {:?} controller, {:?}", cli.controller, config);

    match cli.controller {
        Controller::Gate => {
            let model = build_gate(config, &mut inputs)?;
            run(model, inputs)
        }
        Controller::Trivia => {
            let model = build_trivia(config, &mut inputs)?;
            run(model, inputs)
        }
    }
}
