//! Simulation adapters for host runs.
//!
//! Implement the output ports by logging each command and remembering
//! the resulting device state, and provide [`SimPin`], a digital input
//! whose level any thread can set.  Used by the simulator binary and by
//! controller tests.

use core::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use embedded_hal::digital::{ErrorType, InputPin};
use log::info;

use crate::app::ports::{Buzzer, LightStrip, OFF, Rgb, Servo, TextDisplay};

// ── Inputs ────────────────────────────────────────────────────

/// Digital input backed by a shared flag.  Clones observe the same level.
#[derive(Debug, Clone, Default)]
pub struct SimPin {
    high: Arc<AtomicBool>,
}

impl SimPin {
    pub fn new(high: bool) -> Self {
        Self {
            high: Arc::new(AtomicBool::new(high)),
        }
    }

    pub fn set(&self, high: bool) {
        self.high.store(high, Ordering::Release);
    }

    /// Flip the level; returns the new level.
    pub fn toggle(&self) -> bool {
        !self.high.fetch_xor(true, Ordering::AcqRel)
    }

    pub fn level(&self) -> bool {
        self.high.load(Ordering::Acquire)
    }
}

impl ErrorType for SimPin {
    type Error = Infallible;
}

impl InputPin for SimPin {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.level())
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(!self.level())
    }
}

// ── Outputs ───────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct LogServo {
    name: &'static str,
    angle: Option<u16>,
}

impl LogServo {
    pub fn new(name: &'static str) -> Self {
        Self { name, angle: None }
    }

    /// Last commanded angle.
    pub fn angle(&self) -> Option<u16> {
        self.angle
    }
}

impl Servo for LogServo {
    fn set_angle(&mut self, degrees: u16) {
        info!("SERVO | {} -> {}\u{00b0}", self.name, degrees);
        self.angle = Some(degrees);
    }
}

#[derive(Debug, Clone)]
pub struct LogDisplay {
    name: &'static str,
    text: String,
}

impl LogDisplay {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            text: String::new(),
        }
    }

    /// Text currently shown (empty after `clear`).
    pub fn text(&self) -> &str {
        &self.text
    }
}

impl TextDisplay for LogDisplay {
    fn show_text(&mut self, text: &str) {
        info!("LCD   | {}: \"{}\"", self.name, text);
        text.clone_into(&mut self.text);
    }

    fn clear(&mut self) {
        self.text.clear();
    }
}

#[derive(Debug, Clone, Default)]
pub struct LogBuzzer {
    beeps: Vec<(u16, u32)>,
}

impl LogBuzzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `(note, duration)` played so far.
    pub fn beeps(&self) -> &[(u16, u32)] {
        &self.beeps
    }
}

impl Buzzer for LogBuzzer {
    fn beep(&mut self, note_hz: u16, duration_ms: u32) {
        info!("BUZZ  | {}Hz for {}ms", note_hz, duration_ms);
        self.beeps.push((note_hz, duration_ms));
    }
}

#[derive(Debug, Clone)]
pub struct LogLightStrip {
    pixels: Vec<Rgb>,
}

impl LogLightStrip {
    pub fn new(len: usize) -> Self {
        Self {
            pixels: vec![OFF; len],
        }
    }

    pub fn pixels(&self) -> &[Rgb] {
        &self.pixels
    }
}

impl LightStrip for LogLightStrip {
    fn set_color(&mut self, colour: Rgb) {
        info!("LEDS  | all -> {:?}", colour);
        self.pixels.fill(colour);
    }

    fn set_pixel(&mut self, index: usize, colour: Rgb) {
        match self.pixels.get_mut(index) {
            Some(px) => *px = colour,
            None => log::warn!("LEDS  | pixel {} out of range", index),
        }
    }
}
