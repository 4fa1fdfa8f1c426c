//! Port traits: the boundary between controllers and output hardware.
//!
//! ```text
//!   Controller (StateHandler) ──▶ Port trait ──▶ Adapter (driver / sim)
//! ```
//!
//! Output devices are fire-and-forget: controllers issue commands and
//! never branch on a result.  Adapters log their own failures.

/// RGB colour, each channel 0–255.
pub type Rgb = (u8, u8, u8);

pub const RED: Rgb = (255, 0, 0);
pub const GREEN: Rgb = (0, 255, 0);
pub const BLUE: Rgb = (0, 0, 255);
pub const YELLOW: Rgb = (255, 255, 0);
pub const ORANGE: Rgb = (255, 165, 0);
pub const OFF: Rgb = (0, 0, 0);

/// Tone frequencies (Hz) for [`Buzzer::beep`].
pub mod notes {
    pub const DO: u16 = 262;
    pub const RE: u16 = 294;
    pub const MI: u16 = 330;
}

/// Positional servo.
pub trait Servo {
    fn set_angle(&mut self, degrees: u16);
}

/// Character display (LCD).
pub trait TextDisplay {
    fn show_text(&mut self, text: &str);
    fn clear(&mut self);
}

/// Passive buzzer.
pub trait Buzzer {
    fn beep(&mut self, note_hz: u16, duration_ms: u32);
}

/// Addressable LED strip.
pub trait LightStrip {
    fn set_color(&mut self, colour: Rgb);
    fn set_pixel(&mut self, index: usize, colour: Rgb);

    fn off(&mut self) {
        self.set_color(OFF);
    }
}
