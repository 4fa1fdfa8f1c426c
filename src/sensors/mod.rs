//! Digital sensors polled directly by application do-actions.
//!
//! Unlike buttons, sensors are not registered with the model: a
//! controller reads them in its `state_do` and raises custom events
//! itself (e.g. a PIR sensor tripping raises `motion`).

use embedded_hal::digital::InputPin;
use log::warn;

/// A binary condition a controller can poll.
pub trait TripSensor {
    /// True while the sensed condition holds.
    fn is_tripped(&mut self) -> bool;
}

/// PIR / proximity style sensor on a digital input.
pub struct DigitalSensor<P> {
    name: &'static str,
    pin: P,
    low_active: bool,
}

impl<P: InputPin> DigitalSensor<P> {
    /// Sensor that trips when the pin reads low.
    pub fn new(name: &'static str, pin: P) -> Self {
        Self {
            name,
            pin,
            low_active: true,
        }
    }

    /// Sensor that trips when the pin reads high (e.g. a PIR module).
    pub fn high_active(name: &'static str, pin: P) -> Self {
        Self {
            name,
            pin,
            low_active: false,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<P: InputPin> TripSensor for DigitalSensor<P> {
    fn is_tripped(&mut self) -> bool {
        match self.pin.is_high() {
            Ok(high) => high != self.low_active,
            Err(_) => {
                warn!("sensor '{}': read failed, treating as not tripped", self.name);
                false
            }
        }
    }
}
