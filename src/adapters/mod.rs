//! Adapters: concrete implementations of the port and driver traits.
//!
//! | Adapter | Implements                  | Connects to               |
//! |---------|-----------------------------|---------------------------|
//! | `sim`   | Servo, TextDisplay, Buzzer, | Log output / shared flags |
//! |         | LightStrip, InputPin        |                           |
//! | `time`  | Clock, DelayNs              | `std::time` / manual time |

pub mod sim;
pub mod time;
