//! Example controllers built on the state model.
//!
//! Controllers reach hardware only through the port traits in [`ports`]
//! and the input traits in [`crate::drivers`] / [`crate::sensors`], so
//! they run unchanged against the simulation adapters.
//!
//! | Controller | Handler style                   | States |
//! |------------|---------------------------------|--------|
//! | `gate`     | `StateHandler` on a closed enum | 5      |
//! | `trivia`   | function-pointer `StateTable`   | 8      |

pub mod gate;
pub mod ports;
pub mod trivia;
