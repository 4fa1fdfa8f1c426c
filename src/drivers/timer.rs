//! One-shot countdown timers.
//!
//! A timer is armed by `start`, disarmed by `cancel`, and reports expiry
//! through `check_expired` exactly once per arming.  The run loop checks
//! every registered timer once per tick, so the effective resolution is
//! one poll interval.

use core::time::Duration;

use crate::adapters::time::Clock;

/// Countdown timer contract consumed by the run loop.
pub trait CountdownTimer {
    /// Arm (or re-arm) the timer to expire after `duration`.
    fn start(&mut self, duration: Duration);

    /// Disarm.  No expiry is reported for the cancelled arming.
    fn cancel(&mut self);

    /// True at most once per `start`, at the first check at or after the deadline.
    fn check_expired(&mut self) -> bool;
}

/// Deadline-based software timer driven by a [`Clock`].
pub struct SoftwareTimer<C> {
    clock: C,
    deadline_ms: Option<u64>,
}

impl<C: Clock> SoftwareTimer<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            deadline_ms: None,
        }
    }

    /// Whether the timer is armed and has not yet reported expiry.
    pub fn is_armed(&self) -> bool {
        self.deadline_ms.is_some()
    }

    /// Time left before expiry; `None` when disarmed.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline_ms
            .map(|d| Duration::from_millis(d.saturating_sub(self.clock.now_ms())))
    }
}

impl<C: Clock> CountdownTimer for SoftwareTimer<C> {
    fn start(&mut self, duration: Duration) {
        let ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self.deadline_ms = Some(self.clock.now_ms().saturating_add(ms));
    }

    fn cancel(&mut self) {
        self.deadline_ms = None;
    }

    fn check_expired(&mut self) -> bool {
        match self.deadline_ms {
            Some(deadline) if self.clock.now_ms() >= deadline => {
                self.deadline_ms = None;
                true
            }
            _ => false,
        }
    }
}
