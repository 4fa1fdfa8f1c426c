//! Transition table: `(source state, event) -> destination`.
//!
//! One row per state, each row a short list of `(event, destination)`
//! pairs.  Rows are tiny in practice (a handful of events matter to any
//! given state), so lookup is a linear scan.

use super::StateId;
use crate::error::ConfigError;
use crate::events::{EventName, event_name};

#[derive(Debug, Clone)]
pub struct TransitionTable {
    rows: Vec<Vec<(EventName, StateId)>>,
}

impl TransitionTable {
    pub fn new(state_count: usize) -> Self {
        Self {
            rows: vec![Vec::new(); state_count],
        }
    }

    pub fn state_count(&self) -> usize {
        self.rows.len()
    }

    /// Register `source --e--> dest` for every `e` in `events`.
    ///
    /// All-or-nothing: every pair is checked before any is inserted, so a
    /// rejected call leaves the table unchanged.  Registered-ness of the
    /// event names is the caller's concern.
    pub fn insert_all(
        &mut self,
        source: StateId,
        events: &[&str],
        dest: StateId,
    ) -> Result<(), ConfigError> {
        self.check_state(source)?;
        self.check_state(dest)?;
        if events.is_empty() {
            return Err(ConfigError::EmptyEventList { state: source });
        }

        let mut pending: Vec<EventName> = Vec::with_capacity(events.len());
        for &raw in events {
            let name = event_name(raw)?;
            if let Some(existing) = self.lookup(source, &name) {
                return Err(ConfigError::ConflictingTransition {
                    state: source,
                    event: name,
                    existing,
                    requested: dest,
                });
            }
            if pending.contains(&name) {
                return Err(ConfigError::ConflictingTransition {
                    state: source,
                    event: name,
                    existing: dest,
                    requested: dest,
                });
            }
            pending.push(name);
        }

        self.rows[source].extend(pending.into_iter().map(|name| (name, dest)));
        Ok(())
    }

    /// Destination for `event` in `state`; `None` means "ignore".
    pub fn lookup(&self, state: StateId, event: &str) -> Option<StateId> {
        self.rows
            .get(state)?
            .iter()
            .find(|(name, _)| name.as_str() == event)
            .map(|&(_, dest)| dest)
    }

    /// Events that `state` reacts to, in registration order.
    pub fn events_from(&self, state: StateId) -> impl Iterator<Item = (&str, StateId)> {
        self.rows
            .get(state)
            .into_iter()
            .flatten()
            .map(|(name, dest)| (name.as_str(), *dest))
    }

    /// Total number of `(state, event)` entries.
    pub fn len(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn check_state(&self, state: StateId) -> Result<(), ConfigError> {
        if state < self.rows.len() {
            Ok(())
        } else {
            Err(ConfigError::InvalidState {
                state,
                state_count: self.rows.len(),
            })
        }
    }
}
