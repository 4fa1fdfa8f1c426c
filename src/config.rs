//! Runtime configuration parameters
//!
//! Tunables for the run loop and dispatch engine.  Values default to the
//! classic 10 Hz poll rate and can be overridden from a JSON document.

use core::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Run loop and dispatch configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Poll tick period (milliseconds)
    pub poll_interval_ms: u32,
    /// Deepest allowed nesting of dispatches started from inside callbacks
    pub max_dispatch_depth: u8,
    /// Entry/exit/do actions taking longer than this are reported (milliseconds)
    pub callback_budget_ms: u32,
    /// Log every transition at `info` (otherwise `debug`)
    pub log_transitions: bool,
    /// Keep a ring of recent transitions for inspection
    pub history_enabled: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100, // 10 Hz
            max_dispatch_depth: 8,
            callback_budget_ms: 50,
            log_transitions: true,
            history_enabled: true,
        }
    }
}

impl ModelConfig {
    /// Poll tick period as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(u64::from(self.poll_interval_ms))
    }

    /// Check every field for a usable range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed("poll_interval_ms must be > 0"));
        }
        if self.max_dispatch_depth == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_dispatch_depth must be > 0",
            ));
        }
        if self.callback_budget_ms > self.poll_interval_ms {
            return Err(ConfigError::ValidationFailed(
                "callback_budget_ms must not exceed poll_interval_ms",
            ));
        }
        Ok(())
    }

    /// Parse a JSON document (missing fields take defaults) and validate it.
    ///
    /// A document that shortens the poll interval without setting
    /// `callback_budget_ms` gets a budget of one interval.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let doc: serde_json::Value =
            serde_json::from_str(text).map_err(|_| ConfigError::Malformed)?;
        let budget_given = doc.get("callback_budget_ms").is_some();
        let mut config: Self = serde_json::from_value(doc).map_err(|_| ConfigError::Malformed)?;
        if !budget_given {
            config.callback_budget_ms = config.callback_budget_ms.min(config.poll_interval_ms);
        }
        config.validate()?;
        Ok(config)
    }
}
