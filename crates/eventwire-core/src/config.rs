//! Emitter configuration.
//!
//! Options are fixed at construction. Only `max_listeners` can change later,
//! through [`EventEmitter::set_max_listeners`](crate::EventEmitter::set_max_listeners).
//!
//! # Environment Variables
//!
//! [`EmitterConfig::from_env`] overlays these on the defaults:
//!
//! - `EVENTWIRE_DELIMITER`
//! - `EVENTWIRE_MAX_LISTENERS`
//! - `EVENTWIRE_USE_WILDCARDS`
//! - `EVENTWIRE_NEW_LISTENER_EVENT`
//! - `EVENTWIRE_REMOVE_LISTENER_EVENT`
//! - `EVENTWIRE_VERBOSE_MEMORY_LEAK`
//! - `EVENTWIRE_IGNORE_ERRORS`

use serde::{Deserialize, Serialize};

use crate::error::{EmitterError, Result};

/// Environment variable for the segment delimiter.
pub const DELIMITER_ENV: &str = "EVENTWIRE_DELIMITER";

/// Environment variable for the per-pattern listener limit.
pub const MAX_LISTENERS_ENV: &str = "EVENTWIRE_MAX_LISTENERS";

/// Environment variable toggling wildcard matching.
pub const USE_WILDCARDS_ENV: &str = "EVENTWIRE_USE_WILDCARDS";

/// Environment variable toggling new-listener notifications.
pub const NEW_LISTENER_EVENT_ENV: &str = "EVENTWIRE_NEW_LISTENER_EVENT";

/// Environment variable toggling remove-listener notifications.
pub const REMOVE_LISTENER_EVENT_ENV: &str = "EVENTWIRE_REMOVE_LISTENER_EVENT";

/// Environment variable toggling leak warnings.
pub const VERBOSE_MEMORY_LEAK_ENV: &str = "EVENTWIRE_VERBOSE_MEMORY_LEAK";

/// Environment variable toggling error swallowing.
pub const IGNORE_ERRORS_ENV: &str = "EVENTWIRE_IGNORE_ERRORS";

/// Default per-pattern listener limit.
pub const DEFAULT_MAX_LISTENERS: usize = 20;

/// Default segment delimiter.
pub const DEFAULT_DELIMITER: &str = ":";

/// Configuration for an [`EventEmitter`](crate::EventEmitter).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EmitterConfig {
    /// Separator between pattern segments.
    pub delimiter: String,
    /// Listener count per pattern above which a leak is reported. 0 disables the check.
    pub max_listeners: usize,
    /// Whether `*` and `**` act as wildcards.
    pub use_wildcards: bool,
    /// Raise `emitter-new-listener` on registration.
    pub new_listener_event: bool,
    /// Raise `emitter-remove-listener` on removal.
    pub remove_listener_event: bool,
    /// Report listener counts above `max_listeners`.
    pub verbose_memory_leak: bool,
    /// Absorb listener failures that no `"error"` listener handles.
    pub ignore_errors: bool,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER.to_string(),
            max_listeners: DEFAULT_MAX_LISTENERS,
            use_wildcards: true,
            new_listener_event: true,
            remove_listener_event: false,
            verbose_memory_leak: true,
            ignore_errors: true,
        }
    }
}

impl EmitterConfig {
    /// Creates a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the delimiter.
    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    /// Sets the listener limit.
    pub fn with_max_listeners(mut self, max: usize) -> Self {
        self.max_listeners = max;
        self
    }

    /// Enables or disables wildcard matching.
    pub fn with_wildcards(mut self, enabled: bool) -> Self {
        self.use_wildcards = enabled;
        self
    }

    /// Enables or disables new-listener notifications.
    pub fn with_new_listener_event(mut self, enabled: bool) -> Self {
        self.new_listener_event = enabled;
        self
    }

    /// Enables or disables remove-listener notifications.
    pub fn with_remove_listener_event(mut self, enabled: bool) -> Self {
        self.remove_listener_event = enabled;
        self
    }

    /// Enables or disables leak warnings.
    pub fn with_verbose_memory_leak(mut self, enabled: bool) -> Self {
        self.verbose_memory_leak = enabled;
        self
    }

    /// Enables or disables error swallowing.
    pub fn with_ignore_errors(mut self, enabled: bool) -> Self {
        self.ignore_errors = enabled;
        self
    }

    /// Builds a config from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup, starting from defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(delimiter) = lookup(DELIMITER_ENV) {
            config.delimiter = delimiter;
        }
        if let Some(raw) = lookup(MAX_LISTENERS_ENV) {
            config.max_listeners = raw.trim().parse().map_err(|_| {
                EmitterError::InvalidConfig(format!("{}: not a number: {}", MAX_LISTENERS_ENV, raw))
            })?;
        }

        let flags: [(&str, &mut bool); 5] = [
            (USE_WILDCARDS_ENV, &mut config.use_wildcards),
            (NEW_LISTENER_EVENT_ENV, &mut config.new_listener_event),
            (REMOVE_LISTENER_EVENT_ENV, &mut config.remove_listener_event),
            (VERBOSE_MEMORY_LEAK_ENV, &mut config.verbose_memory_leak),
            (IGNORE_ERRORS_ENV, &mut config.ignore_errors),
        ];
        for (key, slot) in flags {
            if let Some(raw) = lookup(key) {
                *slot = parse_flag(key, &raw)?;
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks that the delimiter can split patterns.
    pub fn validate(&self) -> Result<()> {
        if self.delimiter.is_empty() {
            return Err(EmitterError::InvalidConfig(
                "delimiter must not be empty".to_string(),
            ));
        }
        if self.delimiter.contains('*') {
            return Err(EmitterError::InvalidConfig(format!(
                "delimiter must not contain '*': {:?}",
                self.delimiter
            )));
        }
        Ok(())
    }
}

fn parse_flag(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(EmitterError::InvalidConfig(format!(
            "{}: not a boolean: {}",
            key, raw
        ))),
    }
}
