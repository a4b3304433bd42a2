//! Event values handed to listeners.
//!
//! An emission is described by an [`EventIn`] supplied by the caller. The
//! dispatcher turns it into one [`EmittedEvent`] per matched name and shares
//! that value with every listener of the emission.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::Result;
use crate::listener::Listener;

/// Reserved channel that receives listener failures.
pub const ERROR_EVENT: &str = "error";

/// Raised before a listener is registered.
pub const NEW_LISTENER_EVENT: &str = "emitter-new-listener";

/// Raised after a listener is removed.
pub const REMOVE_LISTENER_EVENT: &str = "emitter-remove-listener";

/// Raised when a pattern holds more listeners than the configured limit.
pub const MEMORY_LEAK_EVENT: &str = "emitter-memory-leak";

/// Error value carried by events. Shared so every listener sees the same failure.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync>;

/// Caller-supplied contents of an emission.
#[derive(Debug, Clone, Default)]
pub struct EventIn {
    /// Human-readable message.
    pub message: Option<String>,
    /// Untyped payload.
    pub payload: Option<Value>,
    /// Failure associated with the event.
    pub error: Option<SharedError>,
    /// How long the reported operation took.
    pub measurement: Option<Duration>,
}

impl EventIn {
    /// Creates an empty event.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Sets the payload.
    pub fn with_payload(mut self, payload: impl Into<Value>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    /// Attaches an error.
    pub fn with_error<E>(mut self, error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.error = Some(Arc::new(error));
        self
    }

    /// Attaches an already shared error.
    pub fn with_shared_error(mut self, error: SharedError) -> Self {
        self.error = Some(error);
        self
    }

    /// Sets the measurement.
    pub fn with_measurement(mut self, measurement: Duration) -> Self {
        self.measurement = Some(measurement);
        self
    }
}

/// Event as observed by listeners.
///
/// Built once per matched name and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct EmittedEvent {
    /// Concrete name that was emitted.
    pub event: String,
    /// Human-readable message.
    pub message: Option<String>,
    /// Untyped payload.
    pub payload: Option<Value>,
    /// Failure associated with the event.
    pub error: Option<SharedError>,
    /// How long the reported operation took.
    pub measurement: Option<Duration>,
    /// Listener affected by a lifecycle notification.
    pub listener: Option<Listener>,
}

impl EmittedEvent {
    pub(crate) fn new(name: &str, input: &EventIn, listener: Option<&Listener>) -> Self {
        Self {
            event: name.to_string(),
            message: input.message.clone(),
            payload: input.payload.clone(),
            error: input.error.clone(),
            measurement: input.measurement,
            listener: listener.cloned(),
        }
    }

    /// Deserializes the payload into `T`. A missing payload is read as JSON `null`.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T> {
        let value = self.payload.clone().unwrap_or(Value::Null);
        Ok(serde_json::from_value(value)?)
    }

    /// Returns the error message, if an error is attached.
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(|e| e.to_string())
    }

    /// Input for re-routing a listener failure to the error channel.
    pub(crate) fn to_error_input(&self, failure: SharedError) -> EventIn {
        EventIn {
            message: self.message.clone(),
            payload: self.payload.clone(),
            error: Some(failure),
            measurement: self.measurement,
        }
    }
}

/// One or more event names or patterns.
///
/// Every operation that takes names processes each entry independently.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EventNames(Vec<String>);

impl EventNames {
    /// Iterates over the names in order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Returns the names as a slice.
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Returns the number of names.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no names.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for EventNames {
    fn from(name: &str) -> Self {
        Self(vec![name.to_string()])
    }
}

impl From<String> for EventNames {
    fn from(name: String) -> Self {
        Self(vec![name])
    }
}

impl From<&String> for EventNames {
    fn from(name: &String) -> Self {
        Self(vec![name.clone()])
    }
}

impl From<Vec<String>> for EventNames {
    fn from(names: Vec<String>) -> Self {
        Self(names)
    }
}

impl From<Vec<&str>> for EventNames {
    fn from(names: Vec<&str>) -> Self {
        Self(names.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for EventNames {
    fn from(names: &[&str]) -> Self {
        Self(names.iter().map(|n| n.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for EventNames {
    fn from(names: [&str; N]) -> Self {
        Self(names.iter().map(|n| n.to_string()).collect())
    }
}
