//! In-process pub/sub dispatch with hierarchical wildcard patterns.
//!
//! This crate provides the `EventEmitter` for routing named events with:
//! - Pattern subscriptions (`user:*`, `user:**`, `*`) over a configurable delimiter
//! - Ordered listener chains with prepend and once semantics
//! - Synchronous and sequentially awaited asynchronous emission
//! - Error routing through a reserved `"error"` channel
//! - A cancellable wait for the next matching event
//! - Listener leak detection
//!
//! # Example
//!
//! ```no_run
//! use eventwire_core::{EmitterConfig, EventEmitter, EventIn, ERROR_EVENT};
//! use serde_json::json;
//!
//! # async fn demo() -> eventwire_core::Result<()> {
//! let emitter = EventEmitter::with_config(EmitterConfig::from_env()?)?;
//!
//! // Subscribe to a whole namespace
//! emitter.on("order:**", |event| {
//!     println!("{}: {:?}", event.event, event.payload);
//!     Ok(())
//! });
//!
//! // Observe listener failures
//! emitter.on(ERROR_EVENT, |event| {
//!     eprintln!("listener failed: {:?}", event.error_message());
//!     Ok(())
//! });
//!
//! // Wait for one event
//! let shipped = emitter.wait_for("order:shipped");
//!
//! emitter.emit("order:placed", EventIn::new().with_payload(json!({"id": 1})))?;
//! emitter
//!     .emit_async("order:shipped", EventIn::new().with_message("on its way"))
//!     .await?;
//!
//! let event = shipped.await?;
//! assert_eq!(event.message.as_deref(), Some("on its way"));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod emitter;
pub mod error;
pub mod event;
pub mod listener;
pub mod pattern;
pub mod registry;
pub mod typed;
pub mod wait_for;

pub use config::EmitterConfig;
pub use emitter::EventEmitter;
pub use error::{EmitterError, Result};
pub use event::{
    EmittedEvent, EventIn, EventNames, SharedError, ERROR_EVENT, MEMORY_LEAK_EVENT,
    NEW_LISTENER_EVENT, REMOVE_LISTENER_EVENT,
};
pub use listener::{Listener, ListenerError, ListenerResult};
pub use pattern::{matches, MatchOptions, Pattern};
pub use typed::{EventType, TypedEvent, TypedWait};
pub use wait_for::{CancelHandle, WaitFor};
