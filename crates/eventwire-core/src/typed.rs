//! Statically typed events on top of the untyped dispatcher.
//!
//! An [`EventType`] ties an event name to a payload type. The dispatcher still
//! carries JSON; conversion happens at the call site.

use std::future::Future;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::emitter::EventEmitter;
use crate::error::Result;
use crate::event::{EmittedEvent, EventIn, SharedError};
use crate::listener::{Listener, ListenerResult};
use crate::wait_for::WaitFor;

/// Associates an event name with its payload type.
///
/// ```
/// use eventwire_core::EventType;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct OrderPlaced {
///     id: u64,
/// }
///
/// impl EventType for OrderPlaced {
///     const NAME: &'static str = "order:placed";
///     type Payload = Self;
/// }
/// ```
pub trait EventType: 'static {
    /// Event name the payload is emitted under.
    const NAME: &'static str;
    /// Payload carried by the event.
    type Payload: Serialize + DeserializeOwned + Send + 'static;
}

/// An [`EmittedEvent`] whose payload has been decoded.
#[derive(Debug, Clone)]
pub struct TypedEvent<P> {
    /// Concrete name that was emitted.
    pub event: String,
    /// Human-readable message.
    pub message: Option<String>,
    /// Decoded payload.
    pub payload: P,
    /// Failure associated with the event.
    pub error: Option<SharedError>,
    /// How long the reported operation took.
    pub measurement: Option<Duration>,
}

impl<P: DeserializeOwned> TypedEvent<P> {
    /// Decodes the payload of `event`.
    pub fn from_emitted(event: &EmittedEvent) -> Result<Self> {
        Ok(Self {
            event: event.event.clone(),
            message: event.message.clone(),
            payload: event.payload_as()?,
            error: event.error.clone(),
            measurement: event.measurement,
        })
    }
}

fn encode<E: EventType>(payload: &E::Payload) -> Result<EventIn> {
    Ok(EventIn::new().with_payload(serde_json::to_value(payload)?))
}

impl EventEmitter {
    /// Emits `payload` under `E::NAME`.
    pub fn emit_typed<E: EventType>(&self, payload: &E::Payload) -> Result<bool> {
        self.emit(E::NAME, encode::<E>(payload)?)
    }

    /// Emits `payload` under `E::NAME`, awaiting each listener.
    ///
    /// The payload is serialized before the returned future is first polled.
    pub fn emit_typed_async<E: EventType>(
        &self,
        payload: &E::Payload,
    ) -> impl Future<Output = Result<bool>> + Send + '_ {
        let encoded = encode::<E>(payload);
        async move { self.emit_async(E::NAME, encoded?).await }
    }

    /// Registers a listener that receives decoded payloads of `E`.
    ///
    /// A payload that does not decode is reported as a listener failure.
    pub fn on_typed<E, F>(&self, f: F) -> Listener
    where
        E: EventType,
        F: Fn(TypedEvent<E::Payload>) -> ListenerResult + Send + Sync + 'static,
    {
        self.on(E::NAME, move |event| {
            let typed = TypedEvent::<E::Payload>::from_emitted(event)?;
            f(typed)
        })
    }

    /// Waits for the next `E` event.
    pub fn wait_for_typed<E: EventType>(&self) -> TypedWait<E> {
        TypedWait {
            inner: self.wait_for(E::NAME),
            _event: std::marker::PhantomData,
        }
    }
}

/// [`WaitFor`] that decodes the payload of the received event.
#[must_use = "a wait unregisters its listener when dropped"]
pub struct TypedWait<E: EventType> {
    inner: WaitFor,
    _event: std::marker::PhantomData<fn() -> E>,
}

impl<E: EventType> TypedWait<E> {
    /// Rejects the wait with `reason`. Returns false if it had already settled.
    pub fn cancel(&self, reason: impl Into<String>) -> bool {
        self.inner.cancel(reason)
    }

    /// Awaits the event and decodes its payload.
    pub async fn recv(self) -> Result<TypedEvent<E::Payload>> {
        let event = self.inner.await?;
        TypedEvent::from_emitted(&event)
    }
}
