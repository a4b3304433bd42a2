//! One-shot wait for the next matching event.
//!
//! [`WaitFor`] registers a once-listener and settles exactly once: either the
//! listener resolves it with the received event, or a cancel rejects it. The
//! losing path becomes a no-op.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Waker};

use tracing::debug;

use crate::emitter::EventEmitter;
use crate::error::{EmitterError, Result};
use crate::event::EmittedEvent;
use crate::listener::Listener;

/// Reason recorded when a pending wait is dropped.
const DROPPED_REASON: &str = "wait dropped";

enum WaitState {
    Pending(Option<Waker>),
    Resolved(Box<EmittedEvent>),
    Rejected(String),
}

struct WaitShared {
    state: Mutex<WaitState>,
}

impl WaitShared {
    fn new() -> Self {
        Self {
            state: Mutex::new(WaitState::Pending(None)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, WaitState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Moves a pending wait to `next`. Returns false if it was already settled.
    fn settle(&self, next: WaitState) -> bool {
        let waker = {
            let mut state = self.lock();
            match &mut *state {
                WaitState::Pending(waker) => {
                    let waker = waker.take();
                    *state = next;
                    waker
                }
                _ => return false,
            }
        };
        if let Some(waker) = waker {
            waker.wake();
        }
        true
    }

    fn is_pending(&self) -> bool {
        matches!(*self.lock(), WaitState::Pending(_))
    }
}

/// Cancels a [`WaitFor`] from anywhere, including after the future was moved
/// into another task.
#[derive(Clone)]
pub struct CancelHandle {
    shared: Arc<WaitShared>,
    emitter: EventEmitter,
    pattern: String,
    listener: Listener,
}

impl CancelHandle {
    /// Rejects the wait with `reason` and unregisters its listener.
    ///
    /// Returns false if the wait had already settled.
    pub fn cancel(&self, reason: impl Into<String>) -> bool {
        let reason = reason.into();
        if !self.shared.settle(WaitState::Rejected(reason.clone())) {
            return false;
        }
        self.emitter.remove_listener(self.pattern.as_str(), &self.listener);
        debug!(pattern = %self.pattern, reason = %reason, "wait cancelled");
        true
    }
}

impl std::fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelHandle")
            .field("pattern", &self.pattern)
            .field("pending", &self.shared.is_pending())
            .finish()
    }
}

/// Future resolving with the next event matching a pattern.
///
/// Resolves to [`EmitterError::Cancelled`] carrying the reason if cancelled
/// first. Dropping a pending `WaitFor` unregisters its listener.
///
/// # Example
///
/// ```no_run
/// # async fn demo() -> eventwire_core::Result<()> {
/// use eventwire_core::{EventEmitter, EventIn};
///
/// let emitter = EventEmitter::new();
/// let ready = emitter.wait_for("service:ready");
///
/// emitter.emit("service:ready", EventIn::new().with_message("up"))?;
/// let event = ready.await?;
/// assert_eq!(event.message.as_deref(), Some("up"));
/// # Ok(())
/// # }
/// ```
#[must_use = "a WaitFor unregisters its listener when dropped"]
pub struct WaitFor {
    handle: CancelHandle,
}

impl WaitFor {
    pub(crate) fn register(emitter: &EventEmitter, pattern: &str) -> Self {
        let shared = Arc::new(WaitShared::new());

        let resolver = Arc::clone(&shared);
        let listener = Listener::new(move |event| {
            // a cancel may have won the race; the late event is dropped
            resolver.settle(WaitState::Resolved(Box::new(event.clone())));
            Ok(())
        });
        emitter.add_once_listener(pattern, &listener);

        Self {
            handle: CancelHandle {
                shared,
                emitter: emitter.clone(),
                pattern: pattern.to_string(),
                listener,
            },
        }
    }

    /// Rejects the wait with `reason`. Returns false if it had already settled.
    pub fn cancel(&self, reason: impl Into<String>) -> bool {
        self.handle.cancel(reason)
    }

    /// Returns a handle that can cancel this wait after it has been moved.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.handle.clone()
    }

    /// Pattern this wait listens on.
    pub fn pattern(&self) -> &str {
        &self.handle.pattern
    }

    /// Returns true until the wait is resolved or cancelled.
    pub fn is_pending(&self) -> bool {
        self.handle.shared.is_pending()
    }
}

impl Future for WaitFor {
    type Output = Result<EmittedEvent>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.handle.shared.lock();
        match &mut *state {
            WaitState::Pending(waker) => {
                *waker = Some(cx.waker().clone());
                Poll::Pending
            }
            WaitState::Resolved(event) => Poll::Ready(Ok(event.as_ref().clone())),
            WaitState::Rejected(reason) => {
                Poll::Ready(Err(EmitterError::Cancelled(reason.clone())))
            }
        }
    }
}

impl Drop for WaitFor {
    fn drop(&mut self) {
        self.handle.cancel(DROPPED_REASON);
    }
}

impl std::fmt::Debug for WaitFor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaitFor")
            .field("pattern", &self.handle.pattern)
            .field("pending", &self.is_pending())
            .finish()
    }
}
