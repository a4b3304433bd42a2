//! Listener handles.
//!
//! A [`Listener`] wraps a sync or async callback behind an `Arc`. Identity is
//! the identity of that `Arc`: clones of one handle compare equal, two handles
//! built from the same closure do not.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};

use crate::event::EmittedEvent;

/// Failure returned by a listener.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Outcome of a listener invocation.
pub type ListenerResult = std::result::Result<(), ListenerError>;

type SyncCallback = dyn Fn(&EmittedEvent) -> ListenerResult + Send + Sync;
type AsyncCallback = dyn Fn(Arc<EmittedEvent>) -> BoxFuture<'static, ListenerResult> + Send + Sync;

enum Callback {
    Sync(Box<SyncCallback>),
    Async(Box<AsyncCallback>),
}

/// Result of starting a listener.
pub(crate) enum Invocation {
    /// Sync listener finished.
    Ready(ListenerResult),
    /// Async listener returned a future that still has to be driven.
    Pending(BoxFuture<'static, ListenerResult>),
}

/// Cloneable handle to a registered callback.
#[derive(Clone)]
pub struct Listener {
    callback: Arc<Callback>,
}

impl Listener {
    /// Wraps a synchronous callback.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&EmittedEvent) -> ListenerResult + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(Callback::Sync(Box::new(f))),
        }
    }

    /// Wraps an asynchronous callback.
    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn(Arc<EmittedEvent>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ListenerResult> + Send + 'static,
    {
        Self {
            callback: Arc::new(Callback::Async(Box::new(move |event| f(event).boxed()))),
        }
    }

    /// Returns true if the callback is asynchronous.
    pub fn is_async(&self) -> bool {
        matches!(*self.callback, Callback::Async(_))
    }

    /// Returns true if both handles refer to the same callback.
    pub fn same_as(&self, other: &Listener) -> bool {
        Arc::ptr_eq(&self.callback, &other.callback)
    }

    pub(crate) fn invoke(&self, event: &Arc<EmittedEvent>) -> Invocation {
        match self.callback.as_ref() {
            Callback::Sync(f) => Invocation::Ready(f(event.as_ref())),
            Callback::Async(f) => Invocation::Pending(f(Arc::clone(event))),
        }
    }
}

impl PartialEq for Listener {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl Eq for Listener {}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("kind", &if self.is_async() { "async" } else { "sync" })
            .field("id", &Arc::as_ptr(&self.callback))
            .finish()
    }
}
