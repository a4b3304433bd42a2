//! EventEmitter - pattern-routed dispatch with sync and async emission.
//!
//! # Concurrency Patterns
//!
//! - **`Arc<Inner>`**: `EventEmitter` is a cheap handle. Listeners and spawned
//!   tasks clone it to register, remove or emit reentrantly.
//!
//! - **`RwLock<Registry>`**: held only long enough to mutate the registry or
//!   snapshot the listeners of one dispatch. No listener ever runs under the
//!   lock, so listeners may freely call back into the emitter.
//!
//! - **Snapshot dispatch**: the matching listeners are collected before the
//!   first one runs. Registration or removal during an emission only affects
//!   later emissions. A once-listener is claimed and unregistered when the
//!   dispatch reaches it, so listeners skipped by an escaping failure stay
//!   registered and overlapping dispatches fire it at most once.
//!
//! # Error Routing
//!
//! A failing listener does not stop the emission. Its error is re-emitted on
//! the `"error"` channel together with the failing event's message and payload.
//! It escapes to the caller only in strict mode (`ignore_errors: false`) when
//! no `"error"` listener exists, or when an `"error"` listener itself fails.
//! An escaping failure ends the dispatch of that name; the remaining names of a
//! multi-name emission are still dispatched.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use futures::future::{BoxFuture, FutureExt};
use serde_json::json;
use tracing::{debug, trace, warn};

use crate::config::EmitterConfig;
use crate::error::{EmitterError, Result};
use crate::event::{
    EmittedEvent, EventIn, EventNames, SharedError, ERROR_EVENT, MEMORY_LEAK_EVENT,
    NEW_LISTENER_EVENT, REMOVE_LISTENER_EVENT,
};
use crate::listener::{Invocation, Listener, ListenerError, ListenerResult};
use crate::pattern::MatchOptions;
use crate::registry::{Registry, Target};
use crate::wait_for::WaitFor;

#[derive(Debug, Clone, Copy)]
enum Placement {
    Append,
    Prepend,
}

struct Inner {
    config: EmitterConfig,
    max_listeners: AtomicUsize,
    registry: RwLock<Registry>,
}

/// In-process event emitter with wildcard subscriptions.
///
/// # Example
///
/// ```
/// use eventwire_core::{EventEmitter, EventIn};
/// use serde_json::json;
///
/// let emitter = EventEmitter::new();
/// emitter.on("order:*", |event| {
///     println!("{} -> {:?}", event.event, event.payload);
///     Ok(())
/// });
///
/// let fired = emitter
///     .emit("order:placed", EventIn::new().with_payload(json!({"id": 1})))
///     .unwrap();
/// assert!(fired);
/// assert!(!emitter.emit("user:created", EventIn::new()).unwrap());
/// ```
#[derive(Clone)]
pub struct EventEmitter {
    inner: Arc<Inner>,
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("config", &self.config())
            .field("listener_count", &self.listener_count())
            .finish()
    }
}

impl EventEmitter {
    /// Creates an emitter with the default configuration.
    pub fn new() -> Self {
        Self::build(EmitterConfig::default())
    }

    /// Creates an emitter with the given configuration.
    pub fn with_config(config: EmitterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: EmitterConfig) -> Self {
        let registry = Registry::new(MatchOptions::from(&config));
        Self {
            inner: Arc::new(Inner {
                max_listeners: AtomicUsize::new(config.max_listeners),
                registry: RwLock::new(registry),
                config,
            }),
        }
    }

    /// Returns the effective configuration.
    pub fn config(&self) -> EmitterConfig {
        let mut config = self.inner.config.clone();
        config.max_listeners = self.max_listeners();
        config
    }

    /// Returns the per-pattern listener limit. 0 means unlimited.
    pub fn max_listeners(&self) -> usize {
        self.inner.max_listeners.load(Ordering::Relaxed)
    }

    /// Sets the per-pattern listener limit. 0 means unlimited.
    pub fn set_max_listeners(&self, max: usize) -> &Self {
        self.inner.max_listeners.store(max, Ordering::Relaxed);
        self
    }

    // A poisoned lock only means a panic happened elsewhere; the registry
    // itself is never left half-updated.
    fn read(&self) -> RwLockReadGuard<'_, Registry> {
        self.inner
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Registry> {
        self.inner
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // ---- registration -------------------------------------------------

    /// Registers a synchronous callback and returns its handle.
    pub fn on<N, F>(&self, names: N, f: F) -> Listener
    where
        N: Into<EventNames>,
        F: Fn(&EmittedEvent) -> ListenerResult + Send + Sync + 'static,
    {
        let listener = Listener::new(f);
        self.add_listener(names, &listener);
        listener
    }

    /// Registers an asynchronous callback and returns its handle.
    pub fn on_async<N, F, Fut>(&self, names: N, f: F) -> Listener
    where
        N: Into<EventNames>,
        F: Fn(Arc<EmittedEvent>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ListenerResult> + Send + 'static,
    {
        let listener = Listener::from_async(f);
        self.add_listener(names, &listener);
        listener
    }

    /// Registers a synchronous callback that fires at most once.
    pub fn once<N, F>(&self, names: N, f: F) -> Listener
    where
        N: Into<EventNames>,
        F: Fn(&EmittedEvent) -> ListenerResult + Send + Sync + 'static,
    {
        let listener = Listener::new(f);
        self.add_once_listener(names, &listener);
        listener
    }

    /// Registers an asynchronous callback that fires at most once.
    pub fn once_async<N, F, Fut>(&self, names: N, f: F) -> Listener
    where
        N: Into<EventNames>,
        F: Fn(Arc<EmittedEvent>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ListenerResult> + Send + 'static,
    {
        let listener = Listener::from_async(f);
        self.add_once_listener(names, &listener);
        listener
    }

    /// Appends `listener` under every name.
    pub fn add_listener<N: Into<EventNames>>(&self, names: N, listener: &Listener) -> &Self {
        self.register(names.into(), listener, Placement::Append, false);
        self
    }

    /// Appends `listener` as a once-listener under every name.
    pub fn add_once_listener<N: Into<EventNames>>(&self, names: N, listener: &Listener) -> &Self {
        self.register(names.into(), listener, Placement::Append, true);
        self
    }

    /// Inserts `listener` ahead of every existing listener of each name.
    pub fn prepend_listener<N: Into<EventNames>>(&self, names: N, listener: &Listener) -> &Self {
        self.register(names.into(), listener, Placement::Prepend, false);
        self
    }

    /// Inserts `listener` as a once-listener ahead of every existing listener.
    pub fn prepend_once_listener<N: Into<EventNames>>(
        &self,
        names: N,
        listener: &Listener,
    ) -> &Self {
        self.register(names.into(), listener, Placement::Prepend, true);
        self
    }

    fn register(&self, names: EventNames, listener: &Listener, placement: Placement, once: bool) {
        for name in names.iter() {
            // raised before insertion so a listener never sees its own registration
            if self.inner.config.new_listener_event {
                self.notify_lifecycle(NEW_LISTENER_EVENT, name, listener);
            }

            let count = {
                let mut registry = self.write();
                let listener = listener.clone();
                match (placement, once) {
                    (Placement::Append, false) => registry.add_target(name, listener),
                    (Placement::Append, true) => registry.add_target_once(name, listener),
                    (Placement::Prepend, false) => registry.prepend_target(name, listener),
                    (Placement::Prepend, true) => registry.prepend_target_once(name, listener),
                }
            };
            debug!(event = %name, once, ?placement, count, "listener registered");

            self.check_leak(name, count);
        }
    }

    fn check_leak(&self, pattern: &str, count: usize) {
        let max = self.max_listeners();
        if max == 0 || count <= max || !self.inner.config.verbose_memory_leak {
            return;
        }

        let message = format!(
            "possible memory leak detected: {} listeners added to \"{}\", exceeding the limit of {}",
            count, pattern, max
        );
        warn!(event = %pattern, listener_count = count, max_listeners = max, "{}", message);

        let input = EventIn::new().with_message(message).with_payload(json!({
            "eventName": pattern,
            "listenerCount": count,
            "maxListeners": max,
        }));
        if let Err(err) = self.emit_one(MEMORY_LEAK_EVENT, &input, None) {
            warn!(error = %err, "memory leak listener failed");
        }
    }

    fn notify_lifecycle(&self, kind: &str, pattern: &str, listener: &Listener) {
        let input = EventIn::new()
            .with_message(format!("{} {}", kind, pattern))
            .with_payload(json!({ "eventName": pattern }));
        if let Err(err) = self.emit_one(kind, &input, Some(listener)) {
            warn!(event = kind, error = %err, "lifecycle listener failed");
        }
    }

    // ---- removal ------------------------------------------------------

    /// Alias for [`remove_listener`](Self::remove_listener).
    pub fn off<N: Into<EventNames>>(&self, names: N, listener: &Listener) -> &Self {
        self.remove_listener(names, listener)
    }

    /// Removes one registration of `listener` under each exact name.
    ///
    /// If the listener was registered several times under a name, the most
    /// recent registration is removed.
    pub fn remove_listener<N: Into<EventNames>>(&self, names: N, listener: &Listener) -> &Self {
        let names: EventNames = names.into();
        for name in names.iter() {
            let removed = self.write().remove_target(name, listener);
            if !removed {
                continue;
            }
            debug!(event = %name, "listener removed");
            if self.inner.config.remove_listener_event {
                self.notify_lifecycle(REMOVE_LISTENER_EVENT, name, listener);
            }
        }
        self
    }

    /// Removes every listener.
    pub fn remove_all_listeners(&self) -> &Self {
        let removed = self.write().remove_all_targets(None);
        self.after_bulk_removal(removed);
        self
    }

    /// Removes every listener of each name. A wildcard name removes every
    /// registered pattern it matches.
    pub fn remove_all_listeners_for<N: Into<EventNames>>(&self, names: N) -> &Self {
        let names: EventNames = names.into();
        for name in names.iter() {
            let removed = self.write().remove_all_targets(Some(name));
            self.after_bulk_removal(removed);
        }
        self
    }

    fn after_bulk_removal(&self, removed: Vec<(String, Listener)>) {
        if removed.is_empty() {
            return;
        }
        debug!(count = removed.len(), "listeners removed");
        if self.inner.config.remove_listener_event {
            for (pattern, listener) in &removed {
                self.notify_lifecycle(REMOVE_LISTENER_EVENT, pattern, listener);
            }
        }
    }

    // ---- queries ------------------------------------------------------

    /// Returns true if any listener is registered.
    pub fn has_listeners(&self) -> bool {
        !self.read().is_empty()
    }

    /// Returns true if any registered pattern matches any of `names`.
    pub fn has_listeners_for<N: Into<EventNames>>(&self, names: N) -> bool {
        let names: EventNames = names.into();
        self.read().has_matchers(names.as_slice())
    }

    /// Registered patterns, in first-registration order.
    pub fn event_names(&self) -> Vec<String> {
        self.read().patterns()
    }

    /// Total number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.read().targets_count()
    }

    /// Number of listeners registered under exactly `pattern`.
    pub fn listener_count_for(&self, pattern: &str) -> usize {
        self.read().targets_count_for(pattern)
    }

    /// Every registered listener, in registry order.
    pub fn listeners(&self) -> Vec<Listener> {
        self.read().listeners()
    }

    /// Returns a future resolving with the next event matching `pattern`.
    pub fn wait_for(&self, pattern: &str) -> WaitFor {
        WaitFor::register(self, pattern)
    }

    // ---- emission -----------------------------------------------------

    /// Emits an event synchronously to every matching listener.
    ///
    /// Each name is dispatched independently. Returns true if at least one
    /// listener was invoked for any of them. A failure escaping one name does
    /// not stop the others; the first such failure is returned once every
    /// name has been dispatched.
    ///
    /// Async listeners are started on the current tokio runtime and not awaited.
    pub fn emit<N: Into<EventNames>>(&self, names: N, event: EventIn) -> Result<bool> {
        let names: EventNames = names.into();
        let mut outcome = NamesOutcome::default();
        for name in names.iter() {
            outcome.record(name, self.emit_one(name, &event, None));
        }
        outcome.finish()
    }

    /// Emits an event, awaiting each listener in turn.
    ///
    /// Listener N+1 starts only after listener N has finished, including any
    /// error routing caused by listener N.
    pub fn emit_async<N: Into<EventNames>>(
        &self,
        names: N,
        event: EventIn,
    ) -> impl Future<Output = Result<bool>> + Send + '_ {
        self.emit_names_async(names.into(), event)
    }

    async fn emit_names_async(&self, names: EventNames, event: EventIn) -> Result<bool> {
        let mut outcome = NamesOutcome::default();
        for name in names.iter() {
            let result = self.emit_one_async(name.to_string(), event.clone()).await;
            outcome.record(name, result);
        }
        outcome.finish()
    }

    fn snapshot(&self, name: &str) -> Vec<Target> {
        let targets = self.read().matching(name);
        trace!(event = %name, listeners = targets.len(), "dispatching");
        targets
    }

    /// Reserves `target` for this dispatch. A once-target is unregistered here,
    /// right before its only invocation.
    fn claim(&self, target: &Target) -> bool {
        if !target.claim() {
            return false;
        }
        if !target.once {
            return true;
        }

        let expired = self.write().expire(target);
        debug!(event = %target.pattern, "once listener expired");
        if expired && self.inner.config.remove_listener_event {
            self.notify_lifecycle(REMOVE_LISTENER_EVENT, &target.pattern, &target.listener);
        }
        true
    }

    fn emit_one(&self, name: &str, input: &EventIn, subject: Option<&Listener>) -> Result<bool> {
        let targets = self.snapshot(name);
        if targets.is_empty() {
            return self.unmatched(name, input).map(|()| false);
        }

        let event = Arc::new(EmittedEvent::new(name, input, subject));

        for target in &targets {
            if !self.claim(target) {
                continue;
            }
            let outcome = match target.listener.invoke(&event) {
                Invocation::Ready(result) => result,
                Invocation::Pending(future) => self.spawn_detached(name, future),
            };
            if let Err(failure) = outcome {
                self.route_failure(&event, SharedError::from(failure))?;
            }
        }
        Ok(true)
    }

    fn emit_one_async(&self, name: String, input: EventIn) -> BoxFuture<'_, Result<bool>> {
        async move {
            let targets = self.snapshot(&name);
            if targets.is_empty() {
                return self.unmatched(&name, &input).map(|()| false);
            }

            let event = Arc::new(EmittedEvent::new(&name, &input, None));

            for target in targets {
                if !self.claim(&target) {
                    continue;
                }
                let outcome = match target.listener.invoke(&event) {
                    Invocation::Ready(result) => result,
                    Invocation::Pending(future) => future.await,
                };
                if let Err(failure) = outcome {
                    self.route_failure_async(&event, SharedError::from(failure))
                        .await?;
                }
            }
            Ok(true)
        }
        .boxed()
    }

    /// Outcome of an emission that matched nothing.
    fn unmatched(&self, name: &str, input: &EventIn) -> Result<()> {
        if name != ERROR_EVENT || self.inner.config.ignore_errors {
            return Ok(());
        }
        Err(match &input.error {
            Some(error) => EmitterError::Listener(Arc::clone(error)),
            None => EmitterError::UnhandledErrorEvent,
        })
    }

    /// Failures inside the error channel are final; anything else is re-emitted on it.
    fn error_channel_failure(&self, event: &EmittedEvent, failure: SharedError) -> Result<()> {
        if !self.inner.config.ignore_errors {
            return Err(EmitterError::Listener(failure));
        }
        debug!(event = %event.event, error = %failure, "error listener failed, ignoring");
        Ok(())
    }

    fn route_failure(&self, event: &EmittedEvent, failure: SharedError) -> Result<()> {
        if event.event == ERROR_EVENT {
            return self.error_channel_failure(event, failure);
        }

        let routed = event.to_error_input(Arc::clone(&failure));
        if !self.emit_one(ERROR_EVENT, &routed, None)? {
            debug!(event = %event.event, error = %failure, "listener failed, ignoring");
        }
        Ok(())
    }

    async fn route_failure_async(&self, event: &EmittedEvent, failure: SharedError) -> Result<()> {
        if event.event == ERROR_EVENT {
            return self.error_channel_failure(event, failure);
        }

        let routed = event.to_error_input(Arc::clone(&failure));
        if !self.emit_one_async(ERROR_EVENT.to_string(), routed).await? {
            debug!(event = %event.event, error = %failure, "listener failed, ignoring");
        }
        Ok(())
    }

    fn spawn_detached(
        &self,
        name: &str,
        future: BoxFuture<'static, ListenerResult>,
    ) -> ListenerResult {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| {
            let err: ListenerError = Box::new(EmitterError::NoRuntime);
            err
        })?;

        let name = name.to_string();
        handle.spawn(async move {
            if let Err(err) = future.await {
                warn!(event = %name, error = %err, "detached async listener failed");
            }
        });
        Ok(())
    }
}

/// Accumulates per-name results of a multi-name emission.
#[derive(Default)]
struct NamesOutcome {
    fired: bool,
    first_error: Option<EmitterError>,
}

impl NamesOutcome {
    fn record(&mut self, name: &str, result: Result<bool>) {
        match result {
            Ok(fired) => self.fired |= fired,
            Err(err) if self.first_error.is_none() => self.first_error = Some(err),
            Err(err) => debug!(event = %name, error = %err, "further emission failure dropped"),
        }
    }

    fn finish(self) -> Result<bool> {
        match self.first_error {
            Some(err) => Err(err),
            None => Ok(self.fired),
        }
    }
}
