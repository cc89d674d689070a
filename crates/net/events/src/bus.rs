//! Handler registry and synchronous delivery.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use auto_impl::auto_impl;
use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::{EventClass, NetEvent};

/// Callback invoked for every event of a subscribed class.
pub type EventHandler = Arc<dyn Fn(NetEvent) + Send + Sync>;

/// Successful registration result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeOutcome {
    /// The handler is now registered for the class.
    Registered,
    /// A handler was already registered; the new one was not installed.
    AlreadyRegistered,
}

/// Registration failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubscribeError {
    #[error("event substrate is closed")]
    Closed,
    #[error("event substrate rejected {0} subscription")]
    Rejected(EventClass),
}

/// Source of typed network events.
///
/// At most one handler is registered per class. A second subscription for the
/// same class is reported as [`SubscribeOutcome::AlreadyRegistered`] and leaves
/// the existing handler in place.
#[auto_impl(&, Arc)]
pub trait EventSubstrate: Send + Sync {
    fn subscribe(
        &self,
        class: EventClass,
        handler: EventHandler,
    ) -> Result<SubscribeOutcome, SubscribeError>;

    /// Remove the handler for `class`. Returns `true` if one was registered.
    fn unsubscribe(&self, class: EventClass) -> bool;
}

/// In-process event substrate.
///
/// [`EventBus::publish`] runs the class handler on the caller's thread. Pair it
/// with a [`crate::Dispatcher`] to get a single delivery thread.
#[derive(Default)]
pub struct EventBus {
    handlers: RwLock<HashMap<EventClass, EventHandler>>,
    closed: AtomicBool,
    published: AtomicU64,
    dropped: AtomicU64,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let classes: Vec<EventClass> = self.handlers.read().keys().copied().collect();
        f.debug_struct("EventBus")
            .field("subscribed", &classes)
            .field("closed", &self.is_closed())
            .field("published", &self.published())
            .field("dropped", &self.dropped())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver an event to its class handler.
    ///
    /// Returns `true` if a handler ran. The handler is invoked without the
    /// registry lock held, so it may subscribe or unsubscribe.
    pub fn publish(&self, event: NetEvent) -> bool {
        if self.is_closed() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        let class = event.class();
        let handler = self.handlers.read().get(&class).cloned();

        match handler {
            Some(handler) => {
                trace!(%class, event = event.name(), "Delivering event");
                self.published.fetch_add(1, Ordering::Relaxed);
                handler(event);
                true
            }
            None => {
                trace!(%class, event = event.name(), "No handler registered, dropping event");
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Whether a handler is registered for `class`.
    pub fn is_subscribed(&self, class: EventClass) -> bool {
        self.handlers.read().contains_key(&class)
    }

    /// Refuse further subscriptions and deliveries, dropping all handlers.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.handlers.write().clear();
        debug!("Event bus closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Events delivered to a handler.
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Events discarded because no handler was registered or the bus was closed.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl EventSubstrate for EventBus {
    fn subscribe(
        &self,
        class: EventClass,
        handler: EventHandler,
    ) -> Result<SubscribeOutcome, SubscribeError> {
        if self.is_closed() {
            return Err(SubscribeError::Closed);
        }

        let mut handlers = self.handlers.write();
        if handlers.contains_key(&class) {
            debug!(%class, "Handler already registered");
            return Ok(SubscribeOutcome::AlreadyRegistered);
        }
        handlers.insert(class, handler);
        debug!(%class, "Handler registered");
        Ok(SubscribeOutcome::Registered)
    }

    fn unsubscribe(&self, class: EventClass) -> bool {
        let removed = self.handlers.write().remove(&class).is_some();
        if removed {
            debug!(%class, "Handler removed");
        }
        removed
    }
}
