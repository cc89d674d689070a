//! Dedicated delivery thread.
//!
//! Producers (driver callbacks, interrupt bottom halves, simulators) post
//! events from any thread. A single worker drains the queue and publishes to
//! the [`EventBus`], so every event reaches its handler exactly once and in
//! posting order.

use std::{
    io,
    sync::Arc,
    thread::{self, JoinHandle},
};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::{EventBus, NetEvent};

const THREAD_NAME: &str = "net-events";

/// Error returned when posting to a dispatcher that has shut down.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("event dispatcher is shut down, dropped {0:?}")]
pub struct DispatchError(pub NetEvent);

/// Owns the delivery thread for an [`EventBus`].
#[derive(Debug)]
pub struct Dispatcher {
    tx: Option<mpsc::UnboundedSender<NetEvent>>,
    worker: Option<JoinHandle<()>>,
}

impl Dispatcher {
    /// Start the delivery thread.
    pub fn spawn(bus: Arc<EventBus>) -> io::Result<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel::<NetEvent>();

        let worker = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || {
                debug!("Event dispatcher started");
                while let Some(event) = rx.blocking_recv() {
                    bus.publish(event);
                }
                debug!("Event dispatcher stopped");
            })?;

        Ok(Self {
            tx: Some(tx),
            worker: Some(worker),
        })
    }

    /// Queue an event for delivery.
    pub fn post(&self, event: NetEvent) -> Result<(), DispatchError> {
        match &self.tx {
            Some(tx) => tx.send(event).map_err(|e| DispatchError(e.0)),
            None => Err(DispatchError(event)),
        }
    }

    /// A cloneable posting handle for producers on other threads.
    pub fn sender(&self) -> Option<EventSender> {
        self.tx.clone().map(EventSender)
    }

    /// Stop accepting events, deliver everything already queued, and join the
    /// worker.
    pub fn shutdown(&mut self) {
        // Closing the sender ends the worker loop once the queue is drained.
        // Outstanding `EventSender`s keep it open until they are dropped.
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            if worker.thread().id() == thread::current().id() {
                return;
            }
            if worker.join().is_err() {
                warn!("Event dispatcher thread panicked");
            }
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Cloneable handle for posting events to a [`Dispatcher`].
#[derive(Debug, Clone)]
pub struct EventSender(mpsc::UnboundedSender<NetEvent>);

impl EventSender {
    pub fn post(&self, event: NetEvent) -> Result<(), DispatchError> {
        self.0.send(event).map_err(|e| DispatchError(e.0))
    }
}
