//! User notification slots.
//!
//! Notifications are collected while the state lock is held and delivered
//! after it is released, in the order they were raised.

use std::{net::Ipv4Addr, sync::Arc};

use crate::ConnectionState;

/// Called with the acquired address on entry to `Connected`.
pub type ConnectedCallback = Arc<dyn Fn(Ipv4Addr) + Send + Sync>;

/// Called with the connected duration in milliseconds on a confirmed disconnect.
pub type DisconnectedCallback = Arc<dyn Fn(u64) + Send + Sync>;

/// Called with `(old, new)` on every applied transition.
pub type StateChangedCallback = Arc<dyn Fn(ConnectionState, ConnectionState) + Send + Sync>;

/// Called with the new raw link status when it changes.
pub type LinkChangedCallback = Arc<dyn Fn(bool) + Send + Sync>;

#[derive(Clone, Default)]
pub(crate) struct Callbacks {
    pub(crate) connected: Option<ConnectedCallback>,
    pub(crate) disconnected: Option<DisconnectedCallback>,
    pub(crate) state_changed: Option<StateChangedCallback>,
    pub(crate) link_changed: Option<LinkChangedCallback>,
}

impl std::fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks")
            .field("connected", &self.connected.is_some())
            .field("disconnected", &self.disconnected.is_some())
            .field("state_changed", &self.state_changed.is_some())
            .field("link_changed", &self.link_changed.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Notification {
    StateChanged {
        old: ConnectionState,
        new: ConnectionState,
    },
    Connected(Ipv4Addr),
    Disconnected {
        duration_ms: u64,
    },
    LinkChanged(bool),
}

/// Notifications taken out of the store together with the slots that were
/// registered at the time.
#[derive(Debug, Default)]
pub(crate) struct Pending {
    callbacks: Callbacks,
    notifications: Vec<Notification>,
}

impl Pending {
    pub(crate) fn new(callbacks: Callbacks, notifications: Vec<Notification>) -> Self {
        Self {
            callbacks,
            notifications,
        }
    }

    /// Deliver everything. Must be called without the state lock held.
    pub(crate) fn fire(self) {
        for notification in self.notifications {
            match notification {
                Notification::StateChanged { old, new } => {
                    if let Some(cb) = &self.callbacks.state_changed {
                        cb(old, new);
                    }
                }
                Notification::Connected(address) => {
                    if let Some(cb) = &self.callbacks.connected {
                        cb(address);
                    }
                }
                Notification::Disconnected { duration_ms } => {
                    if let Some(cb) = &self.callbacks.disconnected {
                        cb(duration_ms);
                    }
                }
                Notification::LinkChanged(up) => {
                    if let Some(cb) = &self.callbacks.link_changed {
                        cb(up);
                    }
                }
            }
        }
    }
}
