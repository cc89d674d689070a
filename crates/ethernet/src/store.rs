//! The guarded state record and its lock discipline.
//!
//! ## Lock strategy
//!
//! All mutable manager state lives in one [`StateStore`] behind one
//! `parking_lot::Mutex`. Every acquisition goes through
//! [`Inner::with_store`], which:
//!
//! 1. waits at most the budget for the operation class and fails with
//!    [`EthError::MutexTimeout`] before touching anything,
//! 2. runs the mutation,
//! 3. refreshes the lock-free mirrors (state, previous state, started flag),
//! 4. releases the lock and only then delivers queued user notifications.
//!
//! Lock order is store, then timer slots. Timers are armed while holding the
//! store but only stopped after releasing it.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use ethmgr_net_backoff::Backoff;
use ethmgr_phy::{MacAddress, NetifHandle};
use tracing::error;

use crate::{
    ConnectionState, EthError, EthResult, NetworkStatistics,
    callbacks::{Callbacks, Notification, Pending},
    config::{
        DEFAULT_CONNECT_TIMEOUT, DEFAULT_TRUST_WINDOW, DEFAULT_WAIT_SLICE, LinkMonitorConfig,
        LockTimeouts,
    },
    machine::Milestones,
    manager::Inner,
};

/// Operation classes with distinct lock budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LockBudget {
    Quick,
    Standard,
    Init,
}

/// Current budgets, adjustable at runtime.
#[derive(Debug)]
pub(crate) struct LockBudgets {
    quick_ms: AtomicU64,
    standard_ms: AtomicU64,
    init_ms: AtomicU64,
}

impl Default for LockBudgets {
    fn default() -> Self {
        let budgets = Self {
            quick_ms: AtomicU64::new(0),
            standard_ms: AtomicU64::new(0),
            init_ms: AtomicU64::new(0),
        };
        budgets.set(LockTimeouts::default());
        budgets
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl LockBudgets {
    pub(crate) fn get(&self, budget: LockBudget) -> Duration {
        let ms = match budget {
            LockBudget::Quick => &self.quick_ms,
            LockBudget::Standard => &self.standard_ms,
            LockBudget::Init => &self.init_ms,
        };
        Duration::from_millis(ms.load(Ordering::Relaxed))
    }

    pub(crate) fn set(&self, timeouts: LockTimeouts) {
        self.quick_ms.store(millis(timeouts.quick), Ordering::Relaxed);
        self.standard_ms
            .store(millis(timeouts.standard), Ordering::Relaxed);
        self.init_ms.store(millis(timeouts.init), Ordering::Relaxed);
    }

    pub(crate) fn set_quick(&self, timeout: Duration) {
        self.quick_ms.store(millis(timeout), Ordering::Relaxed);
    }
}

/// Everything the manager mutates, guarded by a single lock.
#[derive(Debug)]
pub(crate) struct StateStore {
    pub(crate) state: ConnectionState,
    pub(crate) previous: ConnectionState,
    pub(crate) stats: NetworkStatistics,
    pub(crate) callbacks: Callbacks,
    outbox: Vec<Notification>,

    pub(crate) phy_started: bool,
    pub(crate) handlers_registered: bool,
    /// Set on address acquisition, cleared by a confirmed disconnect.
    pub(crate) address_obtained: bool,
    /// Last link status seen by the poll or the bridge.
    pub(crate) link_up: bool,
    pub(crate) connection_start_ms: Option<u64>,
    pub(crate) milestones: Milestones,

    pub(crate) auto_reconnect: bool,
    pub(crate) backoff: Backoff,
    pub(crate) link_monitor: LinkMonitorConfig,

    pub(crate) pending_mac: Option<MacAddress>,
    pub(crate) netif: Option<NetifHandle>,

    pub(crate) connect_timeout: Duration,
    pub(crate) trust_window: Duration,
    pub(crate) wait_slice: Duration,
    pub(crate) verbose_logging: bool,
}

impl Default for StateStore {
    fn default() -> Self {
        Self {
            state: ConnectionState::Uninitialized,
            previous: ConnectionState::Uninitialized,
            stats: NetworkStatistics::default(),
            callbacks: Callbacks::default(),
            outbox: Vec::new(),
            phy_started: false,
            handlers_registered: false,
            address_obtained: false,
            link_up: false,
            connection_start_ms: None,
            milestones: Milestones::default(),
            auto_reconnect: false,
            backoff: Backoff::default(),
            link_monitor: LinkMonitorConfig::default(),
            pending_mac: None,
            netif: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            trust_window: DEFAULT_TRUST_WINDOW,
            wait_slice: DEFAULT_WAIT_SLICE,
            verbose_logging: false,
        }
    }
}

impl StateStore {
    /// Queue a notification for delivery after the lock is released.
    pub(crate) fn notify(&mut self, notification: Notification) {
        self.outbox.push(notification);
    }

    pub(crate) fn take_pending(&mut self) -> Pending {
        if self.outbox.is_empty() {
            return Pending::default();
        }
        Pending::new(self.callbacks.clone(), std::mem::take(&mut self.outbox))
    }

    /// Whether `now_ms` is still inside the trust window that follows
    /// link establishment.
    pub(crate) fn within_trust_window(&self, now_ms: u64) -> Option<u64> {
        let start = self.connection_start_ms?;
        let elapsed = now_ms.saturating_sub(start);
        (elapsed < millis(self.trust_window)).then_some(elapsed)
    }
}

impl Inner {
    /// Run `op` under the state lock within the given budget.
    pub(crate) fn with_store<R>(
        &self,
        budget: LockBudget,
        op: &'static str,
        f: impl FnOnce(&mut StateStore) -> R,
    ) -> EthResult<R> {
        let timeout = self.budgets.get(budget);
        let Some(mut store) = self.store.try_lock_for(timeout) else {
            error!(op, ?budget, ?timeout, "Failed to take state lock");
            self.metrics.inc_lock_timeouts();
            self.last_error.set(EthError::MutexTimeout);
            return Err(EthError::MutexTimeout);
        };

        let out = f(&mut store);

        self.state.store(store.state);
        self.previous.store(store.previous);
        self.phy_started
            .store(store.phy_started, Ordering::Release);
        let pending = store.take_pending();
        drop(store);

        pending.fire();
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budgets_follow_config() {
        let budgets = LockBudgets::default();
        assert_eq!(budgets.get(LockBudget::Quick), Duration::from_millis(100));
        assert_eq!(budgets.get(LockBudget::Standard), Duration::from_millis(1_000));
        assert_eq!(budgets.get(LockBudget::Init), Duration::from_millis(5_000));

        budgets.set_quick(Duration::from_millis(20));
        assert_eq!(budgets.get(LockBudget::Quick), Duration::from_millis(20));
    }

    #[test]
    fn test_trust_window() {
        let mut store = StateStore::default();
        assert_eq!(store.within_trust_window(10_000), None);

        store.connection_start_ms = Some(1_000);
        assert_eq!(store.within_trust_window(2_500), Some(1_500));
        assert_eq!(store.within_trust_window(4_000), None);
        assert_eq!(store.within_trust_window(3_999), Some(2_999));
    }

    #[test]
    fn test_take_pending_drains_outbox() {
        let mut store = StateStore::default();
        store.notify(Notification::LinkChanged(true));
        let _ = store.take_pending();
        assert!(store.outbox.is_empty());
    }
}
