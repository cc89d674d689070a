//! Validated state transitions and milestone timing.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    ConnectionState, callbacks::Notification, manager::Inner, store::StateStore,
};

/// Elapsed times between startup milestones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// PHY start to first link-up, zero if the link never came up.
    pub init_time_ms: u64,
    /// First link-up to address acquisition, zero until both happened.
    pub link_to_address_ms: u64,
    /// PHY start to address acquisition, zero until connected.
    pub address_time_ms: u64,
    /// Events received from the substrate.
    pub event_count: u64,
}

/// Clock readings at the first entry into each milestone state since the
/// last PHY start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Milestones {
    pub(crate) phy_start_ms: Option<u64>,
    pub(crate) link_up_ms: Option<u64>,
    pub(crate) address_ms: Option<u64>,
}

impl Milestones {
    fn record(&mut self, state: ConnectionState, now_ms: u64) {
        match state {
            ConnectionState::PhyStarting => {
                *self = Self {
                    phy_start_ms: Some(now_ms),
                    ..Self::default()
                };
            }
            ConnectionState::LinkUp => {
                if let (Some(start), None) = (self.phy_start_ms, self.link_up_ms) {
                    self.link_up_ms = Some(now_ms);
                    debug!(elapsed_ms = now_ms.saturating_sub(start), "Link up");
                }
            }
            ConnectionState::Connected => {
                if let (Some(start), None) = (self.phy_start_ms, self.address_ms) {
                    self.address_ms = Some(now_ms);
                    debug!(
                        elapsed_ms = now_ms.saturating_sub(start),
                        link_up_ms = self.link_up_ms.map(|t| t.saturating_sub(start)),
                        "Address obtained"
                    );
                }
            }
            _ => {}
        }
    }

    pub(crate) fn performance(&self, event_count: u64) -> Option<PerformanceMetrics> {
        let start = self.phy_start_ms?;
        let since = |from: u64, to: Option<u64>| to.map_or(0, |t| t.saturating_sub(from));

        Some(PerformanceMetrics {
            init_time_ms: since(start, self.link_up_ms),
            link_to_address_ms: match (self.link_up_ms, self.address_ms) {
                (Some(link), Some(_)) => since(link, self.address_ms),
                _ => 0,
            },
            address_time_ms: since(start, self.address_ms),
            event_count,
        })
    }
}

impl StateStore {
    /// Apply `to` if it is an edge of the transition table.
    ///
    /// Returns `true` if the state changed. Self-transitions and rejected
    /// requests leave the store untouched.
    pub(crate) fn transition(&mut self, to: ConnectionState, now_ms: u64) -> bool {
        let from = self.state;
        if from == to {
            return false;
        }
        if !from.can_transition_to(to) {
            warn!(from = %from, to = %to, "Rejected invalid state transition");
            return false;
        }

        self.previous = from;
        self.state = to;
        info!(old = %from, new = %to, "State change");

        self.milestones.record(to, now_ms);
        self.notify(Notification::StateChanged { old: from, new: to });
        true
    }

    /// Step through the intermediate states up to `Connected`.
    ///
    /// Returns the number of applied transitions, or `None` without changing
    /// anything when `Connected` is not reachable from the current state.
    pub(crate) fn advance_to_connected(&mut self, now_ms: u64) -> Option<usize> {
        let path = self.state.path_to_connected()?;
        let mut applied = 0;
        for &next in path {
            if self.transition(next, now_ms) {
                applied += 1;
            }
        }
        Some(applied)
    }
}

impl Inner {
    pub(crate) fn transition(&self, store: &mut StateStore, to: ConnectionState) -> bool {
        let changed = store.transition(to, self.clock.now_ms());
        if changed {
            self.metrics.inc_state_transitions();
        }
        changed
    }

    pub(crate) fn advance_to_connected(&self, store: &mut StateStore) -> bool {
        match store.advance_to_connected(self.clock.now_ms()) {
            Some(applied) => {
                for _ in 0..applied {
                    self.metrics.inc_state_transitions();
                }
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConnectionState::*;

    fn started_store(now: u64) -> StateStore {
        let mut store = StateStore::default();
        assert!(store.transition(PhyStarting, now));
        store
    }

    #[test]
    fn test_self_transition_is_noop() {
        let mut store = started_store(100);
        let _ = store.take_pending();

        assert!(!store.transition(PhyStarting, 500));
        assert_eq!(store.milestones.phy_start_ms, Some(100));
        assert_eq!(store.previous, Uninitialized);

        let fired = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = fired.clone();
        let cb: crate::StateChangedCallback = std::sync::Arc::new(move |_, _| {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        });
        store.callbacks.state_changed = Some(cb);
        store.take_pending().fire();
        assert_eq!(fired.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[test]
    fn test_invalid_transition_rejected() {
        let mut store = StateStore::default();
        assert!(!store.transition(Connected, 10));
        assert_eq!(store.state, Uninitialized);
        assert_eq!(store.milestones, Milestones::default());
    }

    #[test]
    fn test_milestones_first_entry_only() {
        let mut store = started_store(1_000);
        store.transition(LinkUp, 1_200);
        store.transition(LinkDown, 1_300);
        store.transition(LinkUp, 1_900);
        store.transition(ObtainingAddress, 2_000);
        store.transition(Connected, 2_500);

        assert_eq!(
            store.milestones,
            Milestones {
                phy_start_ms: Some(1_000),
                link_up_ms: Some(1_200),
                address_ms: Some(2_500),
            }
        );

        let perf = store.milestones.performance(7).unwrap();
        assert_eq!(perf.init_time_ms, 200);
        assert_eq!(perf.link_to_address_ms, 1_300);
        assert_eq!(perf.address_time_ms, 1_500);
        assert_eq!(perf.event_count, 7);
    }

    #[test]
    fn test_phy_start_clears_milestones() {
        let mut store = started_store(1_000);
        store.transition(LinkUp, 1_100);
        store.transition(ErrorState, 1_150);
        store.transition(PhyStarting, 5_000);

        assert_eq!(store.milestones.phy_start_ms, Some(5_000));
        assert_eq!(store.milestones.link_up_ms, None);
    }

    #[test]
    fn test_performance_requires_phy_start() {
        assert_eq!(Milestones::default().performance(3), None);

        let store = started_store(40);
        let perf = store.milestones.performance(0).unwrap();
        assert_eq!(perf.init_time_ms, 0);
        assert_eq!(perf.address_time_ms, 0);
    }

    #[test]
    fn test_advance_to_connected_walks_chain() {
        let mut store = started_store(0);
        let _ = store.take_pending();

        assert_eq!(store.advance_to_connected(10), Some(3));
        assert_eq!(store.state, Connected);
        assert_eq!(store.previous, ObtainingAddress);

        let mut store = StateStore::default();
        assert_eq!(store.advance_to_connected(10), None);
        assert_eq!(store.state, Uninitialized);
    }
}
