//! Interface Manager Metrics

use metrics::Counter;

/// Interface Manager Metrics
#[derive(Clone, Debug)]
pub(crate) struct EthernetMetrics {
    /// Number of events received from the substrate
    pub(crate) events_total: Counter,
    /// Number of applied state transitions
    pub(crate) state_transitions_total: Counter,
    /// Number of confirmed disconnects
    pub(crate) disconnects_total: Counter,
    /// Number of reconnect timer attempts
    pub(crate) reconnect_attempts_total: Counter,
    /// Number of lock acquisitions that ran out of budget
    pub(crate) lock_timeouts_total: Counter,
}

impl Default for EthernetMetrics {
    fn default() -> Self {
        Self {
            events_total: metrics::counter!("ethernet.events_total"),
            state_transitions_total: metrics::counter!("ethernet.state_transitions_total"),
            disconnects_total: metrics::counter!("ethernet.disconnects_total"),
            reconnect_attempts_total: metrics::counter!("ethernet.reconnect_attempts_total"),
            lock_timeouts_total: metrics::counter!("ethernet.lock_timeouts_total"),
        }
    }
}

impl EthernetMetrics {
    pub(crate) fn inc_events(&self) {
        self.events_total.increment(1);
    }

    pub(crate) fn inc_state_transitions(&self) {
        self.state_transitions_total.increment(1);
    }

    pub(crate) fn inc_disconnects(&self) {
        self.disconnects_total.increment(1);
    }

    pub(crate) fn inc_reconnect_attempts(&self) {
        self.reconnect_attempts_total.increment(1);
    }

    pub(crate) fn inc_lock_timeouts(&self) {
        self.lock_timeouts_total.increment(1);
    }
}
