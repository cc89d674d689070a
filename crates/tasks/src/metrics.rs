//! Software Timer Metrics

use metrics::Counter;

/// Per-timer counters, labelled with the timer name.
#[derive(Clone, Debug)]
pub(crate) struct TimerMetrics {
    /// Number of times the timer was armed
    pub(crate) starts_total: Counter,
    /// Number of callback invocations
    pub(crate) fires_total: Counter,
    /// Number of explicit stops
    pub(crate) stops_total: Counter,
}

impl TimerMetrics {
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            starts_total: metrics::counter!("tasks.timer.starts_total", "timer" => name),
            fires_total: metrics::counter!("tasks.timer.fires_total", "timer" => name),
            stops_total: metrics::counter!("tasks.timer.stops_total", "timer" => name),
        }
    }

    pub(crate) fn inc_starts(&self) {
        self.starts_total.increment(1);
    }

    pub(crate) fn inc_fires(&self) {
        self.fires_total.increment(1);
    }

    pub(crate) fn inc_stops(&self) {
        self.stops_total.increment(1);
    }
}
