//! Link polling and reconnection backoff.
//!
//! Both run on software timers owned by the manager. Timer callbacks hold a
//! weak reference to the manager core and do nothing once it is gone.

use std::{sync::Arc, time::Duration};

use ethmgr_net_backoff::{AttemptOutcome, BackoffConfig};
use ethmgr_phy::LinkMode;
use ethmgr_tasks::{SoftTimer, TimerCallback, TimerMode};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::{
    ConnectionState, EthError, EthResult, EthernetManager, InterfaceStats,
    callbacks::Notification,
    manager::Inner,
    store::{LockBudget, StateStore},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimerKind {
    Reconnect,
    LinkMonitor,
    Batch,
}

impl TimerKind {
    fn name(self) -> &'static str {
        match self {
            Self::Reconnect => "eth-reconnect",
            Self::LinkMonitor => "eth-link-monitor",
            Self::Batch => "eth-event-batch",
        }
    }

    fn mode(self) -> TimerMode {
        match self {
            Self::LinkMonitor => TimerMode::Periodic,
            Self::Reconnect | Self::Batch => TimerMode::OneShot,
        }
    }
}

/// Lazily created timers. Each slot is only locked to create, clone or take
/// its timer.
#[derive(Debug, Default)]
pub(crate) struct TimerSlots {
    reconnect: Mutex<Option<Arc<SoftTimer>>>,
    link_monitor: Mutex<Option<Arc<SoftTimer>>>,
    batch: Mutex<Option<Arc<SoftTimer>>>,
}

impl TimerSlots {
    fn slot(&self, kind: TimerKind) -> &Mutex<Option<Arc<SoftTimer>>> {
        match kind {
            TimerKind::Reconnect => &self.reconnect,
            TimerKind::LinkMonitor => &self.link_monitor,
            TimerKind::Batch => &self.batch,
        }
    }
}

/// Reconnection policy state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectStatus {
    pub enabled: bool,
    pub config: BackoffConfig,
    /// Attempts since the last successful address acquisition.
    pub attempts: u32,
    /// Delay before the next attempt.
    pub current_delay: Duration,
}

impl Inner {
    /// The timer of `kind`, created on first use with `period`.
    pub(crate) fn timer(&self, kind: TimerKind, period: Duration) -> EthResult<Arc<SoftTimer>> {
        let mut slot = self.timers.slot(kind).lock();
        if let Some(timer) = slot.as_ref() {
            return Ok(timer.clone());
        }

        let weak = self.me.clone();
        let callback: TimerCallback = Arc::new(move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            match kind {
                TimerKind::Reconnect => inner.on_reconnect_timer(),
                TimerKind::LinkMonitor => inner.on_link_timer(),
                TimerKind::Batch => inner.drain_batch(),
            }
        });

        let timer = SoftTimer::new(kind.name(), kind.mode(), period, callback)
            .map(Arc::new)
            .map_err(|error| {
                error!(timer = kind.name(), %error, "Failed to create timer");
                EthError::MemoryAllocationFailed
            })?;
        *slot = Some(timer.clone());
        Ok(timer)
    }

    /// Arm `kind` to fire after `delay`, creating it if needed.
    pub(crate) fn arm_timer(&self, kind: TimerKind, delay: Duration) -> EthResult<()> {
        let timer = self.timer(kind, delay)?;
        timer.change_period(delay).map_err(|error| {
            warn!(timer = kind.name(), %error, "Failed to arm timer");
            EthError::Unknown
        })
    }

    /// Disarm `kind`. Must not be called while holding the state lock.
    pub(crate) fn stop_timer(&self, kind: TimerKind) {
        let timer = self.timers.slot(kind).lock().clone();
        if let Some(timer) = timer {
            timer.stop();
        }
    }

    /// Terminate all timer threads. They are recreated on demand.
    pub(crate) fn shutdown_timers(&self) {
        for kind in [TimerKind::Reconnect, TimerKind::LinkMonitor, TimerKind::Batch] {
            let timer = self.timers.slot(kind).lock().take();
            if let Some(timer) = timer {
                timer.shutdown();
            }
        }
    }

    pub(crate) fn arm_reconnect(&self, s: &StateStore) {
        let delay = s.backoff.current_delay();
        match self.arm_timer(TimerKind::Reconnect, delay) {
            Ok(()) => debug!(?delay, "Reconnect scheduled"),
            Err(error) => warn!(%error, "Could not schedule reconnect"),
        }
    }

    /// Compare the PHY link register with the last seen status and react to
    /// a change. Returns the raw link status.
    pub(crate) fn update_link_status(&self, s: &mut StateStore) -> bool {
        if !s.phy_started {
            return false;
        }

        let up = self.phy.link_up();
        if up != s.link_up {
            s.link_up = up;
            info!(up, "Link status changed");

            if up {
                if self.signal.is_set() {
                    self.advance_to_connected(s);
                } else if matches!(
                    s.state,
                    ConnectionState::PhyStarting | ConnectionState::LinkDown
                ) {
                    self.transition(s, ConnectionState::LinkUp);
                }
            } else {
                self.transition(s, ConnectionState::LinkDown);
                s.stats.link_down_events += 1;
                self.signal.clear();
            }
            s.notify(Notification::LinkChanged(up));
        }

        if let Some(counters) = self.phy.interface_counters() {
            s.stats.sample(&counters);
        }
        up
    }

    pub(crate) fn poll_link(&self) -> EthResult<bool> {
        self.with_store(LockBudget::Quick, "link poll", |s| self.update_link_status(s))
    }

    fn on_link_timer(&self) {
        if let Err(error) = self.poll_link() {
            debug!(%error, "Link poll skipped");
        }
    }

    fn on_reconnect_timer(&self) {
        let result = self.with_store(LockBudget::Quick, "reconnect", |s| {
            if !s.auto_reconnect {
                return;
            }
            if self.signal.is_set() {
                debug!("Connected again, reconnect not needed");
                s.backoff.reset();
                return;
            }
            let Some(outcome) = s.backoff.record_attempt() else {
                return;
            };
            self.metrics.inc_reconnect_attempts();
            info!(attempt = outcome.attempt(), "Attempting to reconnect");

            self.nudge_link(s);

            match outcome {
                AttemptOutcome::Exhausted { attempt } => {
                    error!(attempt, "Max reconnection attempts reached");
                    s.auto_reconnect = false;
                }
                AttemptOutcome::Retry { next_delay, .. } => {
                    if let Err(error) = self.arm_timer(TimerKind::Reconnect, next_delay) {
                        warn!(%error, "Could not reschedule reconnect");
                    }
                }
            }
        });
        if let Err(error) = result {
            warn!(%error, "Reconnect attempt skipped");
        }
    }

    /// Best-effort link restoration: reset the transceiver if the driver
    /// can, then re-read the link.
    fn nudge_link(&self, s: &mut StateStore) {
        if !s.phy_started {
            return;
        }
        if self.phy.reset() {
            debug!("Transceiver reset requested");
        } else {
            debug!("Waiting for link to restore");
        }
        self.update_link_status(s);
    }
}

impl EthernetManager {
    /// Enable or disable reconnection after confirmed disconnects.
    ///
    /// Resets the attempt counter. A `max_retries` of zero means unlimited.
    pub fn set_auto_reconnect(&self, enabled: bool, backoff: BackoffConfig) -> EthResult<()> {
        let inner = &self.inner;
        if backoff.initial_delay.is_zero() || backoff.max_delay.is_zero() {
            error!(?backoff, "Invalid reconnect delays");
            inner.last_error.set(EthError::InvalidParameter);
            return Err(EthError::InvalidParameter);
        }

        inner.last_error.record(inner.with_store(
            LockBudget::Quick,
            "auto reconnect",
            |s| {
                s.auto_reconnect = enabled;
                s.backoff.reconfigure(backoff);
            },
        ))?;

        if enabled {
            // Create the timer now so a later disconnect only has to arm it
            inner.timer(TimerKind::Reconnect, backoff.initial_delay)?;
            info!(
                max_retries = backoff.max_retries,
                initial = ?backoff.initial_delay,
                max = ?backoff.max_delay,
                "Auto-reconnect enabled"
            );
        } else {
            inner.stop_timer(TimerKind::Reconnect);
            info!("Auto-reconnect disabled");
        }
        Ok(())
    }

    pub fn reconnect_status(&self) -> EthResult<ReconnectStatus> {
        self.inner
            .with_store(LockBudget::Quick, "reconnect status", |s| ReconnectStatus {
                enabled: s.auto_reconnect,
                config: *s.backoff.config(),
                attempts: s.backoff.attempts(),
                current_delay: s.backoff.current_delay(),
            })
    }

    /// Start or stop periodic link polling.
    pub fn set_link_monitoring(&self, enabled: bool, interval: Duration) -> EthResult<()> {
        let inner = &self.inner;
        if enabled && interval.is_zero() {
            error!("Invalid link monitoring interval");
            inner.last_error.set(EthError::InvalidParameter);
            return Err(EthError::InvalidParameter);
        }

        inner.last_error.record(inner.with_store(
            LockBudget::Quick,
            "link monitoring",
            |s| {
                s.link_monitor.enabled = enabled;
                if enabled {
                    s.link_monitor.interval = interval;
                }
            },
        ))?;

        if enabled {
            inner.last_error.record(inner.arm_timer(TimerKind::LinkMonitor, interval))?;
            info!(?interval, "Link monitoring enabled");
        } else {
            inner.stop_timer(TimerKind::LinkMonitor);
            info!("Link monitoring disabled");
        }
        Ok(())
    }

    /// Poll the link now. Returns the raw link status, `false` if the PHY is
    /// not started or the lock budget ran out.
    pub fn check_link_status(&self) -> bool {
        if !self.is_started() {
            return false;
        }
        self.inner.poll_link().unwrap_or(false)
    }

    /// Drop the connection and, with auto-reconnect enabled, restart the
    /// backoff sequence from the initial delay.
    pub fn reset_interface(&self) -> EthResult<()> {
        let inner = &self.inner;
        info!("Resetting Ethernet interface");
        if !self.is_started() {
            error!("Cannot reset, PHY not started");
            inner.last_error.set(EthError::NotInitialized);
            return Err(EthError::NotInitialized);
        }

        inner.last_error.record(inner.with_store(
            LockBudget::Standard,
            "reset interface",
            |s| {
                inner.signal.clear();
                s.address_obtained = false;
                inner.transition(s, ConnectionState::LinkDown);
                if s.auto_reconnect {
                    s.backoff.reset();
                    inner.arm_reconnect(s);
                }
            },
        ))
    }

    /// Force link speed and duplex, or re-enable auto-negotiation.
    pub fn configure_phy(&self, mode: LinkMode) -> EthResult<()> {
        let inner = &self.inner;
        if !self.is_started() {
            error!("PHY not started");
            inner.last_error.set(EthError::NotInitialized);
            return Err(EthError::NotInitialized);
        }
        if !inner.phy.configure_link(mode) {
            warn!(%mode, "PHY link configuration not supported");
            inner.last_error.set(EthError::ConfigFailed);
            return Err(EthError::ConfigFailed);
        }
        info!(%mode, "PHY link mode configured");
        Ok(())
    }

    /// Interface packet and error counters.
    ///
    /// Falls back to the session packet counts when the driver does not
    /// report interface counters.
    pub fn network_interface_stats(&self) -> EthResult<InterfaceStats> {
        let inner = &self.inner;
        let (netif, stats) =
            inner.with_store(LockBudget::Quick, "interface stats", |s| (s.netif, s.stats))?;
        if netif.is_none() {
            error!("Network interface not available");
            inner.last_error.set(EthError::NetifError);
            return Err(EthError::NetifError);
        }

        Ok(match inner.phy.interface_counters() {
            Some(counters) => counters.into(),
            None => InterfaceStats {
                tx_packets: stats.tx_packets,
                rx_packets: stats.rx_packets,
                ..InterfaceStats::default()
            },
        })
    }
}
