//! The manager handle and its shared core.

use std::{
    fmt,
    net::Ipv4Addr,
    sync::{
        Arc, Weak,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use ethmgr_net_events::{EventClass, EventHandler, EventSubstrate, NetEvent};
use ethmgr_phy::{MacAddress, NetifHandle, PhyDriver};
use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::{
    Clock, ConnectionState, ConnectedCallback, DisconnectedCallback, EthError, EthResult,
    LinkChangedCallback, NetworkStatistics, StateChangedCallback, SystemClock,
    batch::EventBatcher,
    error::LastError,
    metrics::EthernetMetrics,
    signal::ConnectedSignal,
    state::AtomicConnectionState,
    store::{LockBudget, LockBudgets, StateStore},
    supervisor::TimerSlots,
};

/// Shared core referenced by the handle, the event handler and the timers.
pub(crate) struct Inner {
    /// Back-reference handed to timers and the event handler.
    pub(crate) me: Weak<Inner>,

    pub(crate) phy: Arc<dyn PhyDriver>,
    pub(crate) events: Arc<dyn EventSubstrate>,
    pub(crate) clock: Arc<dyn Clock>,

    pub(crate) store: Mutex<StateStore>,
    pub(crate) budgets: LockBudgets,

    // Lock-free mirrors, refreshed on every store release
    pub(crate) state: AtomicConnectionState,
    pub(crate) previous: AtomicConnectionState,
    pub(crate) phy_started: AtomicBool,

    pub(crate) last_error: LastError,
    pub(crate) signal: ConnectedSignal,
    pub(crate) total_events: AtomicU64,

    pub(crate) batcher: EventBatcher,
    pub(crate) timers: TimerSlots,
    pub(crate) metrics: EthernetMetrics,
}

impl Inner {
    /// Handler registered with the event substrate. Holds only a weak
    /// reference so a dropped manager stops reacting.
    pub(crate) fn event_handler(&self) -> EventHandler {
        let weak = self.me.clone();
        Arc::new(move |event: NetEvent| {
            if let Some(inner) = weak.upgrade() {
                inner.on_event(event);
            }
        })
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.phy_started.load(Ordering::Acquire) && self.signal.is_set()
    }

    pub(crate) fn unsubscribe_all(&self) {
        self.events.unsubscribe(EventClass::Ip);
        self.events.unsubscribe(EventClass::Phy);
        debug!("Event handlers removed");
    }
}

/// Connection manager for one wired interface.
///
/// There is one manager per physical interface. It is not `Clone`; share it
/// behind an `Arc` if several tasks need it.
///
/// Status queries ([`EthernetManager::is_connected`],
/// [`EthernetManager::state`], [`EthernetManager::last_error`]) read atomics
/// and never block. Everything else takes the state lock with a bounded
/// wait and reports [`EthError::MutexTimeout`] when the budget runs out.
pub struct EthernetManager {
    pub(crate) inner: Arc<Inner>,
}

impl fmt::Debug for EthernetManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EthernetManager")
            .field("state", &self.state())
            .field("phy_started", &self.is_started())
            .field("connected", &self.is_connected())
            .field("last_error", &self.last_error())
            .finish()
    }
}

impl EthernetManager {
    /// Manager over `phy`, receiving events from `events`, timed by the
    /// system clock.
    pub fn new(phy: Arc<dyn PhyDriver>, events: Arc<dyn EventSubstrate>) -> Self {
        Self::with_clock(phy, events, Arc::new(SystemClock::new()))
    }

    pub fn with_clock(
        phy: Arc<dyn PhyDriver>,
        events: Arc<dyn EventSubstrate>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let inner = Arc::new_cyclic(|me| Inner {
            me: me.clone(),
            phy,
            events,
            clock,
            store: Mutex::new(StateStore::default()),
            budgets: LockBudgets::default(),
            state: AtomicConnectionState::default(),
            previous: AtomicConnectionState::default(),
            phy_started: AtomicBool::new(false),
            last_error: LastError::default(),
            signal: ConnectedSignal::default(),
            total_events: AtomicU64::new(0),
            batcher: EventBatcher::default(),
            timers: TimerSlots::default(),
            metrics: EthernetMetrics::default(),
        });
        Self { inner }
    }

    /// Entry point for the notification substrate.
    ///
    /// Normally called through the handler registered by
    /// [`EthernetManager::early_init`]; exposed for substrates that deliver
    /// events by direct call.
    pub fn handle_event(&self, event: NetEvent) {
        self.inner.on_event(event);
    }

    // --- status ---

    /// Connected bit, read without locking.
    pub fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    /// Whether the PHY has been brought up.
    pub fn is_started(&self) -> bool {
        self.inner.phy_started.load(Ordering::Acquire)
    }

    pub fn is_initialized(&self) -> bool {
        self.is_started()
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state.load()
    }

    pub fn previous_state(&self) -> ConnectionState {
        self.inner.previous.load()
    }

    /// Most recent failure, `None` after a clean start or [`EthernetManager::cleanup`].
    pub fn last_error(&self) -> Option<EthError> {
        self.inner.last_error.get()
    }

    /// Last link status seen by the poll or the event bridge.
    pub fn is_link_up(&self) -> bool {
        self.inner
            .with_store(LockBudget::Quick, "link status", |s| s.link_up)
            .unwrap_or(false)
    }

    /// Cached network-interface handle.
    pub fn netif(&self) -> Option<NetifHandle> {
        self.inner
            .with_store(LockBudget::Quick, "netif", |s| s.netif)
            .ok()
            .flatten()
    }

    // --- statistics ---

    /// Counter snapshot with uptime computed now.
    pub fn statistics(&self) -> EthResult<NetworkStatistics> {
        let inner = &self.inner;
        let connected = inner.is_connected();
        let now = inner.clock.now_ms();
        inner.with_store(LockBudget::Quick, "statistics", |s| {
            let mut stats = s.stats;
            stats.uptime_ms = match stats.connect_time_ms {
                Some(at) if connected => now.saturating_sub(at),
                _ => 0,
            };
            stats
        })
    }

    pub fn reset_statistics(&self) -> EthResult<()> {
        let inner = &self.inner;
        inner
            .last_error
            .record(inner.with_store(LockBudget::Quick, "reset statistics", |s| {
                s.stats.reset();
            }))?;
        debug!("Statistics reset");
        Ok(())
    }

    // --- callbacks ---

    pub fn set_connected_callback(&self, callback: Option<ConnectedCallback>) -> EthResult<()> {
        self.inner
            .with_store(LockBudget::Quick, "set callback", |s| {
                s.callbacks.connected = callback;
            })
    }

    pub fn set_disconnected_callback(
        &self,
        callback: Option<DisconnectedCallback>,
    ) -> EthResult<()> {
        self.inner
            .with_store(LockBudget::Quick, "set callback", |s| {
                s.callbacks.disconnected = callback;
            })
    }

    pub fn set_state_changed_callback(
        &self,
        callback: Option<StateChangedCallback>,
    ) -> EthResult<()> {
        self.inner
            .with_store(LockBudget::Quick, "set callback", |s| {
                s.callbacks.state_changed = callback;
            })
    }

    pub fn set_link_changed_callback(&self, callback: Option<LinkChangedCallback>) -> EthResult<()> {
        self.inner
            .with_store(LockBudget::Quick, "set callback", |s| {
                s.callbacks.link_changed = callback;
            })
    }

    // --- settings ---

    /// Hardware address override applied at the next initialization.
    pub fn set_mac_address(&self, mac: MacAddress) -> EthResult<()> {
        let inner = &self.inner;
        if mac.is_zero() {
            error!("Rejected all-zero MAC address");
            inner.last_error.set(EthError::InvalidParameter);
            return Err(EthError::InvalidParameter);
        }
        inner
            .last_error
            .record(inner.with_store(LockBudget::Quick, "set mac", |s| {
                s.pending_mac = Some(mac);
            }))?;
        info!(%mac, "MAC address set for next initialization");
        Ok(())
    }

    pub fn set_verbose_logging(&self, enabled: bool) -> EthResult<()> {
        self.inner
            .with_store(LockBudget::Quick, "verbose logging", |s| {
                s.verbose_logging = enabled;
            })?;
        debug!(enabled, "Verbose logging");
        Ok(())
    }

    /// Push DNS servers to the interface. Unspecified addresses are skipped.
    pub fn set_dns_servers(&self, dns1: Ipv4Addr, dns2: Ipv4Addr) -> EthResult<()> {
        let inner = &self.inner;
        let netif = inner.with_store(LockBudget::Quick, "set dns", |s| s.netif)?;
        if netif.is_none() {
            error!("Network interface not initialized");
            inner.last_error.set(EthError::NetifError);
            return Err(EthError::NetifError);
        }
        if dns1.is_unspecified() && dns2.is_unspecified() {
            return Ok(());
        }
        if !inner.phy.set_dns(dns1, dns2) {
            error!(%dns1, %dns2, "Failed to set DNS servers");
            inner.last_error.set(EthError::ConfigFailed);
            return Err(EthError::ConfigFailed);
        }
        info!(%dns1, %dns2, "DNS servers set");
        Ok(())
    }
}

impl Drop for EthernetManager {
    fn drop(&mut self) {
        let registered = self
            .inner
            .with_store(LockBudget::Quick, "drop", |s| {
                std::mem::take(&mut s.handlers_registered)
            })
            .unwrap_or(false);
        if registered {
            self.inner.unsubscribe_all();
        }
        self.inner.shutdown_timers();
    }
}
