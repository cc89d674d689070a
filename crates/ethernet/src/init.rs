//! Bring-up, blocking waits and teardown.

use std::time::Duration;

use ethmgr_net_events::{EventClass, SubscribeOutcome};
use ethmgr_phy::{PhyPins, PinError, StaticIpConfig};
use tracing::{debug, error, info, warn};
use web_time::Instant;

use crate::{
    ConnectionState, EthError, EthResult, EthernetConfig, EthernetManager,
    callbacks::Notification,
    config::{LinkMonitorConfig, LockTimeouts, MAX_HOSTNAME_LEN},
    store::{LockBudget, StateStore},
    supervisor::TimerKind,
};

/// Reasons an initialization request is rejected before touching hardware.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
enum RequestError {
    #[error("hostname is missing")]
    MissingHostname,
    #[error("hostname is empty")]
    EmptyHostname,
    #[error("hostname is {0} bytes, at most {MAX_HOSTNAME_LEN} allowed")]
    HostnameTooLong(usize),
    #[error(transparent)]
    Pins(#[from] PinError),
    #[error("static address, gateway and netmask must all be set")]
    IncompleteStaticIp,
    #[error("{0} must be non-zero")]
    ZeroSetting(&'static str),
}

/// One initialization request, in any of its public forms.
#[derive(Debug)]
struct StartRequest<'a> {
    hostname: Option<&'a str>,
    pins: PhyPins,
    static_ip: Option<StaticIpConfig>,
    config: Option<&'a EthernetConfig>,
}

impl<'a> StartRequest<'a> {
    fn validate(&self) -> Result<&'a str, RequestError> {
        let hostname = self.hostname.ok_or(RequestError::MissingHostname)?;
        if hostname.is_empty() {
            return Err(RequestError::EmptyHostname);
        }
        if hostname.len() > MAX_HOSTNAME_LEN {
            return Err(RequestError::HostnameTooLong(hostname.len()));
        }
        self.pins.validate()?;
        if let Some(ip) = &self.static_ip {
            if !ip.is_complete() {
                return Err(RequestError::IncompleteStaticIp);
            }
        }
        if let Some(config) = self.config {
            validate_config(config)?;
        }
        Ok(hostname)
    }
}

fn validate_config(config: &EthernetConfig) -> Result<(), RequestError> {
    let checks = [
        ("reconnect initial delay", config.reconnect.backoff.initial_delay.is_zero()),
        ("reconnect max delay", config.reconnect.backoff.max_delay.is_zero()),
        (
            "link monitor interval",
            config.link_monitor.enabled && config.link_monitor.interval.is_zero(),
        ),
        ("connect timeout", config.connect_timeout.is_zero()),
        ("wait slice", config.wait_slice.is_zero()),
        ("quick lock timeout", config.lock_timeouts.quick.is_zero()),
        ("standard lock timeout", config.lock_timeouts.standard.is_zero()),
        ("init lock timeout", config.lock_timeouts.init.is_zero()),
        ("batch capacity", config.batching.capacity == 0),
    ];
    match checks.into_iter().find(|(_, invalid)| *invalid) {
        Some((name, _)) => Err(RequestError::ZeroSetting(name)),
        None => Ok(()),
    }
}

/// Settings read back from the store once bring-up succeeded.
struct Started {
    link_monitor: LinkMonitorConfig,
    connect_timeout: Duration,
}

impl EthernetManager {
    /// Register the event handler with the substrate.
    ///
    /// Idempotent. Called implicitly by every `initialize*` form.
    pub fn early_init(&self) -> EthResult<()> {
        let inner = &self.inner;
        let result = inner.with_store(LockBudget::Standard, "early init", |s| {
            if s.handlers_registered {
                return Ok(());
            }

            let handler = inner.event_handler();
            for class in [EventClass::Ip, EventClass::Phy] {
                match inner.events.subscribe(class, handler.clone()) {
                    Ok(SubscribeOutcome::Registered) => debug!(%class, "Subscribed"),
                    Ok(SubscribeOutcome::AlreadyRegistered) => {
                        debug!(%class, "Handler already registered")
                    }
                    Err(error) => {
                        error!(%class, %error, "Failed to register event handler");
                        if class == EventClass::Phy {
                            inner.events.unsubscribe(EventClass::Ip);
                        }
                        return Err(EthError::EventHandlerFailed);
                    }
                }
            }
            s.handlers_registered = true;
            info!("Event handlers registered");
            Ok(())
        });
        inner.last_error.record(result.and_then(|registered| registered))
    }

    /// Bring the interface up with a dynamic address and wait for it.
    ///
    /// `timeout` defaults to the configured connect timeout.
    pub fn initialize(
        &self,
        hostname: Option<&str>,
        pins: PhyPins,
        timeout: Option<Duration>,
    ) -> EthResult<()> {
        let request = StartRequest {
            hostname,
            pins,
            static_ip: None,
            config: None,
        };
        self.start(request, Some(timeout))
    }

    /// Bring the interface up with a dynamic address without waiting.
    pub fn initialize_async(&self, hostname: Option<&str>, pins: PhyPins) -> EthResult<()> {
        let request = StartRequest {
            hostname,
            pins,
            static_ip: None,
            config: None,
        };
        self.start(request, None)
    }

    /// Bring the interface up with a fixed address and wait for it.
    pub fn initialize_static(
        &self,
        hostname: Option<&str>,
        pins: PhyPins,
        ip: StaticIpConfig,
        timeout: Option<Duration>,
    ) -> EthResult<()> {
        let request = StartRequest {
            hostname,
            pins,
            static_ip: Some(ip),
            config: None,
        };
        self.start(request, Some(timeout))
    }

    pub fn initialize_static_async(
        &self,
        hostname: Option<&str>,
        pins: PhyPins,
        ip: StaticIpConfig,
    ) -> EthResult<()> {
        let request = StartRequest {
            hostname,
            pins,
            static_ip: Some(ip),
            config: None,
        };
        self.start(request, None)
    }

    /// Apply `config` and bring the interface up, waiting up to
    /// `config.connect_timeout`.
    pub fn initialize_with_config(&self, config: &EthernetConfig) -> EthResult<()> {
        self.start(StartRequest::from_config(config), Some(None))
    }

    pub fn initialize_with_config_async(&self, config: &EthernetConfig) -> EthResult<()> {
        self.start(StartRequest::from_config(config), None)
    }

    /// `wait` is `None` for the non-blocking forms, `Some(None)` to wait for
    /// the configured connect timeout.
    fn start(&self, request: StartRequest<'_>, wait: Option<Option<Duration>>) -> EthResult<()> {
        let inner = &self.inner;

        if self.is_started() && self.state() != ConnectionState::Uninitialized {
            warn!(state = %self.state(), "Already initialized");
            inner.last_error.set(EthError::AlreadyInitialized);
            return Err(EthError::AlreadyInitialized);
        }

        let hostname = match request.validate() {
            Ok(hostname) => hostname,
            Err(reason) => {
                error!(%reason, "Invalid initialization request");
                let _ = inner.with_store(LockBudget::Quick, "reject init", |s| {
                    inner.transition(s, ConnectionState::ErrorState);
                });
                inner.last_error.set(EthError::InvalidParameter);
                return Err(EthError::InvalidParameter);
            }
        };

        self.early_init()?;

        info!(
            hostname,
            phy_address = request.pins.phy_address,
            mode = if request.static_ip.is_some() { "static" } else { "dhcp" },
            "Initializing Ethernet"
        );
        let began = Instant::now();
        let result = inner.with_store(LockBudget::Init, "initialize", |s| {
            self.bring_up(s, hostname, &request)
        });
        let started = inner.last_error.record(result.and_then(|started| started))?;
        info!(elapsed = ?began.elapsed(), "PHY started");

        if started.link_monitor.enabled {
            if let Err(error) =
                inner.arm_timer(TimerKind::LinkMonitor, started.link_monitor.interval)
            {
                warn!(%error, "Link monitoring unavailable");
            }
        }

        match wait {
            Some(timeout) => {
                self.wait_for_connection(timeout.unwrap_or(started.connect_timeout))
            }
            None => Ok(()),
        }
    }

    /// The startup critical section.
    fn bring_up(
        &self,
        s: &mut StateStore,
        hostname: &str,
        request: &StartRequest<'_>,
    ) -> EthResult<Started> {
        let inner = &self.inner;

        // A concurrent start may have won the lock while this one waited
        if s.phy_started
            || !matches!(
                s.state,
                ConnectionState::Uninitialized | ConnectionState::ErrorState
            )
        {
            warn!(state = %s.state, "Already initialized");
            return Err(EthError::AlreadyInitialized);
        }

        if let Some(config) = request.config {
            self.apply_config(s, config);
        }

        inner.signal.clear();
        s.address_obtained = false;
        s.link_up = false;
        s.connection_start_ms = None;
        let mac = s.pending_mac;

        inner.transition(s, ConnectionState::PhyStarting);
        if !inner.phy.set_hostname(hostname) {
            warn!(hostname, "Failed to set hostname");
        }

        if !inner.phy.begin(&request.pins) {
            error!(pins = ?request.pins, "PHY bring-up failed");
            inner.transition(s, ConnectionState::ErrorState);
            return Err(EthError::PhyStartFailed);
        }
        s.phy_started = true;

        match &request.static_ip {
            Some(ip) => {
                if !inner.phy.config(ip, mac) {
                    error!(address = %ip.address, "Failed to apply static address");
                    s.phy_started = false;
                    inner.transition(s, ConnectionState::ErrorState);
                    return Err(EthError::ConfigFailed);
                }
                info!(address = %ip.address, gateway = %ip.gateway, "Static address applied");
            }
            None => {
                if let Some(mac) = mac {
                    if !inner.phy.config(&StaticIpConfig::UNSPECIFIED, Some(mac)) {
                        warn!(%mac, "Failed to apply MAC address override");
                    }
                }
            }
        }

        s.netif = inner.phy.netif();
        if s.netif.is_none() {
            debug!("Network interface handle not available");
        }

        Ok(Started {
            link_monitor: s.link_monitor,
            connect_timeout: s.connect_timeout,
        })
    }

    fn apply_config(&self, s: &mut StateStore, config: &EthernetConfig) {
        let inner = &self.inner;
        inner.budgets.set(config.lock_timeouts);
        inner.batcher.configure(&config.batching);
        s.link_monitor = config.link_monitor;
        s.auto_reconnect = config.reconnect.enabled;
        s.backoff.reconfigure(config.reconnect.backoff);
        s.connect_timeout = config.connect_timeout;
        s.trust_window = config.trust_window;
        s.wait_slice = config.wait_slice;
        s.verbose_logging = config.verbose_logging;
        if let Some(mac) = config.mac_address {
            s.pending_mac = Some(mac);
        }
    }

    /// Block the calling thread until an address is acquired.
    ///
    /// Waits in slices so an error state ends the wait early. A timed out
    /// wait rolls nothing back; the interface may still connect later.
    pub fn wait_for_connection(&self, timeout: Duration) -> EthResult<()> {
        let inner = &self.inner;
        if timeout.is_zero() {
            inner.last_error.set(EthError::InvalidParameter);
            return Err(EthError::InvalidParameter);
        }
        if self.is_connected() {
            return Ok(());
        }
        if !self.is_started() {
            error!("Cannot wait for connection, PHY not started");
            inner.last_error.set(EthError::NotInitialized);
            return Err(EthError::NotInitialized);
        }

        let (slice, monitor) = inner.last_error.record(inner.with_store(
            LockBudget::Quick,
            "wait settings",
            |s| (s.wait_slice, s.link_monitor.enabled),
        ))?;

        debug!(?timeout, "Waiting for connection");
        let began = Instant::now();
        loop {
            let elapsed = began.elapsed();
            if elapsed >= timeout {
                break;
            }
            let step = slice.min(timeout - elapsed);

            if inner.signal.wait(step) && self.is_connected() {
                info!(elapsed = ?began.elapsed(), "Connected");
                return Ok(());
            }
            if self.state() == ConnectionState::ErrorState {
                error!("Interface entered error state while waiting");
                inner.last_error.set(EthError::ConnectionTimeout);
                return Err(EthError::ConnectionTimeout);
            }
            if monitor {
                if let Err(error) = inner.poll_link() {
                    debug!(%error, "Link poll skipped");
                }
            }
        }

        error!(?timeout, "Connection timeout");
        inner.last_error.set(EthError::ConnectionTimeout);
        Err(EthError::ConnectionTimeout)
    }

    /// Tear the session down and return to `Uninitialized`.
    ///
    /// Disables auto-reconnect. Event handlers stay registered.
    pub fn disconnect(&self) -> EthResult<()> {
        let inner = &self.inner;
        let now = inner.clock.now_ms();
        let result = inner.with_store(LockBudget::Standard, "disconnect", |s| {
            if s.state == ConnectionState::Uninitialized {
                return Err(EthError::NotInitialized);
            }

            let duration_ms = if s.state == ConnectionState::Connected {
                s.stats.disconnect_count += 1;
                inner.metrics.inc_disconnects();
                s.connection_start_ms.map_or(0, |at| now.saturating_sub(at))
            } else {
                0
            };

            inner.transition(s, ConnectionState::Disconnecting);
            s.auto_reconnect = false;
            s.phy_started = false;
            s.address_obtained = false;
            s.link_up = false;
            s.connection_start_ms = None;
            inner.signal.clear();
            inner.transition(s, ConnectionState::Uninitialized);

            if duration_ms > 0 {
                s.notify(Notification::Disconnected { duration_ms });
            }
            Ok(())
        });

        if let Err(error) = inner.last_error.record(result.and_then(|done| done)) {
            warn!(%error, "Disconnect failed");
            return Err(error);
        }

        inner.stop_timer(TimerKind::Reconnect);
        inner.stop_timer(TimerKind::LinkMonitor);
        info!("Disconnected");
        Ok(())
    }

    /// Return the manager to its just-constructed state.
    ///
    /// Unregisters the event handlers, drops callbacks and settings, zeroes
    /// counters and stops every timer. No callbacks fire.
    pub fn cleanup(&self) -> EthResult<()> {
        let inner = &self.inner;
        let result = inner.with_store(LockBudget::Standard, "cleanup", |s| {
            if s.handlers_registered {
                inner.unsubscribe_all();
            }
            *s = StateStore::default();
        });
        inner.last_error.record(result)?;

        inner.budgets.set(LockTimeouts::default());
        inner.signal.clear();
        inner.total_events.store(0, std::sync::atomic::Ordering::Relaxed);
        inner.batcher.reset();
        inner.shutdown_timers();
        inner.last_error.clear();
        info!("Cleanup complete");
        Ok(())
    }
}

impl<'a> StartRequest<'a> {
    fn from_config(config: &'a EthernetConfig) -> Self {
        Self {
            hostname: config.hostname.as_deref(),
            pins: config.pins,
            static_ip: config.address_mode.static_ip().copied(),
            config: Some(config),
        }
    }
}
