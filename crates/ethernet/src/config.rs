//! Manager configuration.

use std::time::Duration;

use ethmgr_net_backoff::BackoffConfig;
use ethmgr_phy::{ClockMode, MacAddress, PhyPins, StaticIpConfig};
use serde::{Deserialize, Serialize};

/// Hostname used when none is configured.
pub const DEFAULT_HOSTNAME: &str = "eth-node";

/// Longest accepted hostname.
pub const MAX_HOSTNAME_LEN: usize = 63;

/// Blocking-initialization wait for an address.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Link-loss events this soon after link-up are treated as noise.
pub const DEFAULT_TRUST_WINDOW: Duration = Duration::from_millis(3_000);

/// Granularity of blocking waits.
pub const DEFAULT_WAIT_SLICE: Duration = Duration::from_millis(100);

pub const DEFAULT_LINK_MONITOR_INTERVAL: Duration = Duration::from_millis(1_000);

/// Debounce window for batched events.
pub const DEFAULT_BATCH_WINDOW: Duration = Duration::from_millis(50);

pub const DEFAULT_BATCH_CAPACITY: usize = 10;

/// Lock acquisition budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockTimeouts {
    /// Simple setters and queries.
    pub quick: Duration,
    /// Structural changes (disconnect, cleanup, event handling).
    pub standard: Duration,
    /// The startup critical section.
    pub init: Duration,
}

impl Default for LockTimeouts {
    fn default() -> Self {
        Self {
            quick: Duration::from_millis(100),
            standard: Duration::from_millis(1_000),
            init: Duration::from_millis(5_000),
        }
    }
}

/// How the interface obtains its address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressMode {
    #[default]
    Dhcp,
    Static(StaticIpConfig),
}

impl AddressMode {
    pub fn static_ip(&self) -> Option<&StaticIpConfig> {
        match self {
            Self::Dhcp => None,
            Self::Static(ip) => Some(ip),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkMonitorConfig {
    pub enabled: bool,
    pub interval: Duration,
}

impl Default for LinkMonitorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval: DEFAULT_LINK_MONITOR_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectConfig {
    pub enabled: bool,
    pub backoff: BackoffConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    pub enabled: bool,
    pub window: Duration,
    pub capacity: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            window: DEFAULT_BATCH_WINDOW,
            capacity: DEFAULT_BATCH_CAPACITY,
        }
    }
}

/// Complete manager configuration.
///
/// Built with the `with_*` methods; validated when passed to
/// [`crate::EthernetManager::initialize_with_config`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EthernetConfig {
    /// `None` is rejected at initialization.
    pub hostname: Option<String>,
    pub pins: PhyPins,
    pub address_mode: AddressMode,
    /// Hardware address override applied at bring-up.
    pub mac_address: Option<MacAddress>,
    pub link_monitor: LinkMonitorConfig,
    pub reconnect: ReconnectConfig,
    pub connect_timeout: Duration,
    pub trust_window: Duration,
    pub wait_slice: Duration,
    pub lock_timeouts: LockTimeouts,
    pub batching: BatchConfig,
    pub verbose_logging: bool,
}

impl Default for EthernetConfig {
    fn default() -> Self {
        Self {
            hostname: Some(DEFAULT_HOSTNAME.to_string()),
            pins: PhyPins::default(),
            address_mode: AddressMode::Dhcp,
            mac_address: None,
            link_monitor: LinkMonitorConfig::default(),
            reconnect: ReconnectConfig::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            trust_window: DEFAULT_TRUST_WINDOW,
            wait_slice: DEFAULT_WAIT_SLICE,
            lock_timeouts: LockTimeouts::default(),
            batching: BatchConfig::default(),
            verbose_logging: false,
        }
    }
}

impl EthernetConfig {
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    pub fn with_phy_address(mut self, address: u8) -> Self {
        self.pins.phy_address = address;
        self
    }

    pub fn with_mdc_pin(mut self, pin: i8) -> Self {
        self.pins.mdc = pin;
        self
    }

    pub fn with_mdio_pin(mut self, pin: i8) -> Self {
        self.pins.mdio = pin;
        self
    }

    pub fn with_power_pin(mut self, pin: i8) -> Self {
        self.pins.power = pin;
        self
    }

    pub fn with_clock_mode(mut self, mode: ClockMode) -> Self {
        self.pins.clock_mode = mode;
        self
    }

    pub fn with_mac_address(mut self, mac: MacAddress) -> Self {
        self.mac_address = Some(mac);
        self
    }

    /// Switch to fixed addressing.
    pub fn with_static_ip(mut self, ip: StaticIpConfig) -> Self {
        self.address_mode = AddressMode::Static(ip);
        self
    }

    /// Switch back to dynamic addressing.
    pub fn with_dhcp(mut self) -> Self {
        self.address_mode = AddressMode::Dhcp;
        self
    }

    pub fn with_link_monitoring(mut self, enabled: bool, interval: Duration) -> Self {
        self.link_monitor = LinkMonitorConfig { enabled, interval };
        self
    }

    pub fn with_auto_reconnect(mut self, enabled: bool, backoff: BackoffConfig) -> Self {
        self.reconnect = ReconnectConfig { enabled, backoff };
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_trust_window(mut self, window: Duration) -> Self {
        self.trust_window = window;
        self
    }

    pub fn with_lock_timeouts(mut self, timeouts: LockTimeouts) -> Self {
        self.lock_timeouts = timeouts;
        self
    }

    pub fn with_batching(mut self, batching: BatchConfig) -> Self {
        self.batching = batching;
        self
    }

    pub fn with_verbose_logging(mut self, verbose: bool) -> Self {
        self.verbose_logging = verbose;
        self
    }
}
