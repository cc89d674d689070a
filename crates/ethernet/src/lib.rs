//! Lifecycle and connection-state manager for a single wired interface.
//!
//! [`EthernetManager`] sequences transceiver bring-up through a
//! [`PhyDriver`](ethmgr_phy::PhyDriver), turns substrate events into a
//! validated [`ConnectionState`] machine, filters link-loss noise around
//! link establishment, and optionally supervises the link with periodic
//! polling and capped exponential reconnect backoff.
//!
//! ```text
//! Uninitialized -> PhyStarting -> LinkUp -> ObtainingAddress -> Connected
//!                       |            ^  |                          |
//!                       v            |  v                          v
//!                    LinkDown <------+--+------------------- LinkDown
//! ```
//!
//! Any state may move to `Disconnecting` or `ErrorState`.
//!
//! User callbacks always run after the state lock has been released.

mod batch;
mod bridge;
mod callbacks;
mod clock;
mod config;
mod diagnostics;
mod error;
mod init;
mod machine;
mod manager;
mod metrics;
mod signal;
mod state;
mod stats;
mod store;
mod supervisor;

pub use callbacks::{
    ConnectedCallback, DisconnectedCallback, LinkChangedCallback, StateChangedCallback,
};
pub use clock::{Clock, MockClock, SystemClock};
pub use config::{
    AddressMode, BatchConfig, DEFAULT_BATCH_CAPACITY, DEFAULT_BATCH_WINDOW,
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_HOSTNAME, DEFAULT_LINK_MONITOR_INTERVAL,
    DEFAULT_TRUST_WINDOW, DEFAULT_WAIT_SLICE, EthernetConfig, LinkMonitorConfig, LockTimeouts,
    MAX_HOSTNAME_LEN, ReconnectConfig,
};
pub use diagnostics::{QuickStatus, format_uptime};
pub use error::{EthError, EthResult, error_to_string};
pub use machine::PerformanceMetrics;
pub use manager::EthernetManager;
pub use state::{ConnectionState, state_to_string};
pub use stats::{InterfaceStats, NetworkStatistics};
pub use supervisor::ReconnectStatus;

pub use ethmgr_net_backoff::BackoffConfig;
pub use ethmgr_net_events::NetEvent;
pub use ethmgr_phy::{ClockMode, LinkMode, MacAddress, PhyPins, StaticIpConfig};
