//! Command line arguments.

use std::{net::Ipv4Addr, time::Duration};

use clap::{Args, Parser};
use ethmgr_ethernet::{
    BackoffConfig, BatchConfig, ClockMode, DEFAULT_HOSTNAME, EthernetConfig, MacAddress,
    StaticIpConfig,
};
use ethmgr_observability::LogArgs;
use eyre::{Result, bail};

/// Bring up a wired interface against a simulated transceiver and print its
/// diagnostics.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub(crate) struct Cli {
    #[command(flatten)]
    pub(crate) logs: LogArgs,

    #[command(flatten)]
    pub(crate) eth: EthernetArgs,

    #[command(flatten)]
    pub(crate) sim: SimArgs,
}

/// Interface manager configuration.
#[derive(Debug, Args, Clone)]
#[command(next_help_heading = "Ethernet")]
pub(crate) struct EthernetArgs {
    /// Hostname announced by the interface.
    #[arg(long = "eth.hostname", default_value = DEFAULT_HOSTNAME)]
    pub(crate) hostname: String,

    /// PHY address on the MDIO bus.
    #[arg(long = "eth.phy-addr", default_value_t = 0)]
    pub(crate) phy_address: u8,

    #[arg(long = "eth.mdc", default_value_t = 23, allow_hyphen_values = true)]
    pub(crate) mdc: i8,

    #[arg(long = "eth.mdio", default_value_t = 18, allow_hyphen_values = true)]
    pub(crate) mdio: i8,

    /// Power pin, -1 if unused.
    #[arg(long = "eth.power", default_value_t = -1, allow_hyphen_values = true)]
    pub(crate) power: i8,

    /// Reference clock mode (gpio0-in, gpio0-out, gpio16-out, gpio17-out).
    #[arg(long = "eth.clock-mode", default_value = "gpio17-out")]
    pub(crate) clock_mode: ClockMode,

    /// Fixed address. Requires `--eth.gateway` and `--eth.netmask`.
    #[arg(long = "eth.static-ip", value_name = "ADDR")]
    pub(crate) static_ip: Option<Ipv4Addr>,

    #[arg(long = "eth.gateway", value_name = "ADDR")]
    pub(crate) gateway: Option<Ipv4Addr>,

    #[arg(long = "eth.netmask", value_name = "ADDR")]
    pub(crate) netmask: Option<Ipv4Addr>,

    /// DNS servers for the fixed address, comma separated.
    #[arg(long = "eth.dns", value_delimiter = ',', value_name = "ADDR")]
    pub(crate) dns: Vec<Ipv4Addr>,

    /// Hardware address override (AA:BB:CC:DD:EE:FF).
    #[arg(long = "eth.mac", value_name = "MAC")]
    pub(crate) mac: Option<MacAddress>,

    /// Poll the link register every N milliseconds.
    #[arg(long = "eth.link-monitor-ms", value_name = "MS")]
    pub(crate) link_monitor_ms: Option<u64>,

    /// Reconnect after confirmed disconnects.
    #[arg(long = "eth.reconnect")]
    pub(crate) reconnect: bool,

    #[arg(long = "eth.reconnect-initial-ms", default_value_t = 1_000)]
    pub(crate) reconnect_initial_ms: u64,

    #[arg(long = "eth.reconnect-max-ms", default_value_t = 30_000)]
    pub(crate) reconnect_max_ms: u64,

    /// Give up after N attempts, 0 for unlimited.
    #[arg(long = "eth.reconnect-retries", default_value_t = 0)]
    pub(crate) reconnect_retries: u32,

    #[arg(long = "eth.connect-timeout-ms", default_value_t = 5_000)]
    pub(crate) connect_timeout_ms: u64,

    /// Link-loss events this soon after link-up are ignored.
    #[arg(long = "eth.trust-window-ms", default_value_t = 3_000)]
    pub(crate) trust_window_ms: u64,

    /// Debounce substrate events.
    #[arg(long = "eth.batching")]
    pub(crate) batching: bool,

    /// Multi-line status logging.
    #[arg(long = "eth.verbose-status")]
    pub(crate) verbose_status: bool,
}

impl EthernetArgs {
    pub(crate) fn to_config(&self) -> Result<EthernetConfig> {
        let mut config = EthernetConfig::default()
            .with_hostname(self.hostname.clone())
            .with_phy_address(self.phy_address)
            .with_mdc_pin(self.mdc)
            .with_mdio_pin(self.mdio)
            .with_power_pin(self.power)
            .with_clock_mode(self.clock_mode)
            .with_connect_timeout(Duration::from_millis(self.connect_timeout_ms))
            .with_trust_window(Duration::from_millis(self.trust_window_ms))
            .with_verbose_logging(self.verbose_status)
            .with_auto_reconnect(
                self.reconnect,
                BackoffConfig::new(
                    Duration::from_millis(self.reconnect_initial_ms),
                    Duration::from_millis(self.reconnect_max_ms),
                    self.reconnect_retries,
                ),
            )
            .with_batching(BatchConfig {
                enabled: self.batching,
                ..BatchConfig::default()
            });

        if let Some(interval) = self.link_monitor_ms {
            config = config.with_link_monitoring(true, Duration::from_millis(interval));
        }
        if let Some(mac) = self.mac {
            config = config.with_mac_address(mac);
        }

        match (self.static_ip, self.gateway, self.netmask) {
            (None, None, None) => {}
            (Some(address), Some(gateway), Some(netmask)) => {
                let mut dns = self.dns.iter().copied();
                let ip = StaticIpConfig::new(address, gateway, netmask).with_dns(
                    dns.next().unwrap_or(Ipv4Addr::UNSPECIFIED),
                    dns.next().unwrap_or(Ipv4Addr::UNSPECIFIED),
                );
                config = config.with_static_ip(ip);
            }
            _ => bail!("--eth.static-ip, --eth.gateway and --eth.netmask must be given together"),
        }

        Ok(config)
    }
}

/// Simulated hardware behaviour.
#[derive(Debug, Args, Clone)]
#[command(next_help_heading = "Simulation")]
pub(crate) struct SimArgs {
    /// Delay before the cable reports link.
    #[arg(long = "sim.link-delay-ms", default_value_t = 200)]
    pub(crate) link_delay_ms: u64,

    /// Delay between link-up and the DHCP lease.
    #[arg(long = "sim.lease-delay-ms", default_value_t = 300)]
    pub(crate) lease_delay_ms: u64,

    /// Address handed out by the simulated DHCP server.
    #[arg(long = "sim.lease", default_value = "192.168.1.100")]
    pub(crate) lease: Ipv4Addr,

    /// Negotiated link speed in Mbps.
    #[arg(long = "sim.speed", default_value_t = 100)]
    pub(crate) speed: u32,

    /// Pull the cable once after the trust window and plug it back in.
    #[arg(long = "sim.flap")]
    pub(crate) flap: bool,
}
