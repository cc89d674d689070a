use std::net::Ipv4Addr;

use auto_impl::auto_impl;

use crate::{InterfaceCounters, LinkMode, MacAddress, NetifHandle, PhyPins, StaticIpConfig};

/// Capabilities of an Ethernet transceiver driver.
///
/// The driver owns register programming and clock generation; callers only
/// sequence these operations. Methods report success as `bool` the way
/// vendor drivers do, and the caller maps failures to its own error kinds.
///
/// Optional capabilities have defaults that report "not supported".
#[auto_impl(&, Arc, Box)]
pub trait PhyDriver: Send + Sync {
    /// Power up the transceiver and start the MAC.
    fn begin(&self, pins: &PhyPins) -> bool;

    /// Apply fixed addressing and an optional hardware address override.
    ///
    /// [`StaticIpConfig::UNSPECIFIED`] keeps dynamic addressing and only
    /// applies `mac`.
    fn config(&self, ip: &StaticIpConfig, mac: Option<MacAddress>) -> bool;

    fn set_hostname(&self, hostname: &str) -> bool;

    fn hostname(&self) -> String;

    /// Address currently bound to the interface, unspecified if none.
    fn local_address(&self) -> Ipv4Addr;

    fn hardware_address(&self) -> MacAddress;

    /// Raw link status from the PHY status register.
    fn link_up(&self) -> bool;

    /// Negotiated speed in Mbit/s.
    fn link_speed(&self) -> u32;

    fn full_duplex(&self) -> bool;

    /// Platform network-interface handle, once the interface exists.
    fn netif(&self) -> Option<NetifHandle> {
        None
    }

    fn set_dns(&self, _dns1: Ipv4Addr, _dns2: Ipv4Addr) -> bool {
        false
    }

    /// Force speed/duplex or re-enable auto-negotiation.
    fn configure_link(&self, _mode: LinkMode) -> bool {
        false
    }

    /// Packet counters, if the interface exposes them.
    fn interface_counters(&self) -> Option<InterfaceCounters> {
        None
    }

    /// Restart the transceiver without tearing down the interface.
    fn reset(&self) -> bool {
        false
    }
}
