//! Value types shared between the driver boundary and its callers.

use std::{fmt, net::Ipv4Addr, str::FromStr};

use serde::{Deserialize, Serialize};

/// Highest valid address on the MDIO management bus.
pub const MAX_PHY_ADDRESS: u8 = 31;

/// Number of GPIO lines on the target; valid pins are `0..GPIO_PIN_COUNT`.
pub const GPIO_PIN_COUNT: i8 = 40;

/// Pin selector meaning "not connected".
pub const UNUSED_PIN: i8 = -1;

/// Length of a hardware address in bytes.
pub const MAC_ADDRESS_LEN: usize = 6;

/// Reference clock wiring for the RMII interface.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ClockMode {
    /// External clock fed into GPIO0.
    Gpio0In,
    /// Internal clock driven out on GPIO0.
    Gpio0Out,
    /// Internal clock driven out on GPIO16.
    Gpio16Out,
    /// Internal clock driven out on GPIO17.
    #[default]
    Gpio17Out,
}

/// Transceiver address and wiring, as passed to [`crate::PhyDriver::begin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhyPins {
    /// Address on the MDIO bus, `0..=31`.
    pub phy_address: u8,
    /// Management data clock pin.
    pub mdc: i8,
    /// Management data I/O pin.
    pub mdio: i8,
    /// Power/enable pin, or [`UNUSED_PIN`].
    pub power: i8,
    pub clock_mode: ClockMode,
}

impl Default for PhyPins {
    fn default() -> Self {
        Self {
            phy_address: 0,
            mdc: 23,
            mdio: 18,
            power: UNUSED_PIN,
            clock_mode: ClockMode::default(),
        }
    }
}

impl PhyPins {
    pub fn is_valid_phy_address(address: u8) -> bool {
        address <= MAX_PHY_ADDRESS
    }

    /// A pin selector is valid if it names an existing GPIO or is the unused
    /// sentinel.
    pub fn is_valid_pin(pin: i8) -> bool {
        pin == UNUSED_PIN || (0..GPIO_PIN_COUNT).contains(&pin)
    }

    /// First out-of-range field, if any.
    pub fn validate(&self) -> Result<(), PinError> {
        if !Self::is_valid_phy_address(self.phy_address) {
            return Err(PinError::PhyAddress(self.phy_address));
        }
        for (name, pin) in [("mdc", self.mdc), ("mdio", self.mdio), ("power", self.power)] {
            if !Self::is_valid_pin(pin) {
                return Err(PinError::Gpio { name, pin });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PinError {
    #[error("PHY address {0} out of range (max {MAX_PHY_ADDRESS})")]
    PhyAddress(u8),
    #[error("{name} pin {pin} out of range")]
    Gpio { name: &'static str, pin: i8 },
}

/// A 48-bit hardware address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MacAddress(pub [u8; MAC_ADDRESS_LEN]);

impl MacAddress {
    pub const ZERO: Self = Self([0; MAC_ADDRESS_LEN]);

    pub const fn new(octets: [u8; MAC_ADDRESS_LEN]) -> Self {
        Self(octets)
    }

    pub const fn octets(&self) -> [u8; MAC_ADDRESS_LEN] {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; MAC_ADDRESS_LEN]
    }
}

impl From<[u8; MAC_ADDRESS_LEN]> for MacAddress {
    fn from(octets: [u8; MAC_ADDRESS_LEN]) -> Self {
        Self(octets)
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid MAC address: {0}")]
pub struct ParseMacError(String);

impl FromStr for MacAddress {
    type Err = ParseMacError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut octets = [0u8; MAC_ADDRESS_LEN];
        let mut parts = s.split([':', '-']);
        for octet in octets.iter_mut() {
            let part = parts.next().ok_or_else(|| ParseMacError(s.to_string()))?;
            if part.len() != 2 {
                return Err(ParseMacError(s.to_string()));
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| ParseMacError(s.to_string()))?;
        }
        if parts.next().is_some() {
            return Err(ParseMacError(s.to_string()));
        }
        Ok(Self(octets))
    }
}

/// Fixed network addressing pushed down to the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticIpConfig {
    pub address: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub dns1: Ipv4Addr,
    pub dns2: Ipv4Addr,
}

impl StaticIpConfig {
    /// All fields unspecified. Passed to the driver when only a hardware
    /// address override needs applying.
    pub const UNSPECIFIED: Self = Self {
        address: Ipv4Addr::UNSPECIFIED,
        gateway: Ipv4Addr::UNSPECIFIED,
        netmask: Ipv4Addr::UNSPECIFIED,
        dns1: Ipv4Addr::UNSPECIFIED,
        dns2: Ipv4Addr::UNSPECIFIED,
    };

    pub fn new(address: Ipv4Addr, gateway: Ipv4Addr, netmask: Ipv4Addr) -> Self {
        Self {
            address,
            gateway,
            netmask,
            ..Self::UNSPECIFIED
        }
    }

    pub fn with_dns(mut self, dns1: Ipv4Addr, dns2: Ipv4Addr) -> Self {
        self.dns1 = dns1;
        self.dns2 = dns2;
        self
    }

    /// Address, gateway and mask are all set.
    pub fn is_complete(&self) -> bool {
        !self.address.is_unspecified()
            && !self.gateway.is_unspecified()
            && !self.netmask.is_unspecified()
    }
}

/// Requested link speed and duplex.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display,
)]
pub enum LinkMode {
    #[default]
    #[strum(serialize = "auto-negotiate")]
    AutoNegotiate,
    #[strum(serialize = "10M half")]
    Half10,
    #[strum(serialize = "10M full")]
    Full10,
    #[strum(serialize = "100M half")]
    Half100,
    #[strum(serialize = "100M full")]
    Full100,
}

impl LinkMode {
    pub fn from_speed(speed_mbps: u32, full_duplex: bool, auto_negotiate: bool) -> Option<Self> {
        if auto_negotiate {
            return Some(Self::AutoNegotiate);
        }
        match (speed_mbps, full_duplex) {
            (10, false) => Some(Self::Half10),
            (10, true) => Some(Self::Full10),
            (100, false) => Some(Self::Half100),
            (100, true) => Some(Self::Full100),
            _ => None,
        }
    }
}

/// Packet counters reported by the network interface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceCounters {
    pub tx_packets: u64,
    pub rx_packets: u64,
    pub tx_bytes: u64,
    pub rx_bytes: u64,
    pub tx_errors: u64,
    pub rx_errors: u64,
}

/// Opaque handle to the platform network interface bound to the PHY.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NetifHandle(pub u32);
