//! Ethernet transceiver driver boundary.
//!
//! [`PhyDriver`] is the black-box capability the interface manager sequences:
//! bring-up, addressing, link status and identity. Everything below it
//! (register programming, clock generation, MAC DMA) belongs to the platform.

mod driver;
mod types;

#[cfg(any(test, feature = "test-utils"))]
mod mock;

pub use driver::PhyDriver;
pub use types::{
    ClockMode, GPIO_PIN_COUNT, InterfaceCounters, LinkMode, MAC_ADDRESS_LEN, MAX_PHY_ADDRESS,
    MacAddress, NetifHandle, ParseMacError, PhyPins, PinError, StaticIpConfig, UNUSED_PIN,
};

#[cfg(any(test, feature = "test-utils"))]
pub use mock::MockPhy;
