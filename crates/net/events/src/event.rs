//! Event classes and the discriminated event type.

use std::net::Ipv4Addr;

/// Raw event identifiers as reported by the driver firmware.
pub mod raw {
    /// PHY driver started.
    pub const PHY_START: i32 = 0;
    /// PHY driver stopped.
    pub const PHY_STOP: i32 = 1;
    /// Link established.
    pub const PHY_CONNECTED: i32 = 2;
    /// Link lost.
    pub const PHY_DISCONNECTED: i32 = 3;
    /// Address assigned to the wired interface.
    pub const IP_GOT_IP: i32 = 4;
}

/// Source of an event. One handler may be registered per class.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::IntoStaticStr,
    strum::EnumIter,
    strum::EnumCount,
)]
#[strum(serialize_all = "kebab-case")]
pub enum EventClass {
    /// Transceiver lifecycle and link events.
    Phy,
    /// Address assignment events.
    Ip,
}

/// A single notification delivered to a class handler.
#[derive(Debug, Clone, PartialEq, Eq, strum::IntoStaticStr)]
pub enum NetEvent {
    /// Transceiver started; link status not yet reported.
    PhyStarted,
    /// Physical link established.
    PhyLinkUp,
    /// Physical link lost.
    PhyLinkDown,
    /// Transceiver stopped.
    PhyStopped,
    /// Address assignment completed.
    AddressAcquired { address: Ipv4Addr },
    /// An event kind this crate does not know about.
    Unknown { class: EventClass, id: i32 },
}

impl NetEvent {
    /// Classify a raw `(class, id)` pair.
    ///
    /// Address events without a payload address and ids outside the known set
    /// map to [`NetEvent::Unknown`].
    pub fn from_raw(class: EventClass, id: i32, address: Option<Ipv4Addr>) -> Self {
        match (class, id) {
            (EventClass::Phy, raw::PHY_START) => Self::PhyStarted,
            (EventClass::Phy, raw::PHY_STOP) => Self::PhyStopped,
            (EventClass::Phy, raw::PHY_CONNECTED) => Self::PhyLinkUp,
            (EventClass::Phy, raw::PHY_DISCONNECTED) => Self::PhyLinkDown,
            (EventClass::Ip, raw::IP_GOT_IP) => match address {
                Some(address) => Self::AddressAcquired { address },
                None => Self::Unknown { class, id },
            },
            _ => Self::Unknown { class, id },
        }
    }

    /// The class whose handler receives this event.
    pub fn class(&self) -> EventClass {
        match self {
            Self::PhyStarted | Self::PhyLinkUp | Self::PhyLinkDown | Self::PhyStopped => {
                EventClass::Phy
            }
            Self::AddressAcquired { .. } => EventClass::Ip,
            Self::Unknown { class, .. } => *class,
        }
    }

    pub fn name(&self) -> &'static str {
        self.into()
    }

    /// True for the two kinds that report loss of the physical link.
    pub fn is_link_loss(&self) -> bool {
        matches!(self, Self::PhyLinkDown | Self::PhyStopped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw_known_ids() {
        assert_eq!(
            NetEvent::from_raw(EventClass::Phy, raw::PHY_START, None),
            NetEvent::PhyStarted
        );
        assert_eq!(
            NetEvent::from_raw(EventClass::Phy, raw::PHY_CONNECTED, None),
            NetEvent::PhyLinkUp
        );
        assert_eq!(
            NetEvent::from_raw(EventClass::Phy, raw::PHY_DISCONNECTED, None),
            NetEvent::PhyLinkDown
        );
        assert_eq!(
            NetEvent::from_raw(EventClass::Phy, raw::PHY_STOP, None),
            NetEvent::PhyStopped
        );

        let address = Ipv4Addr::new(192, 168, 1, 50);
        assert_eq!(
            NetEvent::from_raw(EventClass::Ip, raw::IP_GOT_IP, Some(address)),
            NetEvent::AddressAcquired { address }
        );
    }

    #[test]
    fn test_from_raw_unknown_ids() {
        assert_eq!(
            NetEvent::from_raw(EventClass::Phy, 42, None),
            NetEvent::Unknown {
                class: EventClass::Phy,
                id: 42
            }
        );
        // GOT_IP without a payload cannot be acted upon
        assert_eq!(
            NetEvent::from_raw(EventClass::Ip, raw::IP_GOT_IP, None),
            NetEvent::Unknown {
                class: EventClass::Ip,
                id: raw::IP_GOT_IP
            }
        );
        // A PHY id on the IP class is not a PHY event
        assert_eq!(
            NetEvent::from_raw(EventClass::Ip, raw::PHY_START, None).class(),
            EventClass::Ip
        );
    }

    #[test]
    fn test_event_class_and_name() {
        assert_eq!(NetEvent::PhyLinkUp.class(), EventClass::Phy);
        assert_eq!(
            NetEvent::AddressAcquired {
                address: Ipv4Addr::LOCALHOST
            }
            .class(),
            EventClass::Ip
        );
        assert_eq!(NetEvent::PhyStopped.name(), "PhyStopped");
        assert!(NetEvent::PhyStopped.is_link_loss());
        assert!(!NetEvent::PhyStarted.is_link_loss());
        assert_eq!(EventClass::Phy.to_string(), "phy");
    }
}
