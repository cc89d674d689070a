use ethmgr_phy::InterfaceCounters;
use serde::{Deserialize, Serialize};

/// Session counters. Monotonic between resets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkStatistics {
    /// Confirmed disconnects.
    pub disconnect_count: u64,
    /// Address acquisitions that followed a disconnect.
    pub reconnect_count: u64,
    pub tx_packets: u64,
    pub rx_packets: u64,
    pub tx_bytes: u64,
    pub rx_bytes: u64,
    /// Link losses seen by the event bridge or the link poll.
    pub link_down_events: u64,
    /// Address acquisitions while already connected.
    pub address_renewals: u64,
    /// Clock reading at the last address acquisition.
    pub connect_time_ms: Option<u64>,
    /// Time since `connect_time_ms`, computed when the snapshot is taken.
    /// Zero while disconnected.
    pub uptime_ms: u64,
}

impl NetworkStatistics {
    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }

    /// Copy interface traffic counters into the session record.
    pub(crate) fn sample(&mut self, counters: &InterfaceCounters) {
        self.tx_packets = counters.tx_packets;
        self.rx_packets = counters.rx_packets;
        self.tx_bytes = counters.tx_bytes;
        self.rx_bytes = counters.rx_bytes;
    }
}

/// Packet and error counters of the bound network interface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceStats {
    pub tx_packets: u64,
    pub rx_packets: u64,
    pub tx_errors: u64,
    pub rx_errors: u64,
}

impl From<InterfaceCounters> for InterfaceStats {
    fn from(counters: InterfaceCounters) -> Self {
        Self {
            tx_packets: counters.tx_packets,
            rx_packets: counters.rx_packets,
            tx_errors: counters.tx_errors,
            rx_errors: counters.rx_errors,
        }
    }
}
