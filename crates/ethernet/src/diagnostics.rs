//! Status queries, performance metrics and the diagnostic report.

use std::{fmt, net::Ipv4Addr, sync::atomic::Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    EthResult, EthernetManager, PerformanceMetrics, error_to_string, manager::Inner,
    store::LockBudget,
};

/// Address and link parameters read together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickStatus {
    pub address: Ipv4Addr,
    /// Megabits per second.
    pub link_speed: u32,
    pub full_duplex: bool,
}

/// Render a connected duration as `"1d 2h 3m 4s"`, omitting leading zero
/// units. Zero is `"Not connected"`.
pub fn format_uptime(uptime_ms: u64) -> String {
    if uptime_ms == 0 {
        return "Not connected".to_string();
    }

    let total = uptime_ms / 1_000;
    let (days, hours, minutes, seconds) =
        (total / 86_400, total / 3_600 % 24, total / 60 % 60, total % 60);

    let mut out = String::new();
    if days > 0 {
        out.push_str(&format!("{days}d "));
    }
    if days > 0 || hours > 0 {
        out.push_str(&format!("{hours}h "));
    }
    if days > 0 || hours > 0 || minutes > 0 {
        out.push_str(&format!("{minutes}m "));
    }
    out.push_str(&format!("{seconds}s"));
    out
}

fn yes_no(value: bool) -> &'static str {
    if value { "Yes" } else { "No" }
}

impl Inner {
    /// Log the interface status, multi-line when verbose logging is on.
    pub(crate) fn log_status(&self) {
        let Ok((started, verbose)) =
            self.with_store(LockBudget::Quick, "log status", |s| (s.phy_started, s.verbose_logging))
        else {
            return;
        };
        if !started {
            info!("Ethernet PHY not started");
            return;
        }

        let phy = &self.phy;
        let duplex = if phy.full_duplex() { "full" } else { "half" };
        if verbose {
            info!("Ethernet status:");
            info!("  IP     : {}", phy.local_address());
            info!("  MAC    : {}", phy.hardware_address());
            info!("  Host   : {}", phy.hostname());
            info!("  Speed  : {} Mbps", phy.link_speed());
            info!("  Duplex : {duplex}");
        } else {
            info!(
                address = %phy.local_address(),
                speed_mbps = phy.link_speed(),
                duplex,
                "Connected"
            );
            debug!(mac = %phy.hardware_address(), hostname = %phy.hostname());
        }
    }
}

impl EthernetManager {
    /// Address and link parameters, `None` unless connected.
    pub fn quick_status(&self) -> Option<QuickStatus> {
        if !self.is_connected() {
            return None;
        }
        let phy = &self.inner.phy;
        Some(QuickStatus {
            address: phy.local_address(),
            link_speed: phy.link_speed(),
            full_duplex: phy.full_duplex(),
        })
    }

    /// Milestone timings of the current session, `None` before the first
    /// PHY start.
    pub fn performance_metrics(&self) -> EthResult<Option<PerformanceMetrics>> {
        let inner = &self.inner;
        let events = inner.total_events.load(Ordering::Relaxed);
        inner.with_store(LockBudget::Quick, "performance metrics", |s| {
            s.milestones.performance(events)
        })
    }

    /// Events received from the substrate since construction or cleanup.
    pub fn event_count(&self) -> u64 {
        self.inner.total_events.load(Ordering::Relaxed)
    }

    /// Milliseconds since the address was acquired, zero while disconnected.
    pub fn uptime_ms(&self) -> u64 {
        self.statistics().map_or(0, |stats| stats.uptime_ms)
    }

    pub fn uptime_string(&self) -> String {
        format_uptime(self.uptime_ms())
    }

    pub fn log_status(&self) {
        self.inner.log_status();
    }

    /// Write a human-readable report of state, interface, statistics and
    /// reconnect policy to `out`.
    pub fn dump_diagnostics<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
        let inner = &self.inner;
        let started = self.is_started();

        writeln!(out, "=== Ethernet Manager Diagnostics ===")?;
        writeln!(out, "Connection State: {}", self.state())?;
        writeln!(out, "Previous State: {}", self.previous_state())?;
        writeln!(out, "PHY Started: {}", yes_no(started))?;
        writeln!(out, "Connected: {}", yes_no(self.is_connected()))?;
        writeln!(out, "Last Error: {}", error_to_string(self.last_error()))?;

        if started {
            let phy = &inner.phy;
            writeln!(out, "IP Address: {}", phy.local_address())?;
            writeln!(out, "MAC Address: {}", phy.hardware_address())?;
            writeln!(out, "Hostname: {}", phy.hostname())?;
            writeln!(out, "Link Speed: {} Mbps", phy.link_speed())?;
            writeln!(out, "Full Duplex: {}", yes_no(phy.full_duplex()))?;
        }

        writeln!(out)?;
        writeln!(out, "--- Network Statistics ---")?;
        match self.statistics() {
            Ok(stats) => {
                writeln!(out, "Uptime: {}", format_uptime(stats.uptime_ms))?;
                writeln!(out, "Disconnections: {}", stats.disconnect_count)?;
                writeln!(out, "Reconnections: {}", stats.reconnect_count)?;
                writeln!(out, "Link Down Events: {}", stats.link_down_events)?;
                writeln!(out, "Address Renewals: {}", stats.address_renewals)?;
                writeln!(out, "TX Packets: {}", stats.tx_packets)?;
                writeln!(out, "RX Packets: {}", stats.rx_packets)?;
            }
            Err(error) => {
                warn!(%error, "Statistics unavailable for diagnostics");
                writeln!(out, "Unavailable ({error})")?;
            }
        }
        writeln!(out, "Events Processed: {}", self.event_count())?;

        if let Ok(Some(perf)) = self.performance_metrics() {
            writeln!(out)?;
            writeln!(out, "--- Performance ---")?;
            writeln!(out, "PHY Start to Link Up: {} ms", perf.init_time_ms)?;
            writeln!(out, "Link Up to Address: {} ms", perf.link_to_address_ms)?;
            writeln!(out, "PHY Start to Address: {} ms", perf.address_time_ms)?;
        }

        writeln!(out)?;
        writeln!(out, "--- Configuration ---")?;
        if let Ok(reconnect) = self.reconnect_status() {
            if reconnect.enabled {
                writeln!(out, "Auto Reconnect: Enabled")?;
                let max = reconnect.config.max_retries;
                if max == 0 {
                    writeln!(out, "Max Retries: Infinite")?;
                } else {
                    writeln!(out, "Max Retries: {max}")?;
                }
                writeln!(out, "Current Attempts: {}", reconnect.attempts)?;
                writeln!(out, "Current Delay: {} ms", reconnect.current_delay.as_millis())?;
            } else {
                writeln!(out, "Auto Reconnect: Disabled")?;
            }
        }
        writeln!(out, "=================================")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(0), "Not connected");
        assert_eq!(format_uptime(999), "0s");
        assert_eq!(format_uptime(42_000), "42s");
        assert_eq!(format_uptime(60_000), "1m 0s");
        assert_eq!(format_uptime(3_600_000 + 5_000), "1h 0m 5s");
        assert_eq!(format_uptime(86_400_000 * 2 + 3_600_000 * 3 + 4 * 60_000 + 5_000), "2d 3h 4m 5s");
    }
}
