mod common;

use std::{
    net::Ipv4Addr,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use common::{HOSTNAME, Harness};
use ethmgr_ethernet::{
    BackoffConfig, ConnectionState::*, EthError, EthernetConfig, LinkMode, NetEvent,
};
use ethmgr_phy::InterfaceCounters;
use parking_lot::Mutex;

/// Poll `check` until it holds or `timeout` passes.
fn eventually(timeout: Duration, check: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    check()
}

fn fast_backoff(max_retries: u32) -> BackoffConfig {
    BackoffConfig::new(Duration::from_millis(10), Duration::from_millis(40), max_retries)
}

#[test]
fn reconnect_gives_up_after_max_retries() {
    let h = Harness::new();
    h.connect_stable();
    h.manager.set_auto_reconnect(true, fast_backoff(3)).unwrap();

    let status = h.manager.reconnect_status().unwrap();
    assert!(status.enabled);
    assert_eq!(status.attempts, 0);
    assert_eq!(status.current_delay, Duration::from_millis(10));

    h.link_down();

    // 10 + 20 + 40 ms of attempts
    assert!(eventually(Duration::from_secs(2), || {
        !h.manager.reconnect_status().unwrap().enabled
    }));
    thread::sleep(Duration::from_millis(150));

    let status = h.manager.reconnect_status().unwrap();
    assert_eq!(status.attempts, 3);
    assert_eq!(h.phy.reset_calls(), 3);
    assert_eq!(h.manager.state(), LinkDown);
}

#[test]
fn reconnect_stands_down_once_connected() {
    let h = Harness::new();
    let config = EthernetConfig::default()
        .with_hostname(HOSTNAME)
        .with_auto_reconnect(
            true,
            BackoffConfig::new(Duration::from_millis(80), Duration::from_millis(200), 0),
        );
    h.manager.initialize_with_config_async(&config).unwrap();
    h.link_up();
    h.acquire();
    h.clock.advance(5_000);

    h.link_down();
    h.link_up();
    h.acquire();
    assert!(h.manager.is_connected());

    thread::sleep(Duration::from_millis(300));
    let status = h.manager.reconnect_status().unwrap();
    assert!(status.enabled);
    assert_eq!(status.attempts, 0);
    assert_eq!(h.phy.reset_calls(), 0);
    assert_eq!(h.manager.statistics().unwrap().reconnect_count, 1);
}

#[test]
fn reconnect_nudge_restores_link_through_poll() {
    let h = Harness::new();
    h.phy.set_supports_reset(true);
    h.connect_stable();
    h.manager.set_auto_reconnect(true, fast_backoff(0)).unwrap();

    h.link_down();
    // The cable comes back without an interrupt
    h.phy.set_link_up(true);

    assert!(eventually(Duration::from_secs(2), || h.manager.state() == LinkUp));
    assert!(h.manager.is_link_up());
    assert!(h.phy.reset_calls() >= 1);

    h.manager.set_auto_reconnect(false, fast_backoff(0)).unwrap();
}

#[test]
fn auto_reconnect_rejects_zero_delay() {
    let h = Harness::new();
    let backoff = BackoffConfig::new(Duration::ZERO, Duration::from_secs(1), 0);
    assert_eq!(
        h.manager.set_auto_reconnect(true, backoff),
        Err(EthError::InvalidParameter)
    );
    assert!(!h.manager.reconnect_status().unwrap().enabled);
}

#[test]
fn disconnect_disables_auto_reconnect() {
    let h = Harness::new();
    h.connect();
    h.manager.set_auto_reconnect(true, fast_backoff(0)).unwrap();
    h.manager.disconnect().unwrap();
    assert!(!h.manager.reconnect_status().unwrap().enabled);
}

#[test]
fn link_monitor_tracks_the_register() {
    let h = Harness::new();
    let links = Arc::new(Mutex::new(Vec::new()));
    let seen = links.clone();
    h.manager
        .set_link_changed_callback(Some(Arc::new(move |up| seen.lock().push(up))))
        .unwrap();

    let config = EthernetConfig::default()
        .with_hostname(HOSTNAME)
        .with_link_monitoring(true, Duration::from_millis(10));
    h.manager.initialize_with_config_async(&config).unwrap();

    h.phy.set_link_up(true);
    assert!(eventually(Duration::from_secs(2), || h.manager.state() == LinkUp));

    h.phy.set_link_up(false);
    assert!(eventually(Duration::from_secs(2), || h.manager.state() == LinkDown));

    assert_eq!(*links.lock(), vec![true, false]);
    assert_eq!(h.manager.statistics().unwrap().link_down_events, 1);

    h.manager
        .set_link_monitoring(false, Duration::from_millis(10))
        .unwrap();
}

#[test]
fn link_monitoring_rejects_zero_interval() {
    let h = Harness::new();
    assert_eq!(
        h.manager.set_link_monitoring(true, Duration::ZERO),
        Err(EthError::InvalidParameter)
    );
    h.manager.set_link_monitoring(false, Duration::ZERO).unwrap();
}

#[test]
fn manual_link_check() {
    let h = Harness::new();
    assert!(!h.manager.check_link_status());

    h.start().unwrap();
    assert!(!h.manager.check_link_status());

    h.phy.set_link_up(true);
    h.phy.set_counters(Some(InterfaceCounters {
        tx_packets: 12,
        rx_packets: 34,
        ..Default::default()
    }));
    assert!(h.manager.check_link_status());
    assert_eq!(h.manager.state(), LinkUp);
    assert!(h.manager.is_link_up());

    let stats = h.manager.statistics().unwrap();
    assert_eq!((stats.tx_packets, stats.rx_packets), (12, 34));
}

#[test]
fn poll_keeps_connected_when_signal_is_set() {
    let h = Harness::new();
    h.start().unwrap();
    h.acquire();
    assert_eq!(h.manager.state(), Connected);

    h.phy.set_link_up(true);
    assert!(h.manager.check_link_status());
    assert_eq!(h.manager.state(), Connected);

    h.phy.set_link_up(false);
    assert!(!h.manager.check_link_status());
    assert_eq!(h.manager.state(), LinkDown);
    assert!(!h.manager.is_connected());
}

#[test]
fn reset_interface_drops_connection() {
    let h = Harness::new();
    assert_eq!(h.manager.reset_interface(), Err(EthError::NotInitialized));

    h.connect();
    h.manager.reset_interface().unwrap();
    assert_eq!(h.manager.state(), LinkDown);
    assert!(!h.manager.is_connected());

    h.link_up();
    h.acquire();
    assert!(h.manager.is_connected());
}

#[test]
fn batched_events_are_drained_by_the_debounce_timer() {
    let h = Harness::new();
    h.start().unwrap();
    h.manager
        .configure_performance(true, Duration::from_millis(100), 10)
        .unwrap();

    h.link_up();
    h.acquire();

    h.manager
        .wait_for_connection(Duration::from_secs(2))
        .unwrap();
    assert_eq!(h.manager.state(), Connected);
    assert_eq!(h.manager.event_count(), 2);
}

#[test]
fn full_batch_queue_falls_back_to_inline_processing() {
    let h = Harness::new();
    let states = h.record_states();
    h.start().unwrap();
    h.manager
        .configure_performance(true, Duration::from_millis(100), 1)
        .unwrap();

    h.link_up();
    h.acquire();

    // The overflow drained the queued link-up first, then the address
    assert!(h.manager.is_connected());
    assert_eq!(states.lock().last(), Some(&(ObtainingAddress, Connected)));
}

#[test]
fn disabling_batching_flushes_the_queue() {
    let h = Harness::new();
    h.start().unwrap();
    h.manager
        .configure_performance(true, Duration::from_millis(100), 10)
        .unwrap();
    h.phy.set_link_up(true);
    h.publish(NetEvent::PhyLinkUp);

    h.manager
        .configure_performance(false, Duration::from_millis(100), 10)
        .unwrap();
    assert_eq!(h.manager.state(), ObtainingAddress);

    assert_eq!(
        h.manager.configure_performance(true, Duration::ZERO, 10),
        Err(EthError::InvalidParameter)
    );
}

#[test]
fn dns_requires_an_interface() {
    let h = Harness::new();
    let dns = (Ipv4Addr::new(1, 1, 1, 1), Ipv4Addr::new(8, 8, 8, 8));
    assert_eq!(
        h.manager.set_dns_servers(dns.0, dns.1),
        Err(EthError::NetifError)
    );

    h.start().unwrap();
    h.manager.set_dns_servers(dns.0, dns.1).unwrap();
    assert_eq!(h.phy.dns(), Some(dns));

    h.phy.set_dns_result(false);
    assert_eq!(
        h.manager.set_dns_servers(dns.0, dns.1),
        Err(EthError::ConfigFailed)
    );
}

#[test]
fn interface_stats_prefer_driver_counters() {
    let h = Harness::new();
    assert_eq!(h.manager.network_interface_stats(), Err(EthError::NetifError));

    h.start().unwrap();
    let stats = h.manager.network_interface_stats().unwrap();
    assert_eq!(stats, Default::default());

    h.phy.set_counters(Some(InterfaceCounters {
        tx_packets: 5,
        rx_packets: 6,
        tx_errors: 1,
        rx_errors: 2,
        ..Default::default()
    }));
    let stats = h.manager.network_interface_stats().unwrap();
    assert_eq!(
        (stats.tx_packets, stats.rx_packets, stats.tx_errors, stats.rx_errors),
        (5, 6, 1, 2)
    );
}

#[test]
fn missing_netif_is_not_fatal() {
    let h = Harness::new();
    h.phy.set_provides_netif(false);
    h.start().unwrap();
    assert!(h.manager.netif().is_none());
    assert_eq!(h.manager.network_interface_stats(), Err(EthError::NetifError));
}

#[test]
fn phy_link_mode_requires_started_phy() {
    let h = Harness::new();
    assert_eq!(
        h.manager.configure_phy(LinkMode::Full100),
        Err(EthError::NotInitialized)
    );
    h.start().unwrap();
    h.manager.configure_phy(LinkMode::Full100).unwrap();
    assert_eq!(h.phy.link_mode(), Some(LinkMode::Full100));
}
