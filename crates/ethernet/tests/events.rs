mod common;

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use common::{ADDRESS, Harness};
use ethmgr_ethernet::{
    BackoffConfig, ConnectionState::*, EthernetConfig, NetEvent, QuickStatus,
};
use ethmgr_net_events::EventClass;
use parking_lot::Mutex;

#[test]
fn link_loss_before_first_address_is_ignored() {
    let h = Harness::new();
    h.start().unwrap();
    h.link_up();
    h.clock.advance(10_000);

    let disconnects = Arc::new(AtomicUsize::new(0));
    let counter = disconnects.clone();
    h.manager
        .set_disconnected_callback(Some(Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })))
        .unwrap();

    h.link_down();
    h.publish(NetEvent::PhyStopped);

    assert_eq!(h.manager.state(), ObtainingAddress);
    assert_eq!(disconnects.load(Ordering::SeqCst), 0);
    let stats = h.manager.statistics().unwrap();
    assert_eq!(stats.disconnect_count, 0);
    assert_eq!(stats.link_down_events, 0);
}

#[test]
fn link_loss_inside_trust_window_is_noise() {
    let h = Harness::new();
    h.connect();

    h.clock.advance(2_999);
    h.publish(NetEvent::PhyLinkDown);

    assert_eq!(h.manager.state(), Connected);
    assert!(h.manager.is_connected());
    assert_eq!(h.manager.statistics().unwrap().disconnect_count, 0);
}

#[test]
fn link_loss_after_trust_window_disconnects() {
    let h = Harness::new();
    let duration = Arc::new(Mutex::new(Vec::new()));
    let seen = duration.clone();
    h.manager
        .set_disconnected_callback(Some(Arc::new(move |ms| seen.lock().push(ms))))
        .unwrap();
    let links = Arc::new(Mutex::new(Vec::new()));
    let seen = links.clone();
    h.manager
        .set_link_changed_callback(Some(Arc::new(move |up| seen.lock().push(up))))
        .unwrap();

    h.connect();
    h.clock.advance(3_000);
    h.link_down();

    assert_eq!(h.manager.state(), LinkDown);
    assert!(!h.manager.is_connected());
    assert!(!h.manager.is_link_up());
    assert_eq!(*duration.lock(), vec![3_000]);
    assert_eq!(*links.lock(), vec![true, false]);

    let stats = h.manager.statistics().unwrap();
    assert_eq!(stats.disconnect_count, 1);
    assert_eq!(stats.link_down_events, 1);
    assert_eq!(stats.uptime_ms, 0);

    // A second loss without a new address is noise again
    h.clock.advance(10_000);
    h.publish(NetEvent::PhyStopped);
    assert_eq!(h.manager.statistics().unwrap().disconnect_count, 1);
}

#[test]
fn custom_trust_window_applies() {
    let h = Harness::new();
    let config = EthernetConfig::default()
        .with_hostname(common::HOSTNAME)
        .with_trust_window(Duration::from_millis(500));
    h.manager.initialize_with_config_async(&config).unwrap();
    h.link_up();
    h.acquire();

    h.clock.advance(600);
    h.link_down();
    assert_eq!(h.manager.state(), LinkDown);
}

#[test]
fn reconnect_counts_after_a_disconnect() {
    let h = Harness::new();
    let states = h.record_states();
    h.connect_stable();
    h.link_down();
    states.lock().clear();

    h.link_up();
    h.acquire();

    assert_eq!(
        *states.lock(),
        vec![
            (LinkDown, LinkUp),
            (LinkUp, ObtainingAddress),
            (ObtainingAddress, Connected),
        ]
    );
    let stats = h.manager.statistics().unwrap();
    assert_eq!(stats.reconnect_count, 1);
    assert_eq!(stats.disconnect_count, 1);
}

#[test]
fn address_renewal_is_counted_not_reported() {
    let h = Harness::new();
    let connected = Arc::new(AtomicUsize::new(0));
    let counter = connected.clone();
    h.manager
        .set_connected_callback(Some(Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })))
        .unwrap();

    h.connect();
    h.acquire();
    h.acquire();

    assert_eq!(connected.load(Ordering::SeqCst), 1);
    assert_eq!(h.manager.statistics().unwrap().address_renewals, 2);
    assert_eq!(h.manager.state(), Connected);
}

#[test]
fn address_without_session_is_ignored() {
    let h = Harness::new();
    h.manager.early_init().unwrap();
    h.acquire();

    assert_eq!(h.manager.state(), Uninitialized);
    assert!(!h.manager.is_connected());
    assert_eq!(h.manager.event_count(), 1);
}

#[test]
fn address_during_phy_start_steps_through_the_chain() {
    let h = Harness::new();
    let states = h.record_states();
    h.start().unwrap();
    h.phy.set_link_up(true);
    h.acquire();

    assert_eq!(
        *states.lock(),
        vec![
            (Uninitialized, PhyStarting),
            (PhyStarting, LinkUp),
            (LinkUp, ObtainingAddress),
            (ObtainingAddress, Connected),
        ]
    );
}

#[test]
fn unknown_and_informational_events_change_nothing() {
    let h = Harness::new();
    let states = h.record_states();
    h.start().unwrap();
    states.lock().clear();

    h.publish(NetEvent::PhyStarted);
    h.publish(NetEvent::Unknown {
        class: EventClass::Phy,
        id: 99,
    });
    h.publish(NetEvent::from_raw(EventClass::Ip, 42, None));

    assert!(states.lock().is_empty());
    assert_eq!(h.manager.state(), PhyStarting);
    assert_eq!(h.manager.event_count(), 3);
}

#[test]
fn events_are_counted_regardless_of_outcome() {
    let h = Harness::new();
    h.connect();
    h.publish(NetEvent::PhyLinkDown);

    let perf = h.manager.performance_metrics().unwrap().unwrap();
    assert_eq!(perf.event_count, 3);
}

#[test]
fn performance_metrics_measure_milestones() {
    let h = Harness::new();
    assert_eq!(h.manager.performance_metrics().unwrap(), None);

    h.start().unwrap();
    h.clock.advance(200);
    h.link_up();
    h.clock.advance(300);
    h.acquire();

    let perf = h.manager.performance_metrics().unwrap().unwrap();
    assert_eq!(perf.init_time_ms, 200);
    assert_eq!(perf.link_to_address_ms, 300);
    assert_eq!(perf.address_time_ms, 500);
    assert_eq!(perf.event_count, 2);
}

#[test]
fn reset_statistics_restarts_counters_from_zero() {
    let h = Harness::new();
    h.connect_stable();
    h.link_down();
    assert_eq!(h.manager.statistics().unwrap().disconnect_count, 1);

    h.manager.reset_statistics().unwrap();
    assert_eq!(h.manager.statistics().unwrap(), Default::default());

    h.link_up();
    h.acquire();
    h.clock.advance(5_000);
    h.link_down();

    let stats = h.manager.statistics().unwrap();
    assert_eq!(stats.disconnect_count, 1);
    assert_eq!(stats.link_down_events, 1);
    // The acquisition after the reset did not follow a counted disconnect
    assert_eq!(stats.reconnect_count, 0);
}

#[test]
fn uptime_is_computed_on_read() {
    let h = Harness::new();
    assert_eq!(h.manager.uptime_ms(), 0);
    assert_eq!(h.manager.uptime_string(), "Not connected");

    h.connect();
    h.clock.advance(61_000);
    assert_eq!(h.manager.uptime_ms(), 61_000);
    assert_eq!(h.manager.uptime_string(), "1m 1s");
    assert_eq!(h.manager.statistics().unwrap().uptime_ms, 61_000);
}

#[test]
fn connected_callback_may_query_the_manager() {
    let h = Arc::new(Harness::new());
    let observed = Arc::new(Mutex::new(None));

    let weak = Arc::downgrade(&h);
    let seen = observed.clone();
    h.manager
        .set_connected_callback(Some(Arc::new(move |ip| {
            if let Some(h) = weak.upgrade() {
                *seen.lock() = Some((ip, h.manager.state(), h.manager.statistics().is_ok()));
            }
        })))
        .unwrap();

    h.connect();
    assert_eq!(*observed.lock(), Some((ADDRESS, Connected, true)));
}

#[test]
fn quick_status_only_while_connected() {
    let h = Harness::new();
    h.phy.set_link_speed(10);
    h.phy.set_full_duplex(false);
    assert_eq!(h.manager.quick_status(), None);

    h.start().unwrap();
    h.link_up();
    assert_eq!(h.manager.quick_status(), None);

    h.acquire();
    assert_eq!(
        h.manager.quick_status(),
        Some(QuickStatus {
            address: ADDRESS,
            link_speed: 10,
            full_duplex: false,
        })
    );

    h.clock.advance(5_000);
    h.link_down();
    assert_eq!(h.manager.quick_status(), None);
}

#[test]
fn diagnostics_report_state_counters_and_policy() {
    let h = Harness::new();
    let mut report = String::new();
    h.manager.dump_diagnostics(&mut report).unwrap();
    assert!(report.contains("Connection State: Uninitialized"));
    assert!(report.contains("PHY Started: No"));
    assert!(!report.contains("IP Address:"));
    assert!(report.contains("Auto Reconnect: Disabled"));

    h.connect_stable();
    h.link_down();
    h.manager
        .set_auto_reconnect(
            true,
            BackoffConfig::new(Duration::from_secs(60), Duration::from_secs(120), 4),
        )
        .unwrap();

    let mut report = String::new();
    h.manager.dump_diagnostics(&mut report).unwrap();
    assert!(report.contains("Connection State: Link Down"), "{report}");
    assert!(report.contains("PHY Started: Yes"));
    assert!(report.contains(&format!("IP Address: {ADDRESS}")));
    assert!(report.contains("Hostname: test-node"));
    assert!(report.contains("Disconnections: 1"));
    assert!(report.contains("Link Down Events: 1"));
    assert!(report.contains("Events Processed: 3"));
    assert!(report.contains("--- Performance ---"));
    assert!(report.contains("Auto Reconnect: Enabled"));
    assert!(report.contains("Max Retries: 4"));
    assert!(report.contains("Current Attempts: 0"));
    assert!(report.contains("Current Delay: 60000 ms"));

    h.manager
        .set_auto_reconnect(false, BackoffConfig::default())
        .unwrap();
}
