#![allow(dead_code)]

use std::{net::Ipv4Addr, sync::Arc};

use ethmgr_ethernet::{
    ConnectionState, EthResult, EthernetManager, MockClock, NetEvent, PhyPins,
};
use ethmgr_net_events::EventBus;
use ethmgr_phy::MockPhy;
use parking_lot::Mutex;

pub const HOSTNAME: &str = "test-node";
pub const ADDRESS: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 42);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

/// A manager wired to a mock transceiver, an in-process bus and a manual
/// clock. Events are delivered synchronously on the test thread.
pub struct Harness {
    pub phy: Arc<MockPhy>,
    pub bus: Arc<EventBus>,
    pub clock: Arc<MockClock>,
    pub manager: EthernetManager,
}

impl Harness {
    pub fn new() -> Self {
        init_tracing();
        let phy = Arc::new(MockPhy::new());
        phy.set_local_address(ADDRESS);
        let bus = Arc::new(EventBus::new());
        let clock = Arc::new(MockClock::default());
        let manager = EthernetManager::with_clock(phy.clone(), bus.clone(), clock.clone());
        Self {
            phy,
            bus,
            clock,
            manager,
        }
    }

    pub fn start(&self) -> EthResult<()> {
        self.manager.initialize_async(Some(HOSTNAME), PhyPins::default())
    }

    pub fn publish(&self, event: NetEvent) {
        assert!(self.bus.publish(event), "no handler registered");
    }

    /// The cable is plugged in and the driver reports it.
    pub fn link_up(&self) {
        self.phy.set_link_up(true);
        self.publish(NetEvent::PhyLinkUp);
    }

    pub fn link_down(&self) {
        self.phy.set_link_up(false);
        self.publish(NetEvent::PhyLinkDown);
    }

    pub fn acquire(&self) {
        self.publish(NetEvent::AddressAcquired { address: ADDRESS });
    }

    /// Start, raise the link and acquire an address.
    pub fn connect(&self) {
        self.start().unwrap();
        self.link_up();
        self.acquire();
        assert!(self.manager.is_connected());
    }

    /// Connect and let the trust window pass.
    pub fn connect_stable(&self) {
        self.connect();
        self.clock.advance(5_000);
    }

    /// Record every `(old, new)` transition from now on.
    pub fn record_states(&self) -> Arc<Mutex<Vec<(ConnectionState, ConnectionState)>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        self.manager
            .set_state_changed_callback(Some(Arc::new(move |old, new| {
                sink.lock().push((old, new));
            })))
            .unwrap();
        log
    }
}
