//! Simulated transceiver and cable.

use std::{
    io,
    net::Ipv4Addr,
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

use ethmgr_net_events::{EventSender, NetEvent};
use ethmgr_phy::{
    InterfaceCounters, LinkMode, MacAddress, NetifHandle, PhyDriver, PhyPins, StaticIpConfig,
};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::cli::SimArgs;

const SIM_MAC: MacAddress = MacAddress([0x02, 0x00, 0x5e, 0x10, 0x00, 0x01]);

#[derive(Debug)]
struct SimState {
    started: bool,
    link_up: bool,
    address: Ipv4Addr,
    hostname: String,
    mac: MacAddress,
    speed: u32,
    full_duplex: bool,
    counters: InterfaceCounters,
}

/// A PHY whose link and lease are driven by [`SimulatedPhy::plug_in`] and
/// [`SimulatedPhy::unplug`] instead of hardware.
#[derive(Debug)]
pub(crate) struct SimulatedPhy {
    state: Mutex<SimState>,
}

impl SimulatedPhy {
    pub(crate) fn new(speed: u32) -> Self {
        Self {
            state: Mutex::new(SimState {
                started: false,
                link_up: false,
                address: Ipv4Addr::UNSPECIFIED,
                hostname: String::new(),
                mac: SIM_MAC,
                speed,
                full_duplex: true,
                counters: InterfaceCounters::default(),
            }),
        }
    }

    pub(crate) fn plug_in(&self) {
        self.state.lock().link_up = true;
    }

    pub(crate) fn unplug(&self) {
        self.state.lock().link_up = false;
    }

    pub(crate) fn lease(&self, address: Ipv4Addr) {
        let mut state = self.state.lock();
        state.address = address;
        state.counters.tx_packets += 4;
        state.counters.rx_packets += 2;
    }
}

impl PhyDriver for SimulatedPhy {
    fn begin(&self, pins: &PhyPins) -> bool {
        debug!(?pins, "Simulated PHY powering up");
        self.state.lock().started = true;
        true
    }

    fn config(&self, ip: &StaticIpConfig, mac: Option<MacAddress>) -> bool {
        let mut state = self.state.lock();
        if !ip.address.is_unspecified() {
            state.address = ip.address;
        }
        if let Some(mac) = mac {
            state.mac = mac;
        }
        true
    }

    fn set_hostname(&self, hostname: &str) -> bool {
        self.state.lock().hostname = hostname.to_string();
        true
    }

    fn hostname(&self) -> String {
        self.state.lock().hostname.clone()
    }

    fn local_address(&self) -> Ipv4Addr {
        self.state.lock().address
    }

    fn hardware_address(&self) -> MacAddress {
        self.state.lock().mac
    }

    fn link_up(&self) -> bool {
        self.state.lock().link_up
    }

    fn link_speed(&self) -> u32 {
        self.state.lock().speed
    }

    fn full_duplex(&self) -> bool {
        self.state.lock().full_duplex
    }

    fn netif(&self) -> Option<NetifHandle> {
        self.state.lock().started.then_some(NetifHandle(0))
    }

    fn set_dns(&self, _dns1: Ipv4Addr, _dns2: Ipv4Addr) -> bool {
        true
    }

    fn configure_link(&self, mode: LinkMode) -> bool {
        let mut state = self.state.lock();
        match mode {
            LinkMode::Half10 | LinkMode::Full10 => state.speed = 10,
            LinkMode::Half100 | LinkMode::Full100 => state.speed = 100,
            LinkMode::AutoNegotiate => {}
        }
        state.full_duplex = !matches!(mode, LinkMode::Half10 | LinkMode::Half100);
        true
    }

    fn interface_counters(&self) -> Option<InterfaceCounters> {
        Some(self.state.lock().counters)
    }
}

/// Plays the cable and DHCP server: link comes up after a delay, a lease
/// follows, and with `--sim.flap` the cable is pulled once and reinserted.
pub(crate) fn spawn_cable(
    phy: Arc<SimulatedPhy>,
    events: EventSender,
    args: SimArgs,
    dhcp: bool,
    flap_after: Duration,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("sim-cable".to_string())
        .spawn(move || {
            let post = |event: NetEvent| {
                if let Err(error) = events.post(event) {
                    warn!(%error, "Simulator could not post event");
                }
            };

            post(NetEvent::PhyStarted);
            let connect = |post: &dyn Fn(NetEvent)| {
                thread::sleep(Duration::from_millis(args.link_delay_ms));
                info!("Cable plugged in");
                phy.plug_in();
                post(NetEvent::PhyLinkUp);

                if dhcp {
                    thread::sleep(Duration::from_millis(args.lease_delay_ms));
                    phy.lease(args.lease);
                    post(NetEvent::AddressAcquired {
                        address: args.lease,
                    });
                } else {
                    let address = phy.local_address();
                    post(NetEvent::AddressAcquired { address });
                }
            };
            connect(&post);

            if args.flap {
                thread::sleep(flap_after);
                info!("Cable pulled");
                phy.unplug();
                post(NetEvent::PhyLinkDown);
                connect(&post);
            }
        })
}
