//! Scriptable in-memory driver for tests.

use std::{
    net::Ipv4Addr,
    sync::atomic::{AtomicUsize, Ordering},
};

use parking_lot::Mutex;

use crate::{
    InterfaceCounters, LinkMode, MacAddress, NetifHandle, PhyDriver, PhyPins, StaticIpConfig,
};

#[derive(Debug)]
struct MockState {
    started: bool,
    link_up: bool,
    local_address: Ipv4Addr,
    hostname: String,
    mac: MacAddress,
    link_speed: u32,
    full_duplex: bool,
    begin_result: bool,
    config_result: bool,
    set_dns_result: bool,
    provides_netif: bool,
    supports_reset: bool,
    last_pins: Option<PhyPins>,
    last_config: Option<(StaticIpConfig, Option<MacAddress>)>,
    dns: Option<(Ipv4Addr, Ipv4Addr)>,
    link_mode: Option<LinkMode>,
    counters: Option<InterfaceCounters>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            started: false,
            link_up: false,
            local_address: Ipv4Addr::UNSPECIFIED,
            hostname: String::new(),
            mac: MacAddress::new([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]),
            link_speed: 100,
            full_duplex: true,
            begin_result: true,
            config_result: true,
            set_dns_result: true,
            provides_netif: true,
            supports_reset: false,
            last_pins: None,
            last_config: None,
            dns: None,
            link_mode: None,
            counters: None,
        }
    }
}

/// A [`PhyDriver`] whose hardware responses are set by the test.
///
/// `begin` succeeds and a network-interface handle exists after start unless
/// configured otherwise. Link is down until [`MockPhy::set_link_up`].
#[derive(Debug, Default)]
pub struct MockPhy {
    state: Mutex<MockState>,
    begin_calls: AtomicUsize,
    config_calls: AtomicUsize,
    reset_calls: AtomicUsize,
}

impl MockPhy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_link_up(&self, up: bool) {
        self.state.lock().link_up = up;
    }

    pub fn set_local_address(&self, address: Ipv4Addr) {
        self.state.lock().local_address = address;
    }

    pub fn set_link_speed(&self, mbps: u32) {
        self.state.lock().link_speed = mbps;
    }

    pub fn set_full_duplex(&self, full: bool) {
        self.state.lock().full_duplex = full;
    }

    pub fn set_hardware_address(&self, mac: MacAddress) {
        self.state.lock().mac = mac;
    }

    pub fn set_begin_result(&self, ok: bool) {
        self.state.lock().begin_result = ok;
    }

    pub fn set_config_result(&self, ok: bool) {
        self.state.lock().config_result = ok;
    }

    pub fn set_dns_result(&self, ok: bool) {
        self.state.lock().set_dns_result = ok;
    }

    pub fn set_provides_netif(&self, provides: bool) {
        self.state.lock().provides_netif = provides;
    }

    pub fn set_supports_reset(&self, supported: bool) {
        self.state.lock().supports_reset = supported;
    }

    pub fn set_counters(&self, counters: Option<InterfaceCounters>) {
        self.state.lock().counters = counters;
    }

    pub fn begin_calls(&self) -> usize {
        self.begin_calls.load(Ordering::SeqCst)
    }

    pub fn config_calls(&self) -> usize {
        self.config_calls.load(Ordering::SeqCst)
    }

    pub fn reset_calls(&self) -> usize {
        self.reset_calls.load(Ordering::SeqCst)
    }

    pub fn is_started(&self) -> bool {
        self.state.lock().started
    }

    pub fn last_pins(&self) -> Option<PhyPins> {
        self.state.lock().last_pins
    }

    pub fn last_config(&self) -> Option<(StaticIpConfig, Option<MacAddress>)> {
        self.state.lock().last_config
    }

    pub fn dns(&self) -> Option<(Ipv4Addr, Ipv4Addr)> {
        self.state.lock().dns
    }

    pub fn link_mode(&self) -> Option<LinkMode> {
        self.state.lock().link_mode
    }
}

impl PhyDriver for MockPhy {
    fn begin(&self, pins: &PhyPins) -> bool {
        self.begin_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock();
        state.last_pins = Some(*pins);
        state.started = state.begin_result;
        state.begin_result
    }

    fn config(&self, ip: &StaticIpConfig, mac: Option<MacAddress>) -> bool {
        self.config_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock();
        state.last_config = Some((*ip, mac));
        if state.config_result {
            if !ip.address.is_unspecified() {
                state.local_address = ip.address;
            }
            if let Some(mac) = mac {
                state.mac = mac;
            }
        }
        state.config_result
    }

    fn set_hostname(&self, hostname: &str) -> bool {
        self.state.lock().hostname = hostname.to_string();
        true
    }

    fn hostname(&self) -> String {
        self.state.lock().hostname.clone()
    }

    fn local_address(&self) -> Ipv4Addr {
        self.state.lock().local_address
    }

    fn hardware_address(&self) -> MacAddress {
        self.state.lock().mac
    }

    fn link_up(&self) -> bool {
        self.state.lock().link_up
    }

    fn link_speed(&self) -> u32 {
        self.state.lock().link_speed
    }

    fn full_duplex(&self) -> bool {
        self.state.lock().full_duplex
    }

    fn netif(&self) -> Option<NetifHandle> {
        let state = self.state.lock();
        (state.started && state.provides_netif).then_some(NetifHandle(1))
    }

    fn set_dns(&self, dns1: Ipv4Addr, dns2: Ipv4Addr) -> bool {
        let mut state = self.state.lock();
        if state.set_dns_result {
            state.dns = Some((dns1, dns2));
        }
        state.set_dns_result
    }

    fn configure_link(&self, mode: LinkMode) -> bool {
        self.state.lock().link_mode = Some(mode);
        true
    }

    fn interface_counters(&self) -> Option<InterfaceCounters> {
        self.state.lock().counters
    }

    fn reset(&self) -> bool {
        self.reset_calls.fetch_add(1, Ordering::SeqCst);
        self.state.lock().supports_reset
    }
}
