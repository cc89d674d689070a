//! Translation of substrate events into state changes.
//!
//! Link-loss events pass a noise filter before they count as a disconnect:
//! they are dropped if no address was obtained since the last confirmed
//! disconnect, or if they arrive within the trust window after link-up.

use std::{net::Ipv4Addr, sync::atomic::Ordering};

use ethmgr_net_events::NetEvent;
use tracing::{debug, error, info, trace, warn};

use crate::{
    ConnectionState,
    callbacks::Notification,
    manager::Inner,
    store::{LockBudget, StateStore},
};

impl Inner {
    /// Count the event, then batch it or process it inline.
    pub(crate) fn on_event(&self, event: NetEvent) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        self.metrics.inc_events();
        trace!(
            class = %event.class(),
            event = event.name(),
            at_ms = self.clock.now_ms(),
            "Event received"
        );

        if self.batcher.is_enabled() {
            self.enqueue_event(event);
        } else {
            self.process_event(event);
        }
    }

    pub(crate) fn process_event(&self, event: NetEvent) {
        let acquired = matches!(event, NetEvent::AddressAcquired { .. });
        let result =
            self.with_store(LockBudget::Standard, "event", |s| self.apply_event(s, event));

        match result {
            Ok(true) if acquired => self.log_status(),
            Ok(_) => {}
            Err(error) => warn!(%error, "Dropped event"),
        }
    }

    /// Returns whether the event changed anything observable.
    fn apply_event(&self, s: &mut StateStore, event: NetEvent) -> bool {
        let now = self.clock.now_ms();
        match event {
            NetEvent::PhyStarted => {
                debug!(at_ms = now, "PHY started");
                false
            }
            NetEvent::PhyLinkUp => {
                self.on_link_established(s, now);
                true
            }
            NetEvent::AddressAcquired { address } => self.on_address_acquired(s, address, now),
            NetEvent::PhyLinkDown | NetEvent::PhyStopped => self.on_link_lost(s, &event, now),
            NetEvent::Unknown { class, id } => {
                warn!(%class, id, "Unhandled event");
                false
            }
        }
    }

    fn on_link_established(&self, s: &mut StateStore, now: u64) {
        debug!(at_ms = now, "Link established");
        s.connection_start_ms = Some(now);

        if !s.link_up {
            s.link_up = true;
            s.notify(Notification::LinkChanged(true));
        }
        if matches!(s.state, ConnectionState::PhyStarting | ConnectionState::LinkDown) {
            self.transition(s, ConnectionState::LinkUp);
        }
        if s.state == ConnectionState::LinkUp {
            self.transition(s, ConnectionState::ObtainingAddress);
        }

        self.update_link_status(s);
    }

    fn on_address_acquired(&self, s: &mut StateStore, address: Ipv4Addr, now: u64) -> bool {
        if s.state == ConnectionState::Connected {
            s.stats.address_renewals += 1;
            s.address_obtained = true;
            info!(%address, renewals = s.stats.address_renewals, "Address renewed");
            return false;
        }

        if s.state.path_to_connected().is_none() {
            warn!(%address, state = %s.state, "Ignoring address outside an active session");
            return false;
        }

        info!(%address, "Address acquired");
        s.address_obtained = true;
        s.stats.connect_time_ms = Some(now);
        if s.stats.disconnect_count > 0 {
            s.stats.reconnect_count += 1;
        }
        s.backoff.reset();

        self.advance_to_connected(s);
        self.signal.set();
        s.notify(Notification::Connected(address));
        true
    }

    fn on_link_lost(&self, s: &mut StateStore, event: &NetEvent, now: u64) -> bool {
        if !s.address_obtained {
            warn!(event = event.name(), "Ignoring link loss: no address was ever assigned");
            return false;
        }
        if let Some(elapsed_ms) = s.within_trust_window(now) {
            warn!(event = event.name(), elapsed_ms, "Ignoring link loss within trust window");
            return false;
        }

        error!(event = event.name(), "Link lost after stable window");
        s.address_obtained = false;
        self.signal.clear();
        self.transition(s, ConnectionState::LinkDown);

        s.stats.disconnect_count += 1;
        s.stats.link_down_events += 1;
        self.metrics.inc_disconnects();

        if s.link_up {
            s.link_up = false;
            s.notify(Notification::LinkChanged(false));
        }

        let duration_ms = s
            .stats
            .connect_time_ms
            .map_or(0, |at| now.saturating_sub(at));
        s.notify(Notification::Disconnected { duration_ms });

        if s.auto_reconnect {
            self.arm_reconnect(s);
        }
        true
    }
}
