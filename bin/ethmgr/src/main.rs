//! Interface manager demo binary.
//!
//! Drives the manager through a full bring-up against a simulated PHY and
//! prints the resulting diagnostics.

mod cli;
mod sim;

use std::{
    sync::{Arc, mpsc},
    time::Duration,
};

use clap::Parser;
use ethmgr_ethernet::{AddressMode, EthernetManager};
use ethmgr_net_events::{Dispatcher, EventBus};
use ethmgr_observability::init_logging;
use eyre::{OptionExt, Result, WrapErr, eyre};
use tracing::info;

use crate::{cli::Cli, sim::SimulatedPhy};

/// Slack past the trust window before the simulated cable is pulled.
const FLAP_MARGIN: Duration = Duration::from_millis(500);

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.logs)?;

    let config = cli.eth.to_config()?;
    let dhcp = matches!(config.address_mode, AddressMode::Dhcp);

    let phy = Arc::new(SimulatedPhy::new(cli.sim.speed));
    let bus = Arc::new(EventBus::new());
    let mut dispatcher = Dispatcher::spawn(bus.clone()).wrap_err("spawning event dispatcher")?;

    let manager = EthernetManager::new(phy.clone(), bus);

    let (disconnected_tx, disconnected_rx) = mpsc::channel();
    manager.set_connected_callback(Some(Arc::new(|address| {
        info!(%address, "Connected");
    })))?;
    manager.set_disconnected_callback(Some(Arc::new(move |duration_ms| {
        info!(duration_ms, "Disconnected");
        let _ = disconnected_tx.send(duration_ms);
    })))?;
    manager.set_state_changed_callback(Some(Arc::new(|old, new| {
        info!(%old, %new, "State changed");
    })))?;
    manager.set_link_changed_callback(Some(Arc::new(|up| {
        info!(up, "Link changed");
    })))?;

    manager.initialize_with_config_async(&config)?;

    let sender = dispatcher.sender().ok_or_eyre("event dispatcher is shut down")?;
    let cable = sim::spawn_cable(
        phy,
        sender,
        cli.sim.clone(),
        dhcp,
        config.trust_window + FLAP_MARGIN,
    )
    .wrap_err("spawning cable simulator")?;

    manager.wait_for_connection(config.connect_timeout)?;
    manager.log_status();

    if cli.sim.flap {
        let timeout = config.trust_window + FLAP_MARGIN + config.connect_timeout;
        disconnected_rx
            .recv_timeout(timeout)
            .wrap_err("cable pull was not reported")?;
        manager.wait_for_connection(config.connect_timeout)?;
        manager.log_status();
    }

    cable
        .join()
        .map_err(|_| eyre!("cable simulator panicked"))?;

    let mut report = String::new();
    manager.dump_diagnostics(&mut report)?;
    println!("{report}");

    manager.disconnect()?;
    manager.cleanup()?;
    dispatcher.shutdown();
    Ok(())
}
