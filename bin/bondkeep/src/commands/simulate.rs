//! Simulate command - one pairing against the loopback lower layer

use std::sync::Arc;
use std::time::Duration;

use bondkeep_machine::{BondStateChange, CreateBondRequest, LifecycleEvent};
use bondkeep_primitives::{Address, BondState};
use bondkeep_registry::{DeviceRegistry, FileDeviceStore};
use bondkeep_service::{BondServiceBuilder, LoopbackGateway};
use eyre::{Result, bail};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::cli::SimulateArgs;
use crate::config::BondkeepConfig;

pub(crate) async fn run(config: BondkeepConfig, args: SimulateArgs) -> Result<()> {
    let registry = Arc::new(DeviceRegistry::new());
    let store = match &args.store {
        Some(path) => {
            let store = FileDeviceStore::open_with_create_dir(path)?;
            let loaded = registry.load_from_store(&store)?;
            info!(loaded, path = %path.display(), "device store loaded");
            Some(store)
        }
        None => None,
    };

    let mut loopback = config.simulate.clone();
    if args.no_discovery {
        loopback.discovery_delay_ms = None;
    }
    if args.passkey.is_some() {
        loopback.passkey = args.passkey;
    }
    // Generous upper bound on how long any one step can take.
    let step_timeout = loopback.bonded_delay()
        + loopback.discovery_delay().unwrap_or_default()
        + loopback.unbond_delay()
        + config.machine.pending_bonded_timeout()
        + Duration::from_secs(1);

    let builder = BondServiceBuilder::new(Arc::clone(&registry))
        .with_config(config.service.clone())
        .with_machine_config(config.machine.clone());
    let gateway = Arc::new(LoopbackGateway::new(builder.callbacks(), loopback));
    let (service, handle) = builder.build(gateway);
    let task = tokio::spawn(service.into_task());

    let mut events = handle.subscribe();
    let address = args.address;

    let request = CreateBondRequest::new(address, args.transport.into());
    if !handle.create_bond(request).await? {
        bail!("create bond for {address} was refused");
    }
    let change = wait_for_terminal(&mut events, address, step_timeout).await?;

    if args.remove && change.current.is_bonded() {
        if !handle.remove_bond(address).await? {
            bail!("remove bond for {address} was refused");
        }
        wait_for_terminal(&mut events, address, step_timeout).await?;
    }

    let status = handle.status(address).await?;
    println!(
        "{address}: {} (machine {}, pending {})",
        status.bond_state, status.machine_state, status.pending
    );

    if let Some(store) = &store {
        let saved = registry.save_to_store(store)?;
        info!(saved, path = %store.path().display(), "device store saved");
    }

    drop(handle);
    task.await?;
    Ok(())
}

/// Print events for `address` until it settles in Bonded or None.
async fn wait_for_terminal(
    events: &mut broadcast::Receiver<LifecycleEvent>,
    address: Address,
    timeout: Duration,
) -> Result<BondStateChange> {
    tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(LifecycleEvent::BondStateChanged(change)) if change.address == address => {
                    println!("{change}");
                    if change.current != BondState::Bonding {
                        return Ok(change);
                    }
                }
                Ok(LifecycleEvent::PairingRequested(request)) if request.address == address => {
                    println!("{address}: pairing request ({})", request.variant);
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "lifecycle subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => bail!("bond service stopped"),
            }
        }
    })
    .await
    .map_err(|_| eyre::eyre!("timed out waiting for {address} to settle"))?
}
