use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use bondkeep_machine::testing::RecordingGateway;
use bondkeep_machine::{BondStateChange, CreateBondRequest, LifecycleEvent, MachineState};
use bondkeep_primitives::{Address, BondState, PairingVariant, Transport, UnbondReason};
use bondkeep_registry::DeviceRegistry;
use bondkeep_service::{
    BondHandle, BondServiceBuilder, LoopbackConfig, LoopbackGateway, ServiceError,
};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;

fn addr() -> Address {
    Address::new([0x00, 0x11, 0x22, 0x33, 0x44, 0x55])
}

fn spawn_loopback(config: LoopbackConfig) -> (BondHandle, Arc<DeviceRegistry>, JoinHandle<()>) {
    let registry = Arc::new(DeviceRegistry::new());
    let builder = BondServiceBuilder::new(Arc::clone(&registry));
    let gateway = Arc::new(LoopbackGateway::new(builder.callbacks(), config));
    let (service, handle) = builder.build(gateway);
    (handle, registry, tokio::spawn(service.into_task()))
}

async fn next_change(rx: &mut broadcast::Receiver<LifecycleEvent>) -> BondStateChange {
    loop {
        if let LifecycleEvent::BondStateChanged(change) = rx.recv().await.unwrap() {
            return change;
        }
    }
}

async fn bond(handle: &BondHandle, rx: &mut broadcast::Receiver<LifecycleEvent>) {
    let request = CreateBondRequest::new(addr(), Transport::Classic);
    assert!(handle.create_bond(request).await.unwrap());
    assert_eq!(next_change(rx).await.current, BondState::Bonding);
    assert_eq!(next_change(rx).await.current, BondState::Bonded);
}

#[tokio::test(start_paused = true)]
async fn test_loopback_pairing_end_to_end() {
    let (handle, registry, _task) = spawn_loopback(LoopbackConfig::default());
    let mut rx = handle.subscribe();

    let request = CreateBondRequest::new(addr(), Transport::Classic);
    assert!(handle.create_bond(request).await.unwrap());

    let change = next_change(&mut rx).await;
    assert_eq!((change.previous, change.current), (BondState::None, BondState::Bonding));

    let change = next_change(&mut rx).await;
    assert_eq!((change.previous, change.current), (BondState::Bonding, BondState::Bonded));
    assert!(registry.has_service_uuids(&addr()));

    let status = handle.status(addr()).await.unwrap();
    assert_eq!(status.bond_state, BondState::Bonded);
    assert!(!status.pending);
    assert_eq!(status.machine_state, MachineState::Stable);
}

#[tokio::test(start_paused = true)]
async fn test_bonded_withheld_while_discovery_pending() {
    let config = LoopbackConfig {
        discovery_delay_ms: None,
        ..Default::default()
    };
    let (handle, _registry, _task) = spawn_loopback(config);
    let mut rx = handle.subscribe();

    let request = CreateBondRequest::new(addr(), Transport::Classic);
    assert!(handle.create_bond(request).await.unwrap());
    next_change(&mut rx).await;

    tokio::time::sleep(Duration::from_millis(500)).await;
    let status = handle.status(addr()).await.unwrap();
    assert_eq!(status.bond_state, BondState::Bonded);
    assert!(status.withheld);
    assert_eq!(status.machine_state, MachineState::PendingCommand);

    let start = Instant::now();
    let change = next_change(&mut rx).await;
    assert_eq!(change.current, BondState::Bonded);
    // Bonded landed at 200ms, so the deadline is 3s later.
    assert!(start.elapsed() >= Duration::from_millis(2700));

    let status = handle.status(addr()).await.unwrap();
    assert!(!status.withheld);
    assert_eq!(status.machine_state, MachineState::Stable);
}

#[tokio::test(start_paused = true)]
async fn test_remove_bond_reports_removed() {
    let (handle, registry, _task) = spawn_loopback(LoopbackConfig::default());
    let mut rx = handle.subscribe();
    bond(&handle, &mut rx).await;

    assert!(handle.remove_bond(addr()).await.unwrap());
    let change = next_change(&mut rx).await;
    assert_eq!((change.previous, change.current), (BondState::Bonded, BondState::None));
    assert_eq!(change.reason, UnbondReason::Removed);
    assert!(registry.bonded_devices().is_empty());

    // Nothing left to remove.
    assert!(!handle.remove_bond(addr()).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_bond_while_bonding() {
    let config = LoopbackConfig {
        bonded_delay_ms: 10_000,
        ..Default::default()
    };
    let (handle, _registry, _task) = spawn_loopback(config);
    let mut rx = handle.subscribe();

    let request = CreateBondRequest::new(addr(), Transport::Le);
    assert!(handle.create_bond(request).await.unwrap());
    next_change(&mut rx).await;

    assert!(handle.cancel_bond(addr()).await.unwrap());
    let change = next_change(&mut rx).await;
    assert_eq!((change.previous, change.current), (BondState::Bonding, BondState::None));
    assert_eq!(change.reason, UnbondReason::AuthRejected);
    assert_eq!(
        handle.status(addr()).await.unwrap().machine_state,
        MachineState::Stable
    );
}

#[tokio::test(start_paused = true)]
async fn test_passkey_published_as_pairing_request() {
    let config = LoopbackConfig {
        passkey: Some(123_456),
        ..Default::default()
    };
    let (handle, _registry, _task) = spawn_loopback(config);
    let mut rx = handle.subscribe();

    let request = CreateBondRequest::new(addr(), Transport::Classic);
    assert!(handle.create_bond(request).await.unwrap());

    let mut request = None;
    while request.is_none() {
        if let LifecycleEvent::PairingRequested(r) = rx.recv().await.unwrap() {
            request = Some(r);
        }
    }
    assert_matches!(
        request,
        Some(r) if r.variant == PairingVariant::PasskeyConfirmation && r.pin == Some(123_456)
    );
}

#[tokio::test(start_paused = true)]
async fn test_busy_retries_follow_the_clock() {
    let registry = Arc::new(DeviceRegistry::new());
    let gateway = Arc::new(RecordingGateway::new());
    gateway.set_busy(true);
    let (service, handle) = BondServiceBuilder::new(registry).build(gateway.clone());
    let _task = tokio::spawn(service.into_task());

    let request = CreateBondRequest::new(addr(), Transport::Classic);
    assert!(handle.create_bond(request).await.unwrap());

    tokio::time::sleep(Duration::from_millis(1_250)).await;
    assert_eq!(gateway.create_calls(), 0);
    assert_eq!(gateway.busy_queries(), 3);

    gateway.set_busy(false);
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(gateway.create_calls(), 1);
    assert_eq!(
        handle.status(addr()).await.unwrap().bond_state,
        BondState::Bonding
    );
}

#[tokio::test(start_paused = true)]
async fn test_handle_after_stop() {
    let (handle, _registry, task) = spawn_loopback(LoopbackConfig::default());
    task.abort();
    let _ = task.await;

    assert_eq!(handle.status(addr()).await, Err(ServiceError::ServiceStopped));
}

#[tokio::test]
async fn test_service_exits_when_handles_drop() {
    let (handle, _registry, task) = spawn_loopback(LoopbackConfig::default());
    drop(handle);
    task.await.unwrap();
}
