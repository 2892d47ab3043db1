//! End-to-end switch lifecycle against the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use vnet_control::lifecycle::is_valid_transition;
use vnet_control::{
    CancellationToken, ControlError, GrePortSpec, StartOutcome, SwitchId, SwitchState,
    VswitchControl, VswitchService,
};
use vnet_core::ResourceKind;
use vnet_store::{to_fields, MemoryStore, Operation, Scope, StoreWriter};

fn control() -> VswitchService<MemoryStore> {
    VswitchService::with_defaults(Arc::new(MemoryStore::new()))
}

/// Publish the mux connection for `switch_id` after `delay`.
fn connect_after(store: Arc<MemoryStore>, switch_id: SwitchId, delay: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        store
            .set(
                &Scope::Mux,
                ResourceKind::Connection,
                to_fields(&json!({ "name": switch_id.as_str() })).unwrap(),
            )
            .await
            .unwrap();
    });
}

#[tokio::test(start_paused = true)]
async fn switch_lifecycle_with_cascading_delete() {
    let store = Arc::new(MemoryStore::new());
    let control = VswitchService::with_defaults(Arc::clone(&store));
    let mut states = vec![SwitchState::Undefined];

    // Define and start; the mux reports the switch after three seconds.
    let sw = control.add_switch("S").await.unwrap();
    states.push(control.switch_state(&sw).await.unwrap());

    connect_after(Arc::clone(&store), sw.clone(), Duration::from_secs(3));
    assert!(control.start_switch(&sw, Some(10)).await.unwrap());
    states.push(control.switch_state(&sw).await.unwrap());

    // Network with one subnet, a GRE port on it, a domain holding the port.
    let net = control
        .add_network(&sw, "N", "eth1", Some("192.168.30.0/24"))
        .await
        .unwrap()
        .unwrap();
    let network = control.get_network_by_id(&sw, &net).await.unwrap().unwrap();
    assert_eq!(network.subnets.len(), 1);
    let subnet = network.subnets[0].clone();

    let port = control
        .add_port_gre(&sw, &subnet, GrePortSpec::new("P").with_local_ip("192.168.30.10"))
        .await
        .unwrap()
        .unwrap();
    let domain = control.add_domain(&sw, "D").await.unwrap().unwrap();
    assert!(control.add_port_gre_domain(&sw, &domain, &port).await.unwrap());
    assert!(control.is_port_gre_any_domain(&sw, &port).await.unwrap());

    // The bound port is protected until the switch goes.
    assert!(!control.delete_port_gre(&sw, &port).await.unwrap());

    assert!(control.delete_switch(&sw).await.unwrap());
    states.push(control.switch_state(&sw).await.unwrap());

    let scope = Scope::Switch(sw.clone());
    assert_eq!(store.count(&scope, ResourceKind::GrePort), 0);
    assert_eq!(store.count(&scope, ResourceKind::Domain), 0);
    assert_eq!(store.count(&scope, ResourceKind::DomainPort), 0);
    assert!(!control.is_defined(&sw).await.unwrap());
    assert!(!control.is_running(&sw).await.unwrap());

    // Networks and subnets are not part of the cascade.
    assert_eq!(store.count(&scope, ResourceKind::Network), 1);
    assert_eq!(store.count(&scope, ResourceKind::Subnet), 1);

    assert_eq!(
        states,
        [
            SwitchState::Undefined,
            SwitchState::Defined,
            SwitchState::Running,
            SwitchState::Undefined
        ]
    );
    assert!(is_valid_transition(SwitchState::Running, SwitchState::Undefined));
}

#[tokio::test(start_paused = true)]
async fn start_timeout_is_visible_and_not_rolled_back() {
    let store = Arc::new(MemoryStore::new());
    let control = VswitchService::with_defaults(Arc::clone(&store));
    let sw = control.add_switch("S").await.unwrap();

    let started = tokio::time::Instant::now();
    let outcome = control
        .start_switch_with(&sw, Some(10), &CancellationToken::new())
        .await
        .unwrap();

    assert!(matches!(outcome, StartOutcome::TimedOut { .. }));
    assert_eq!(store.calls(Operation::Walk, ResourceKind::Connection), 11);
    assert_eq!(started.elapsed(), Duration::from_secs(11));
    assert_eq!(control.switch_state(&sw).await.unwrap(), SwitchState::Starting);
    assert_eq!(
        outcome.dangling_run(),
        control.get_run_id(&sw).await.unwrap().as_ref()
    );

    // A second start sees the dangling run.
    assert!(!control.start_switch(&sw, Some(10)).await.unwrap());
    assert_eq!(store.count(&Scope::Agent, ResourceKind::SwitchRun), 1);

    // Stopping clears it.
    assert!(control.stop_switch(&sw).await.unwrap());
    assert_eq!(control.switch_state(&sw).await.unwrap(), SwitchState::Defined);
}

#[tokio::test(start_paused = true)]
async fn cancelled_start() {
    let store = Arc::new(MemoryStore::new());
    let control = VswitchService::with_defaults(Arc::clone(&store));
    let sw = control.add_switch("S").await.unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        trigger.cancel();
    });

    let outcome = control.start_switch_with(&sw, None, &cancel).await.unwrap();
    assert!(matches!(outcome, StartOutcome::Cancelled { .. }));
    assert!(store.calls(Operation::Walk, ResourceKind::Connection) < 11);
}

#[tokio::test]
async fn delete_switch_leaves_no_bound_ports() {
    let control = control();
    let sw = control.add_switch("S").await.unwrap();
    control
        .store()
        .set(
            &Scope::Mux,
            ResourceKind::Connection,
            to_fields(&json!({ "name": sw.as_str() })).unwrap(),
        )
        .await
        .unwrap();
    assert!(control.start_switch(&sw, Some(0)).await.unwrap());

    let net = control
        .add_network(&sw, "N", "eth1", Some("10.0.0.0/24"))
        .await
        .unwrap()
        .unwrap();
    let subnet = control.get_network_by_id(&sw, &net).await.unwrap().unwrap().subnets[0].clone();
    let vlan = control.add_port_vlan(&sw, &net, "vlan666", 666).await.unwrap().unwrap();
    let unbound_vlan = control.add_port_vlan(&sw, &net, "vlan667", 667).await.unwrap().unwrap();

    for domain_name in ["user1", "user2"] {
        let domain = control.add_domain(&sw, domain_name).await.unwrap().unwrap();
        let gre = control
            .add_port_gre(&sw, &subnet, GrePortSpec::new(format!("gre-{domain_name}")))
            .await
            .unwrap()
            .unwrap();
        assert!(control.add_port_gre_domain(&sw, &domain, &gre).await.unwrap());
        if domain_name == "user1" {
            assert!(control.add_port_vlan_domain(&sw, &domain, &vlan).await.unwrap());
        }
    }

    assert!(control.delete_switch(&sw).await.unwrap());

    let store = control.store();
    let scope = Scope::Switch(sw.clone());
    assert_eq!(store.count(&scope, ResourceKind::Domain), 0);
    assert_eq!(store.count(&scope, ResourceKind::DomainPort), 0);
    assert_eq!(store.count(&scope, ResourceKind::GrePort), 0);
    // Only the unbound VLAN port survives.
    assert_eq!(store.count(&scope, ResourceKind::VlanPort), 1);
    let remaining = vnet_store::StoreReader::walk(store, &scope, ResourceKind::VlanPort)
        .await
        .unwrap();
    assert_eq!(remaining[0].id, unbound_vlan.as_str());

    assert!(!control.delete_switch(&sw).await.unwrap());
}

#[tokio::test]
async fn shared_port_aborts_switch_delete() {
    let control = control();
    let sw = control.add_switch("S").await.unwrap();
    control
        .store()
        .set(
            &Scope::Mux,
            ResourceKind::Connection,
            to_fields(&json!({ "name": sw.as_str() })).unwrap(),
        )
        .await
        .unwrap();
    assert!(control.start_switch(&sw, Some(0)).await.unwrap());

    let net = control
        .add_network(&sw, "N", "eth1", Some("10.0.0.0/24"))
        .await
        .unwrap()
        .unwrap();
    let subnet = control.get_network_by_id(&sw, &net).await.unwrap().unwrap().subnets[0].clone();
    let gre = control
        .add_port_gre(&sw, &subnet, GrePortSpec::new("shared"))
        .await
        .unwrap()
        .unwrap();
    for name in ["user1", "user2"] {
        let domain = control.add_domain(&sw, name).await.unwrap().unwrap();
        assert!(control.add_port_gre_domain(&sw, &domain, &gre).await.unwrap());
    }

    let err = control.delete_switch(&sw).await.unwrap_err();
    assert!(matches!(err, ControlError::CascadeAborted { .. }), "{err}");
    assert!(err.to_string().contains(&format!("switch {sw}")));

    // The run was stopped and the definition kept; a retry finishes the job
    // once the first binding is gone.
    assert!(control.is_defined(&sw).await.unwrap());
    assert!(!control.is_running(&sw).await.unwrap());
    assert!(control.delete_switch(&sw).await.unwrap());
    assert_eq!(
        control.store().count(&Scope::Switch(sw.clone()), ResourceKind::GrePort),
        0
    );
}

#[tokio::test]
async fn orphaned_vlan_binding_does_not_block_switch_delete() {
    let control = control();
    let sw = control.add_switch("S").await.unwrap();
    control
        .store()
        .set(
            &Scope::Mux,
            ResourceKind::Connection,
            to_fields(&json!({ "name": sw.as_str() })).unwrap(),
        )
        .await
        .unwrap();
    assert!(control.start_switch(&sw, Some(0)).await.unwrap());

    let net = control
        .add_network(&sw, "N", "eth1", None)
        .await
        .unwrap()
        .unwrap();
    let vlan = control.add_port_vlan(&sw, &net, "vlan666", 666).await.unwrap().unwrap();
    let domain = control.add_domain(&sw, "user1").await.unwrap().unwrap();
    assert!(control.add_port_vlan_domain(&sw, &domain, &vlan).await.unwrap());
    assert!(control.delete_port_vlan(&sw, &vlan).await.unwrap());

    assert!(control.delete_switch(&sw).await.unwrap());

    let scope = Scope::Switch(sw.clone());
    assert_eq!(control.store().count(&scope, ResourceKind::Domain), 0);
    assert_eq!(control.store().count(&scope, ResourceKind::DomainPort), 0);
    assert!(!control.is_defined(&sw).await.unwrap());
}
