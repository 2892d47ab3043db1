//! Fixtures shared by unit tests.

use std::time::Duration;

use serde_json::json;
use vnet_core::{NetworkId, ResourceKind, SubnetId, SwitchId};
use vnet_store::{to_fields, MemoryStore, Scope, StoreWriter};

use crate::{network, switch};

pub(crate) const INTERVAL: Duration = Duration::from_secs(1);

/// Make the mux report the switch as connected.
pub(crate) async fn publish_connection(store: &MemoryStore, switch_id: &SwitchId) {
    store
        .set(
            &Scope::Mux,
            ResourceKind::Connection,
            to_fields(&json!({ "name": switch_id.as_str() })).unwrap(),
        )
        .await
        .unwrap();
}

/// Define, connect and start a switch.
pub(crate) async fn running_switch(store: &MemoryStore, name: &str) -> SwitchId {
    let switch_id = switch::add_switch(store, name).await.unwrap();
    publish_connection(store, &switch_id).await;
    assert!(switch::start_switch(store, &switch_id, 0, INTERVAL).await.unwrap());
    switch_id
}

/// A running switch with one network holding one subnet.
pub(crate) async fn switch_with_subnet(
    store: &MemoryStore,
    cidr: &str,
) -> (SwitchId, NetworkId, SubnetId) {
    let switch_id = running_switch(store, "demo").await;
    let network_id = network::add_network(store, &switch_id, "vm", "eth1", Some(cidr))
        .await
        .unwrap()
        .unwrap();
    let network = network::get_network_by_id(store, &switch_id, &network_id)
        .await
        .unwrap()
        .unwrap();
    (switch_id, network_id, network.subnets[0].clone())
}
