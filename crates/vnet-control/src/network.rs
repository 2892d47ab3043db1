//! Associate networks and their subnets on a running switch.
//!
//! The store keeps each network's `subnets` list in step with subnet rows,
//! but it does not stop a network from being deleted while subnets still
//! point at it. Deleting a network therefore removes its subnets first.

use vnet_core::{NetworkId, ResourceKind, SubnetId, SwitchId};
use vnet_store::{id_selector, to_fields, ResourceStore, StoreReader, StoreWriter};

use crate::error::Result;
use crate::model::{Network, Subnet};
use crate::scan;
use crate::switch::{is_running, switch_scope};
use crate::types::{CreateNetworkRequest, SubnetSpec, ASSOCIATE_NETWORK};

/// Create an associate network, optionally with one subnet.
///
/// When `cidr` is given and the subnet cannot be created, the network is
/// deleted again and `None` is returned.
///
/// # Errors
///
/// Returns an error if creating the network or rolling it back fails.
pub async fn add_network<S>(
    store: &S,
    switch_id: &SwitchId,
    name: &str,
    host_interface: &str,
    cidr: Option<&str>,
) -> Result<Option<NetworkId>>
where
    S: ResourceStore + ?Sized,
{
    if !is_running(store, switch_id).await? {
        return Ok(None);
    }

    let request = CreateNetworkRequest {
        network_type: ASSOCIATE_NETWORK,
        name,
        host_interface,
    };
    let created = store
        .set(&switch_scope(switch_id), ResourceKind::Network, to_fields(&request)?)
        .await?;
    let network_id = NetworkId::new(created.id)?;

    if let Some(cidr) = cidr {
        let subnet = add_subnet(store, switch_id, &network_id, cidr).await;
        if !matches!(subnet, Ok(Some(_))) {
            if let Err(e) = &subnet {
                tracing::warn!(
                    switch_id = %switch_id,
                    network_id = %network_id,
                    cidr,
                    error = %e,
                    "Subnet creation failed, rolling back network"
                );
            }
            store
                .delete(
                    &switch_scope(switch_id),
                    ResourceKind::Network,
                    id_selector(network_id.as_str()),
                )
                .await?;
            return Ok(None);
        }
    }

    tracing::info!(switch_id = %switch_id, network_id = %network_id, name, "Created network");
    Ok(Some(network_id))
}

/// List the networks of a running switch.
///
/// # Errors
///
/// Returns an error if a store call fails.
pub async fn get_networks<S>(store: &S, switch_id: &SwitchId) -> Result<Option<Vec<Network>>>
where
    S: StoreReader + ?Sized,
{
    if !is_running(store, switch_id).await? {
        return Ok(None);
    }
    scan::list(store, &switch_scope(switch_id)).await.map(Some)
}

/// Find a network by id.
///
/// # Errors
///
/// Returns an error if a store call fails.
pub async fn get_network_by_id<S>(
    store: &S,
    switch_id: &SwitchId,
    network_id: &NetworkId,
) -> Result<Option<Network>>
where
    S: StoreReader + ?Sized,
{
    if !is_running(store, switch_id).await? {
        return Ok(None);
    }
    scan::by_id(store, &switch_scope(switch_id), network_id.as_str()).await
}

/// Find the first network with this name.
///
/// # Errors
///
/// Returns an error if a store call fails.
pub async fn get_network_by_name<S>(
    store: &S,
    switch_id: &SwitchId,
    name: &str,
) -> Result<Option<Network>>
where
    S: StoreReader + ?Sized,
{
    if !is_running(store, switch_id).await? {
        return Ok(None);
    }
    scan::by_name(store, &switch_scope(switch_id), name).await
}

/// Delete a network after deleting each of its subnets.
///
/// Returns `false` if the switch is not running, the network does not exist,
/// or one of its subnets could not be found. Subnets deleted before the
/// refusal stay deleted.
///
/// # Errors
///
/// Returns an error if a store call fails.
pub async fn delete_network<S>(
    store: &S,
    switch_id: &SwitchId,
    network_id: &NetworkId,
) -> Result<bool>
where
    S: ResourceStore + ?Sized,
{
    let Some(network) = get_network_by_id(store, switch_id, network_id).await? else {
        tracing::debug!(switch_id = %switch_id, network_id = %network_id, "Network not found");
        return Ok(false);
    };

    for subnet_id in &network.subnets {
        if !delete_subnet(store, switch_id, subnet_id).await? {
            tracing::debug!(
                switch_id = %switch_id,
                network_id = %network_id,
                subnet_id = %subnet_id,
                "Subnet refused, network kept"
            );
            return Ok(false);
        }
    }

    store
        .delete(
            &switch_scope(switch_id),
            ResourceKind::Network,
            id_selector(network_id.as_str()),
        )
        .await?;

    tracing::info!(
        switch_id = %switch_id,
        network_id = %network_id,
        subnets = network.subnets.len(),
        "Deleted network"
    );
    Ok(true)
}

/// Add a subnet with only a CIDR.
///
/// # Errors
///
/// Returns an error if the store refuses the subnet.
pub async fn add_subnet<S>(
    store: &S,
    switch_id: &SwitchId,
    network_id: &NetworkId,
    cidr: &str,
) -> Result<Option<SubnetId>>
where
    S: StoreReader + StoreWriter + ?Sized,
{
    add_subnet_with(store, switch_id, network_id, SubnetSpec::new(cidr)).await
}

/// Add a subnet to a network.
///
/// Returns `None` if the switch is not running or the network does not exist.
///
/// # Errors
///
/// Returns an error if the store refuses the subnet.
pub async fn add_subnet_with<S>(
    store: &S,
    switch_id: &SwitchId,
    network_id: &NetworkId,
    spec: SubnetSpec,
) -> Result<Option<SubnetId>>
where
    S: StoreReader + StoreWriter + ?Sized,
{
    if get_network_by_id(store, switch_id, network_id).await?.is_none() {
        return Ok(None);
    }

    let cidr = spec.cidr.clone();
    let created = store
        .set(
            &switch_scope(switch_id),
            ResourceKind::Subnet,
            to_fields(&spec.into_request(network_id))?,
        )
        .await?;
    let subnet_id = SubnetId::new(created.id)?;

    tracing::info!(
        switch_id = %switch_id,
        network_id = %network_id,
        subnet_id = %subnet_id,
        cidr = %cidr,
        "Created subnet"
    );
    Ok(Some(subnet_id))
}

/// List the subnets of a running switch.
///
/// # Errors
///
/// Returns an error if a store call fails.
pub async fn get_subnets<S>(store: &S, switch_id: &SwitchId) -> Result<Option<Vec<Subnet>>>
where
    S: StoreReader + ?Sized,
{
    if !is_running(store, switch_id).await? {
        return Ok(None);
    }
    scan::list(store, &switch_scope(switch_id)).await.map(Some)
}

/// Find a subnet by id.
///
/// # Errors
///
/// Returns an error if a store call fails.
pub async fn get_subnet_by_id<S>(
    store: &S,
    switch_id: &SwitchId,
    subnet_id: &SubnetId,
) -> Result<Option<Subnet>>
where
    S: StoreReader + ?Sized,
{
    if !is_running(store, switch_id).await? {
        return Ok(None);
    }
    scan::by_id(store, &switch_scope(switch_id), subnet_id.as_str()).await
}

/// Delete a subnet. Returns `false` if it does not exist.
///
/// # Errors
///
/// Returns an error if a store call fails.
pub async fn delete_subnet<S>(
    store: &S,
    switch_id: &SwitchId,
    subnet_id: &SubnetId,
) -> Result<bool>
where
    S: ResourceStore + ?Sized,
{
    if get_subnet_by_id(store, switch_id, subnet_id).await?.is_none() {
        tracing::debug!(switch_id = %switch_id, subnet_id = %subnet_id, "Subnet not found");
        return Ok(false);
    }

    store
        .delete(
            &switch_scope(switch_id),
            ResourceKind::Subnet,
            id_selector(subnet_id.as_str()),
        )
        .await?;

    tracing::info!(switch_id = %switch_id, subnet_id = %subnet_id, "Deleted subnet");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ControlError;
    use crate::switch::add_switch;
    use crate::testing::running_switch;
    use vnet_store::{MemoryStore, Operation};

    #[tokio::test]
    async fn network_with_subnet() {
        let store = MemoryStore::new();
        let sw = running_switch(&store, "demo").await;

        let network_id = add_network(&store, &sw, "n", "eth0", Some("10.0.0.0/24"))
            .await
            .unwrap()
            .unwrap();

        let networks = get_networks(&store, &sw).await.unwrap().unwrap();
        assert_eq!(networks.len(), 1);
        assert_eq!(networks[0].name, "n");
        assert_eq!(networks[0].network_type, ASSOCIATE_NETWORK);
        assert_eq!(networks[0].host_interface.as_deref(), Some("eth0"));
        assert_eq!(networks[0].subnets.len(), 1);

        let subnet = get_subnet_by_id(&store, &sw, &networks[0].subnets[0])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(subnet.cidr, "10.0.0.0/24");
        assert_eq!(subnet.network_id, Some(network_id));
    }

    #[tokio::test]
    async fn failed_subnet_rolls_back_network() {
        let store = MemoryStore::new();
        let sw = running_switch(&store, "demo").await;
        store.reject(Operation::Set, ResourceKind::Subnet, "invalid cidr");

        let result = add_network(&store, &sw, "n", "eth0", Some("10.0.0.0/24"))
            .await
            .unwrap();

        assert!(result.is_none());
        assert!(get_network_by_name(&store, &sw, "n").await.unwrap().is_none());
        assert_eq!(store.count(&switch_scope(&sw), ResourceKind::Network), 0);
    }

    #[tokio::test]
    async fn network_without_subnet() {
        let store = MemoryStore::new();
        let sw = running_switch(&store, "demo").await;

        let id = add_network(&store, &sw, "pcpe", "eth1", None)
            .await
            .unwrap()
            .unwrap();
        let network = get_network_by_id(&store, &sw, &id).await.unwrap().unwrap();
        assert!(network.subnets.is_empty());
        assert_eq!(store.calls(Operation::Set, ResourceKind::Subnet), 0);
    }

    #[tokio::test]
    async fn stopped_switch_has_no_networks() {
        let store = MemoryStore::new();
        let sw = add_switch(&store, "demo").await.unwrap();

        assert!(get_networks(&store, &sw).await.unwrap().is_none());
        assert!(get_subnets(&store, &sw).await.unwrap().is_none());
        assert!(add_network(&store, &sw, "n", "eth0", None).await.unwrap().is_none());
        assert_eq!(store.calls(Operation::Set, ResourceKind::Network), 0);
    }

    #[tokio::test]
    async fn first_name_match_wins() {
        let store = MemoryStore::new();
        let sw = running_switch(&store, "demo").await;
        let first = add_network(&store, &sw, "pcpe", "eth1", None).await.unwrap().unwrap();
        add_network(&store, &sw, "pcpe", "eth2", None).await.unwrap().unwrap();

        let found = get_network_by_name(&store, &sw, "pcpe").await.unwrap().unwrap();
        assert_eq!(found.id, first);
    }

    #[tokio::test]
    async fn subnet_options_reach_the_store() {
        let store = MemoryStore::new();
        let sw = running_switch(&store, "demo").await;
        let net = add_network(&store, &sw, "vm", "eth1", None).await.unwrap().unwrap();

        let spec = SubnetSpec::new("192.168.40.0/24")
            .with_name("vm-net")
            .with_gateway("192.168.40.1")
            .with_pool("192.168.40.2", "192.168.40.254");
        let id = add_subnet_with(&store, &sw, &net, spec).await.unwrap().unwrap();

        let subnet = get_subnet_by_id(&store, &sw, &id).await.unwrap().unwrap();
        assert_eq!(subnet.name.as_deref(), Some("vm-net"));
        assert_eq!(subnet.gateway_ip.as_deref(), Some("192.168.40.1"));
        assert_eq!(subnet.allocation_pools[0].end, "192.168.40.254");
    }

    #[tokio::test]
    async fn subnet_needs_network() {
        let store = MemoryStore::new();
        let sw = running_switch(&store, "demo").await;
        let missing = NetworkId::new("wrong").unwrap();

        assert!(add_subnet(&store, &sw, &missing, "10.0.0.0/24")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn delete_network_removes_subnets_first() {
        let store = MemoryStore::new();
        let sw = running_switch(&store, "demo").await;
        let net = add_network(&store, &sw, "vm", "eth1", Some("10.0.0.0/24"))
            .await
            .unwrap()
            .unwrap();
        add_subnet(&store, &sw, &net, "10.0.1.0/24").await.unwrap().unwrap();

        assert!(delete_network(&store, &sw, &net).await.unwrap());
        assert_eq!(store.count(&switch_scope(&sw), ResourceKind::Subnet), 0);
        assert_eq!(store.count(&switch_scope(&sw), ResourceKind::Network), 0);
        assert!(!delete_network(&store, &sw, &net).await.unwrap());
    }

    #[tokio::test]
    async fn repeated_subnet_delete_returns_false() {
        let store = MemoryStore::new();
        let sw = running_switch(&store, "demo").await;
        let net = add_network(&store, &sw, "vm", "eth1", None).await.unwrap().unwrap();
        let subnet = add_subnet(&store, &sw, &net, "10.0.0.0/24").await.unwrap().unwrap();

        assert!(delete_subnet(&store, &sw, &subnet).await.unwrap());
        assert!(!delete_subnet(&store, &sw, &subnet).await.unwrap());
        assert!(!delete_subnet(&store, &sw, &subnet).await.unwrap());

        let network = get_network_by_id(&store, &sw, &net).await.unwrap().unwrap();
        assert!(network.subnets.is_empty());
    }

    #[tokio::test]
    async fn store_rejection_surfaces_on_subnet_add() {
        let store = MemoryStore::new();
        let sw = running_switch(&store, "demo").await;
        let net = add_network(&store, &sw, "vm", "eth1", None).await.unwrap().unwrap();
        store.reject_once(Operation::Set, ResourceKind::Subnet, "overlapping cidr");

        let result = add_subnet(&store, &sw, &net, "10.0.0.0/24").await;
        assert!(matches!(result, Err(ControlError::Store(_))));
    }
}
