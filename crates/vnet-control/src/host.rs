//! Host-level networks and subnets.
//!
//! These live on the host agent rather than inside a switch, so nothing here
//! waits for a switch to run. Host subnets are what the NAT rule translates.
//! As on a switch, a network's subnets are deleted before the network.

use std::fmt;

use serde::{Deserialize, Serialize};
use vnet_core::{NetworkId, ResourceKind, SubnetId};
use vnet_store::{id_selector, to_fields, ResourceStore, Scope, StoreReader, StoreWriter};

use crate::error::Result;
use crate::model::{Network, Subnet};
use crate::scan;
use crate::types::{CreateNetworkRequest, SubnetSpec};

/// Well-known host networks, looked up by their conventional names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostNetworkRole {
    /// Carries GRE overlay traffic.
    Overlay,
    /// Carries tagged VLAN traffic.
    Vlan,
    /// Uplink towards the WAN.
    Tap,
}

impl HostNetworkRole {
    /// Name the host network for this role is created under.
    #[must_use]
    pub const fn network_name(self) -> &'static str {
        match self {
            Self::Overlay => "overlay-network",
            Self::Vlan => "vlan-network",
            Self::Tap => "wan-network",
        }
    }
}

impl fmt::Display for HostNetworkRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overlay => f.write_str("overlay"),
            Self::Vlan => f.write_str("vlan"),
            Self::Tap => f.write_str("tap"),
        }
    }
}

/// Create a host network.
///
/// # Errors
///
/// Returns an error if the store refuses the network.
pub async fn add_host_network<S>(
    store: &S,
    name: &str,
    network_type: &str,
    host_interface: &str,
) -> Result<NetworkId>
where
    S: StoreWriter + ?Sized,
{
    let request = CreateNetworkRequest {
        network_type,
        name,
        host_interface,
    };
    let created = store
        .set(&Scope::Agent, ResourceKind::Network, to_fields(&request)?)
        .await?;
    let network_id = NetworkId::new(created.id)?;

    tracing::info!(network_id = %network_id, name, network_type, "Created host network");
    Ok(network_id)
}

/// Whether any host network exists.
///
/// # Errors
///
/// Returns an error if the store call fails.
pub async fn has_host_networking<S>(store: &S) -> Result<bool>
where
    S: StoreReader + ?Sized,
{
    Ok(!store
        .walk(&Scope::Agent, ResourceKind::Network)
        .await?
        .is_empty())
}

/// List host networks.
///
/// # Errors
///
/// Returns an error if the store call fails.
pub async fn get_host_networks<S>(store: &S) -> Result<Vec<Network>>
where
    S: StoreReader + ?Sized,
{
    scan::list(store, &Scope::Agent).await
}

/// Find a host network by id.
///
/// # Errors
///
/// Returns an error if the store call fails.
pub async fn get_host_network_by_id<S>(
    store: &S,
    network_id: &NetworkId,
) -> Result<Option<Network>>
where
    S: StoreReader + ?Sized,
{
    scan::by_id(store, &Scope::Agent, network_id.as_str()).await
}

/// Find the first host network with this name.
///
/// # Errors
///
/// Returns an error if the store call fails.
pub async fn get_host_network_by_name<S>(store: &S, name: &str) -> Result<Option<Network>>
where
    S: StoreReader + ?Sized,
{
    scan::by_name(store, &Scope::Agent, name).await
}

/// Find the host network serving a role.
///
/// # Errors
///
/// Returns an error if the store call fails.
pub async fn get_host_network_by_role<S>(
    store: &S,
    role: HostNetworkRole,
) -> Result<Option<Network>>
where
    S: StoreReader + ?Sized,
{
    get_host_network_by_name(store, role.network_name()).await
}

/// Delete a host network after deleting each of its subnets.
///
/// Returns `false` if the network does not exist or one of its subnets
/// could not be found.
///
/// # Errors
///
/// Returns an error if a store call fails.
pub async fn delete_host_network<S>(store: &S, network_id: &NetworkId) -> Result<bool>
where
    S: ResourceStore + ?Sized,
{
    let Some(network) = get_host_network_by_id(store, network_id).await? else {
        tracing::debug!(network_id = %network_id, "Host network not found");
        return Ok(false);
    };

    for subnet_id in &network.subnets {
        if !delete_host_subnet(store, subnet_id).await? {
            tracing::debug!(
                network_id = %network_id,
                subnet_id = %subnet_id,
                "Host subnet refused, network kept"
            );
            return Ok(false);
        }
    }

    store
        .delete(&Scope::Agent, ResourceKind::Network, id_selector(network_id.as_str()))
        .await?;

    tracing::info!(network_id = %network_id, "Deleted host network");
    Ok(true)
}

/// Delete the first host network with this name.
///
/// # Errors
///
/// Returns an error if a store call fails.
pub async fn delete_host_network_by_name<S>(store: &S, name: &str) -> Result<bool>
where
    S: ResourceStore + ?Sized,
{
    match get_host_network_by_name(store, name).await? {
        Some(network) => delete_host_network(store, &network.id).await,
        None => Ok(false),
    }
}

/// Add a subnet to a host network.
///
/// Returns `None` if the network does not exist.
///
/// # Errors
///
/// Returns an error if the store refuses the subnet.
pub async fn add_host_subnet<S>(
    store: &S,
    network_id: &NetworkId,
    spec: SubnetSpec,
) -> Result<Option<SubnetId>>
where
    S: StoreReader + StoreWriter + ?Sized,
{
    if get_host_network_by_id(store, network_id).await?.is_none() {
        return Ok(None);
    }

    let cidr = spec.cidr.clone();
    let created = store
        .set(
            &Scope::Agent,
            ResourceKind::Subnet,
            to_fields(&spec.into_request(network_id))?,
        )
        .await?;
    let subnet_id = SubnetId::new(created.id)?;

    tracing::info!(
        network_id = %network_id,
        subnet_id = %subnet_id,
        cidr = %cidr,
        "Created host subnet"
    );
    Ok(Some(subnet_id))
}

/// List host subnets.
///
/// # Errors
///
/// Returns an error if the store call fails.
pub async fn get_host_subnets<S>(store: &S) -> Result<Vec<Subnet>>
where
    S: StoreReader + ?Sized,
{
    scan::list(store, &Scope::Agent).await
}

/// Find a host subnet by id.
///
/// # Errors
///
/// Returns an error if the store call fails.
pub async fn get_host_subnet_by_id<S>(store: &S, subnet_id: &SubnetId) -> Result<Option<Subnet>>
where
    S: StoreReader + ?Sized,
{
    scan::by_id(store, &Scope::Agent, subnet_id.as_str()).await
}

/// Find the first host subnet with this name.
///
/// # Errors
///
/// Returns an error if the store call fails.
pub async fn get_host_subnet_by_name<S>(store: &S, name: &str) -> Result<Option<Subnet>>
where
    S: StoreReader + ?Sized,
{
    scan::by_name(store, &Scope::Agent, name).await
}

/// First subnet of a host network.
///
/// # Errors
///
/// Returns an error if the store call fails.
pub async fn get_host_network_subnet<S>(
    store: &S,
    network_id: &NetworkId,
) -> Result<Option<SubnetId>>
where
    S: StoreReader + ?Sized,
{
    Ok(get_host_network_by_id(store, network_id)
        .await?
        .and_then(|network| network.subnets.into_iter().next()))
}

/// Delete a host subnet. Returns `false` if it does not exist.
///
/// # Errors
///
/// Returns an error if a store call fails.
pub async fn delete_host_subnet<S>(store: &S, subnet_id: &SubnetId) -> Result<bool>
where
    S: ResourceStore + ?Sized,
{
    if get_host_subnet_by_id(store, subnet_id).await?.is_none() {
        tracing::debug!(subnet_id = %subnet_id, "Host subnet not found");
        return Ok(false);
    }

    store
        .delete(&Scope::Agent, ResourceKind::Subnet, id_selector(subnet_id.as_str()))
        .await?;

    tracing::info!(subnet_id = %subnet_id, "Deleted host subnet");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vnet_store::{MemoryStore, Operation};

    #[test]
    fn role_names() {
        assert_eq!(HostNetworkRole::Overlay.network_name(), "overlay-network");
        assert_eq!(HostNetworkRole::Vlan.network_name(), "vlan-network");
        assert_eq!(HostNetworkRole::Tap.network_name(), "wan-network");
        assert_eq!(HostNetworkRole::Tap.to_string(), "tap");
    }

    #[tokio::test]
    async fn host_network_lives_on_the_agent() {
        let store = MemoryStore::new();
        assert!(!has_host_networking(&store).await.unwrap());

        let id = add_host_network(&store, "overlay-network", "overlay", "eth1")
            .await
            .unwrap();

        assert!(has_host_networking(&store).await.unwrap());
        assert_eq!(store.count(&Scope::Agent, ResourceKind::Network), 1);

        let network = get_host_network_by_role(&store, HostNetworkRole::Overlay)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(network.id, id);
        assert_eq!(network.network_type, "overlay");
        assert_eq!(network.host_interface.as_deref(), Some("eth1"));
        assert!(get_host_network_by_role(&store, HostNetworkRole::Tap)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn subnet_with_gateway_and_pool() {
        let store = MemoryStore::new();
        let network = add_host_network(&store, "vms", "flat", "br0").await.unwrap();

        let spec = SubnetSpec::new("172.16.0.0/24")
            .with_name("vms")
            .with_gateway("172.16.0.1")
            .with_pool("172.16.0.10", "172.16.0.99");
        let id = add_host_subnet(&store, &network, spec).await.unwrap().unwrap();

        let subnet = get_host_subnet_by_name(&store, "vms").await.unwrap().unwrap();
        assert_eq!(subnet.id, id);
        assert_eq!(subnet.gateway_ip.as_deref(), Some("172.16.0.1"));
        assert_eq!(subnet.allocation_pools.len(), 1);
        assert_eq!(subnet.allocation_pools[0].start, "172.16.0.10");
        assert_eq!(
            get_host_network_subnet(&store, &network).await.unwrap(),
            Some(id)
        );
        assert_eq!(get_host_subnets(&store).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn subnet_needs_network() {
        let store = MemoryStore::new();
        let missing = NetworkId::new("wrong").unwrap();

        let id = add_host_subnet(&store, &missing, SubnetSpec::new("10.0.0.0/24"))
            .await
            .unwrap();
        assert!(id.is_none());
        assert_eq!(store.calls(Operation::Set, ResourceKind::Subnet), 0);
    }

    #[tokio::test]
    async fn delete_network_removes_subnets_first() {
        let store = MemoryStore::new();
        let network = add_host_network(&store, "vms", "flat", "br0").await.unwrap();
        let subnet = add_host_subnet(&store, &network, SubnetSpec::new("10.0.0.0/24"))
            .await
            .unwrap()
            .unwrap();

        assert!(delete_host_network_by_name(&store, "vms").await.unwrap());
        assert_eq!(store.count(&Scope::Agent, ResourceKind::Subnet), 0);
        assert_eq!(store.count(&Scope::Agent, ResourceKind::Network), 0);

        assert!(!delete_host_subnet(&store, &subnet).await.unwrap());
        assert!(!delete_host_network(&store, &network).await.unwrap());
        assert!(!delete_host_network_by_name(&store, "vms").await.unwrap());
    }
}
