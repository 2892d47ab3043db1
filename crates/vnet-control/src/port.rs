//! GRE and VLAN ports of a running switch.
//!
//! Both kinds share lookup and delete code, selected by [`PortKind`]. The
//! store validates endpoint addresses and VLAN tag reuse itself; its
//! rejections come back as `ControlError::Store` with the store's message.

use vnet_core::{NetworkId, PortId, ResourceKind, SubnetId, SwitchId};
use vnet_store::{id_selector, to_fields, ResourceStore, StoreReader, StoreWriter};

use crate::domain;
use crate::error::Result;
use crate::model::{GrePort, Port, PortKind, Record, VlanPort};
use crate::network;
use crate::scan;
use crate::switch::{is_running, switch_scope};
use crate::types::{CreateVlanPortRequest, GrePortSpec};

/// Create a GRE port drawing its local endpoint from a subnet.
///
/// Returns `None` if the switch is not running or the subnet does not exist.
///
/// # Errors
///
/// Returns an error if the store rejects the port, e.g. an endpoint outside
/// the subnet or already in use.
pub async fn add_port_gre<S>(
    store: &S,
    switch_id: &SwitchId,
    subnet_id: &SubnetId,
    spec: GrePortSpec,
) -> Result<Option<PortId>>
where
    S: StoreReader + StoreWriter + ?Sized,
{
    if network::get_subnet_by_id(store, switch_id, subnet_id)
        .await?
        .is_none()
    {
        return Ok(None);
    }

    let request = spec.into_request(subnet_id);
    let created = store
        .set(&switch_scope(switch_id), ResourceKind::GrePort, to_fields(&request)?)
        .await?;
    let port_id = PortId::new(created.id)?;

    tracing::info!(
        switch_id = %switch_id,
        port_id = %port_id,
        subnet_id = %subnet_id,
        name = %request.name,
        "Created GRE port"
    );
    Ok(Some(port_id))
}

/// Create a VLAN port on a network carrying one tag.
///
/// Returns `None` if the switch is not running or the network does not exist.
///
/// # Errors
///
/// Returns an error if the store rejects the port, e.g. a tag already in use.
pub async fn add_port_vlan<S>(
    store: &S,
    switch_id: &SwitchId,
    network_id: &NetworkId,
    name: &str,
    vlan_tag: u16,
) -> Result<Option<PortId>>
where
    S: StoreReader + StoreWriter + ?Sized,
{
    if network::get_network_by_id(store, switch_id, network_id)
        .await?
        .is_none()
    {
        return Ok(None);
    }

    let request = CreateVlanPortRequest {
        name,
        network_id,
        vlan_ids: [vlan_tag],
    };
    let created = store
        .set(&switch_scope(switch_id), ResourceKind::VlanPort, to_fields(&request)?)
        .await?;
    let port_id = PortId::new(created.id)?;

    tracing::info!(
        switch_id = %switch_id,
        port_id = %port_id,
        network_id = %network_id,
        vlan_tag,
        "Created VLAN port"
    );
    Ok(Some(port_id))
}

/// List ports of one kind on a running switch.
///
/// # Errors
///
/// Returns an error if a store call fails.
pub async fn get_ports<R, S>(store: &S, switch_id: &SwitchId) -> Result<Option<Vec<R>>>
where
    R: Record,
    S: StoreReader + ?Sized,
{
    if !is_running(store, switch_id).await? {
        return Ok(None);
    }
    scan::list(store, &switch_scope(switch_id)).await.map(Some)
}

/// Find a port of one kind by id.
///
/// # Errors
///
/// Returns an error if a store call fails.
pub async fn get_port_by_id<R, S>(
    store: &S,
    switch_id: &SwitchId,
    port_id: &PortId,
) -> Result<Option<R>>
where
    R: Record,
    S: StoreReader + ?Sized,
{
    if !is_running(store, switch_id).await? {
        return Ok(None);
    }
    scan::by_id(store, &switch_scope(switch_id), port_id.as_str()).await
}

/// Find the first port of one kind with this name.
///
/// # Errors
///
/// Returns an error if a store call fails.
pub async fn get_port_by_name<R, S>(
    store: &S,
    switch_id: &SwitchId,
    name: &str,
) -> Result<Option<R>>
where
    R: Record,
    S: StoreReader + ?Sized,
{
    if !is_running(store, switch_id).await? {
        return Ok(None);
    }
    scan::by_name(store, &switch_scope(switch_id), name).await
}

/// Find a port by kind and id.
///
/// # Errors
///
/// Returns an error if a store call fails.
pub async fn get_port<S>(
    store: &S,
    switch_id: &SwitchId,
    kind: PortKind,
    port_id: &PortId,
) -> Result<Option<Port>>
where
    S: StoreReader + ?Sized,
{
    Ok(match kind {
        PortKind::Gre => get_port_by_id::<GrePort, _>(store, switch_id, port_id)
            .await?
            .map(Port::from),
        PortKind::Vlan => get_port_by_id::<VlanPort, _>(store, switch_id, port_id)
            .await?
            .map(Port::from),
    })
}

/// Delete a port.
///
/// Returns `false` if the switch is not running or the port does not exist.
/// A GRE port that is still bound to any domain is refused as well. VLAN
/// ports are deleted even when bound; their bindings are left behind.
///
/// # Errors
///
/// Returns an error if a store call fails.
pub async fn delete_port<S>(
    store: &S,
    switch_id: &SwitchId,
    kind: PortKind,
    port_id: &PortId,
) -> Result<bool>
where
    S: ResourceStore + ?Sized,
{
    if !is_running(store, switch_id).await? {
        return Ok(false);
    }
    Ok(remove_port(store, switch_id, kind, port_id).await? == Removal::Deleted)
}

/// How a port delete ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Removal {
    Deleted,
    Missing,
    StillBound,
}

/// Delete a port without checking that the switch runs.
pub(crate) async fn remove_port<S>(
    store: &S,
    switch_id: &SwitchId,
    kind: PortKind,
    port_id: &PortId,
) -> Result<Removal>
where
    S: ResourceStore + ?Sized,
{
    let scope = switch_scope(switch_id);
    let exists = store
        .walk(&scope, kind.resource_kind())
        .await?
        .iter()
        .any(|row| row.id == port_id.as_str());
    if !exists {
        tracing::debug!(switch_id = %switch_id, port_id = %port_id, kind = %kind, "Port not found");
        return Ok(Removal::Missing);
    }

    let bound = domain::binds_any(store, switch_id, kind, port_id).await?;
    match kind {
        PortKind::Gre if bound => {
            tracing::debug!(
                switch_id = %switch_id,
                port_id = %port_id,
                "GRE port still bound to a domain"
            );
            return Ok(Removal::StillBound);
        }
        PortKind::Vlan if bound => {
            // VLAN ports carry no domain guard; the binding is orphaned.
            tracing::warn!(
                switch_id = %switch_id,
                port_id = %port_id,
                "Deleting VLAN port that is bound to a domain"
            );
        }
        PortKind::Gre | PortKind::Vlan => {}
    }

    store
        .delete(&scope, kind.resource_kind(), id_selector(port_id.as_str()))
        .await?;

    tracing::info!(switch_id = %switch_id, port_id = %port_id, kind = %kind, "Deleted port");
    Ok(Removal::Deleted)
}
