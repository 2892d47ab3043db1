//! Host NAT rule.
//!
//! The host agent holds at most one `host.nat` row. It masquerades traffic
//! from a host-level subnet out of one interface.

use vnet_core::{NatId, ResourceKind, SubnetId};
use vnet_store::{id_selector, to_fields, ResourceStore, Scope, StoreReader};

use crate::error::Result;
use crate::host;
use crate::model::Nat;
use crate::scan;
use crate::types::CreateNatRequest;

/// Get the NAT rule, if one is configured.
///
/// # Errors
///
/// Returns an error if the store call fails.
pub async fn get_nat<S>(store: &S) -> Result<Option<Nat>>
where
    S: StoreReader + ?Sized,
{
    scan::first(store, &Scope::Agent).await
}

/// Enable NAT for a host-level subnet.
///
/// Returns `None` if a rule already exists or the subnet is unknown.
///
/// # Errors
///
/// Returns an error if a store call fails.
pub async fn enable_nat<S>(
    store: &S,
    out_interface: &str,
    subnet_id: &SubnetId,
) -> Result<Option<NatId>>
where
    S: ResourceStore + ?Sized,
{
    if let Some(existing) = get_nat(store).await? {
        tracing::debug!(nat_id = %existing.id, "NAT already enabled");
        return Ok(None);
    }
    if host::get_host_subnet_by_id(store, subnet_id).await?.is_none() {
        tracing::debug!(subnet_id = %subnet_id, "Host subnet not found");
        return Ok(None);
    }

    let request = CreateNatRequest {
        out_interface,
        subnet_id,
    };
    let created = store
        .set(&Scope::Agent, ResourceKind::HostNat, to_fields(&request)?)
        .await?;
    let nat_id = NatId::new(created.id)?;

    tracing::info!(nat_id = %nat_id, out_interface, subnet_id = %subnet_id, "Enabled NAT");
    Ok(Some(nat_id))
}

/// Remove the NAT rule. Returns `false` if none exists.
///
/// # Errors
///
/// Returns an error if a store call fails.
pub async fn disable_nat<S>(store: &S) -> Result<bool>
where
    S: ResourceStore + ?Sized,
{
    let Some(nat) = get_nat(store).await? else {
        return Ok(false);
    };

    store
        .delete(&Scope::Agent, ResourceKind::HostNat, id_selector(nat.id.as_str()))
        .await?;

    tracing::info!(nat_id = %nat.id, "Disabled NAT");
    Ok(true)
}
