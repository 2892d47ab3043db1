//! Domains and domain/port bindings.
//!
//! A binding is its own row joining a domain reference and a port reference.
//! The store enforces neither side of it, so every membership question is a
//! scan over all bindings filtered by the port's type tag.

use vnet_core::{DomainId, PortId, ResourceKind, SwitchId};
use vnet_store::{to_fields, ResourceStore, StoreReader};

use crate::error::{ControlError, Result};
use crate::model::{Domain, DomainPortBinding, PortKind};
use crate::port::{self, Removal};
use crate::scan;
use crate::switch::{self, is_running, switch_scope};
use crate::types::CreateDomainRequest;

/// Create a domain on a running switch. Names are not checked.
///
/// # Errors
///
/// Returns `ControlError::MissingAttachment` if the running switch has no
/// fabric attachment, and store errors as they occur.
pub async fn add_domain<S>(store: &S, switch_id: &SwitchId, name: &str) -> Result<Option<DomainId>>
where
    S: ResourceStore + ?Sized,
{
    if !is_running(store, switch_id).await? {
        return Ok(None);
    }
    let vswitch = switch::get_networking_id(store, switch_id)
        .await?
        .ok_or_else(|| ControlError::MissingAttachment(switch_id.clone()))?;

    let created = store
        .set(
            &switch_scope(switch_id),
            ResourceKind::Domain,
            to_fields(&CreateDomainRequest { name, vswitch })?,
        )
        .await?;
    let domain_id = DomainId::new(created.id)?;

    tracing::info!(switch_id = %switch_id, domain_id = %domain_id, name, "Created domain");
    Ok(Some(domain_id))
}

/// List the domains of a running switch.
///
/// # Errors
///
/// Returns an error if a store call fails.
pub async fn get_domains<S>(store: &S, switch_id: &SwitchId) -> Result<Option<Vec<Domain>>>
where
    S: StoreReader + ?Sized,
{
    if !is_running(store, switch_id).await? {
        return Ok(None);
    }
    scan::list(store, &switch_scope(switch_id)).await.map(Some)
}

/// Find a domain by id.
///
/// # Errors
///
/// Returns an error if a store call fails.
pub async fn get_domain_by_id<S>(
    store: &S,
    switch_id: &SwitchId,
    domain_id: &DomainId,
) -> Result<Option<Domain>>
where
    S: StoreReader + ?Sized,
{
    if !is_running(store, switch_id).await? {
        return Ok(None);
    }
    scan::by_id(store, &switch_scope(switch_id), domain_id.as_str()).await
}

/// Find the first domain with this name.
///
/// # Errors
///
/// Returns an error if a store call fails.
pub async fn get_domain_by_name<S>(
    store: &S,
    switch_id: &SwitchId,
    name: &str,
) -> Result<Option<Domain>>
where
    S: StoreReader + ?Sized,
{
    if !is_running(store, switch_id).await? {
        return Ok(None);
    }
    scan::by_name(store, &switch_scope(switch_id), name).await
}

/// Delete a domain with its bindings and every port bound to it.
///
/// Returns `false` if the switch is not running or the domain does not exist.
///
/// # Errors
///
/// Returns `ControlError::CascadeAborted` if a binding or port refuses
/// removal, e.g. a GRE port that is also bound to another domain.
pub async fn delete_domain<S>(
    store: &S,
    switch_id: &SwitchId,
    domain_id: &DomainId,
) -> Result<bool>
where
    S: ResourceStore + ?Sized,
{
    if get_domain_by_id(store, switch_id, domain_id).await?.is_none() {
        tracing::debug!(switch_id = %switch_id, domain_id = %domain_id, "Domain not found");
        return Ok(false);
    }
    purge_domain(store, switch_id, domain_id).await?;
    Ok(true)
}

/// Remove a domain's bindings, its bound ports, then the domain itself.
///
/// Does not check that the switch runs, so switch deletion can use it after
/// the run instance is gone.
pub(crate) async fn purge_domain<S>(
    store: &S,
    switch_id: &SwitchId,
    domain_id: &DomainId,
) -> Result<()>
where
    S: ResourceStore + ?Sized,
{
    let resource = format!("domain {domain_id}");

    for binding in bindings(store, switch_id).await? {
        if binding.domain.id != domain_id.as_str() {
            continue;
        }
        let Some(kind) = binding.port_kind() else {
            tracing::warn!(
                switch_id = %switch_id,
                domain_id = %domain_id,
                tid = %binding.port.tid,
                "Skipping binding to a non-port resource"
            );
            continue;
        };
        let port_id = PortId::new(binding.port.id.as_str())?;

        if !unbind(store, switch_id, kind, domain_id, &port_id).await? {
            return Err(ControlError::cascade(
                &resource,
                format!("unbind {kind} port {port_id}"),
            ));
        }
        match port::remove_port(store, switch_id, kind, &port_id).await? {
            Removal::Deleted => {}
            // Left behind by an unguarded VLAN delete; nothing to remove.
            Removal::Missing => tracing::debug!(
                switch_id = %switch_id,
                domain_id = %domain_id,
                port_id = %port_id,
                "Bound port already gone"
            ),
            Removal::StillBound => {
                return Err(ControlError::cascade(
                    &resource,
                    format!("delete {kind} port {port_id}"),
                ));
            }
        }
    }

    store
        .delete(
            &switch_scope(switch_id),
            ResourceKind::Domain,
            vnet_store::id_selector(domain_id.as_str()),
        )
        .await?;

    tracing::info!(switch_id = %switch_id, domain_id = %domain_id, "Deleted domain");
    Ok(())
}

/// Bind a port to a domain.
///
/// Returns `false` if the switch is not running, the domain or port does not
/// exist, or the pair is already bound.
///
/// # Errors
///
/// Returns an error if a store call fails.
pub async fn add_port_domain<S>(
    store: &S,
    switch_id: &SwitchId,
    kind: PortKind,
    domain_id: &DomainId,
    port_id: &PortId,
) -> Result<bool>
where
    S: ResourceStore + ?Sized,
{
    if get_domain_by_id(store, switch_id, domain_id).await?.is_none()
        || port::get_port(store, switch_id, kind, port_id).await?.is_none()
    {
        tracing::debug!(
            switch_id = %switch_id,
            domain_id = %domain_id,
            port_id = %port_id,
            "Domain or port not found"
        );
        return Ok(false);
    }
    if is_bound(store, switch_id, kind, domain_id, port_id).await? {
        return Ok(false);
    }

    let binding = DomainPortBinding::new(domain_id, kind, port_id);
    store
        .set(&switch_scope(switch_id), ResourceKind::DomainPort, to_fields(&binding)?)
        .await?;

    tracing::info!(
        switch_id = %switch_id,
        domain_id = %domain_id,
        port_id = %port_id,
        kind = %kind,
        "Bound port to domain"
    );
    Ok(true)
}

/// Check whether a port is bound to a domain.
///
/// # Errors
///
/// Returns an error if a store call fails.
pub async fn is_port_domain<S>(
    store: &S,
    switch_id: &SwitchId,
    kind: PortKind,
    domain_id: &DomainId,
    port_id: &PortId,
) -> Result<bool>
where
    S: StoreReader + ?Sized,
{
    if !is_running(store, switch_id).await? {
        return Ok(false);
    }
    is_bound(store, switch_id, kind, domain_id, port_id).await
}

/// Check whether a port is bound to any domain.
///
/// # Errors
///
/// Returns an error if a store call fails.
pub async fn is_port_any_domain<S>(
    store: &S,
    switch_id: &SwitchId,
    kind: PortKind,
    port_id: &PortId,
) -> Result<bool>
where
    S: StoreReader + ?Sized,
{
    if !is_running(store, switch_id).await? {
        return Ok(false);
    }
    binds_any(store, switch_id, kind, port_id).await
}

/// Remove a binding. The port itself is kept.
///
/// Returns `false` if the switch is not running or the binding does not
/// exist.
///
/// # Errors
///
/// Returns an error if a store call fails.
pub async fn delete_port_domain<S>(
    store: &S,
    switch_id: &SwitchId,
    kind: PortKind,
    domain_id: &DomainId,
    port_id: &PortId,
) -> Result<bool>
where
    S: ResourceStore + ?Sized,
{
    if !is_running(store, switch_id).await? {
        return Ok(false);
    }
    unbind(store, switch_id, kind, domain_id, port_id).await
}

async fn bindings<S>(store: &S, switch_id: &SwitchId) -> Result<Vec<DomainPortBinding>>
where
    S: StoreReader + ?Sized,
{
    scan::list(store, &switch_scope(switch_id)).await
}

async fn is_bound<S>(
    store: &S,
    switch_id: &SwitchId,
    kind: PortKind,
    domain_id: &DomainId,
    port_id: &PortId,
) -> Result<bool>
where
    S: StoreReader + ?Sized,
{
    Ok(bindings(store, switch_id)
        .await?
        .iter()
        .any(|b| b.joins(domain_id, kind, port_id)))
}

/// Whether any domain holds the port. Does not check that the switch runs.
pub(crate) async fn binds_any<S>(
    store: &S,
    switch_id: &SwitchId,
    kind: PortKind,
    port_id: &PortId,
) -> Result<bool>
where
    S: StoreReader + ?Sized,
{
    Ok(bindings(store, switch_id)
        .await?
        .iter()
        .any(|b| b.binds_port(kind, port_id)))
}

async fn unbind<S>(
    store: &S,
    switch_id: &SwitchId,
    kind: PortKind,
    domain_id: &DomainId,
    port_id: &PortId,
) -> Result<bool>
where
    S: ResourceStore + ?Sized,
{
    if !is_bound(store, switch_id, kind, domain_id, port_id).await? {
        tracing::debug!(
            switch_id = %switch_id,
            domain_id = %domain_id,
            port_id = %port_id,
            "Binding not found"
        );
        return Ok(false);
    }

    let selector = to_fields(&DomainPortBinding::new(domain_id, kind, port_id))?;
    store
        .delete(&switch_scope(switch_id), ResourceKind::DomainPort, selector)
        .await?;

    tracing::info!(
        switch_id = %switch_id,
        domain_id = %domain_id,
        port_id = %port_id,
        kind = %kind,
        "Unbound port from domain"
    );
    Ok(true)
}
