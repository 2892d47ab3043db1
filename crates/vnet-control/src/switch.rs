//! Switch definitions and run instances.
//!
//! Definitions and runs live on the host agent. "Defined" means a
//! `compute.vswitch` row with the id exists, and "running" means a
//! `compute.server` row points at it. Neither is cached: every query walks
//! the store again.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use vnet_core::{ResourceKind, RunId, SwitchId};
use vnet_store::{
    id_selector, to_fields, Fields, ResourceRef, ResourceStore, Scope, StoreReader, StoreWriter,
};

use crate::domain;
use crate::error::{ControlError, Result};
use crate::lifecycle::{validate_transition, SwitchState};
use crate::model::{Domain, Switch, SwitchRun};
use crate::poller;
use crate::scan;
use crate::types::{CreateRunRequest, CreateSwitchRequest, PollOutcome, StartOutcome};

/// Scope holding the networking resources of a switch.
pub(crate) fn switch_scope(switch_id: &SwitchId) -> Scope {
    Scope::Switch(switch_id.clone())
}

/// Check whether a switch definition exists.
///
/// # Errors
///
/// Returns an error if the store call fails.
pub async fn is_defined<S>(store: &S, switch_id: &SwitchId) -> Result<bool>
where
    S: StoreReader + ?Sized,
{
    Ok(scan::by_id::<Switch, _>(store, &Scope::Agent, switch_id.as_str())
        .await?
        .is_some())
}

/// List every switch definition.
///
/// # Errors
///
/// Returns an error if the store call fails.
pub async fn get_switches<S>(store: &S) -> Result<Vec<Switch>>
where
    S: StoreReader + ?Sized,
{
    scan::list(store, &Scope::Agent).await
}

/// Find the first switch with this name.
///
/// # Errors
///
/// Returns an error if the store call fails.
pub async fn get_switch_by_name<S>(store: &S, name: &str) -> Result<Option<Switch>>
where
    S: StoreReader + ?Sized,
{
    scan::by_name(store, &Scope::Agent, name).await
}

/// Find the first switch that has a domain with this name.
///
/// Only running switches are searched, since stopped switches expose no
/// domains.
///
/// # Errors
///
/// Returns an error if a store call fails.
pub async fn get_switch_by_domain<S>(store: &S, domain_name: &str) -> Result<Option<Switch>>
where
    S: StoreReader + ?Sized,
{
    for switch in get_switches(store).await? {
        if domain::get_domain_by_name(store, &switch.id, domain_name)
            .await?
            .is_some()
        {
            return Ok(Some(switch));
        }
    }
    Ok(None)
}

/// Create a switch definition. Names are not checked for uniqueness.
///
/// # Errors
///
/// Returns an error if the store refuses the definition.
pub async fn add_switch<S>(store: &S, name: &str) -> Result<SwitchId>
where
    S: StoreWriter + ?Sized,
{
    let created = store
        .set(
            &Scope::Agent,
            ResourceKind::Switch,
            to_fields(&CreateSwitchRequest { name })?,
        )
        .await?;
    let switch_id = SwitchId::new(created.id)?;

    tracing::info!(switch_id = %switch_id, name = %name, "Created switch");
    Ok(switch_id)
}

/// Resolve the run instance of a switch.
///
/// Returns `None` when the switch is not defined or not running.
///
/// # Errors
///
/// Returns an error if a store call fails.
pub async fn get_run_id<S>(store: &S, switch_id: &SwitchId) -> Result<Option<RunId>>
where
    S: StoreReader + ?Sized,
{
    if !is_defined(store, switch_id).await? {
        return Ok(None);
    }

    let runs: Vec<SwitchRun> = scan::list(store, &Scope::Agent).await?;
    Ok(runs
        .into_iter()
        .find(|run| {
            run.configuration.tid == ResourceKind::Switch
                && run.configuration.id == switch_id.as_str()
        })
        .map(|run| run.id))
}

/// Check whether a switch has a run instance.
///
/// # Errors
///
/// Returns an error if a store call fails.
pub async fn is_running<S>(store: &S, switch_id: &SwitchId) -> Result<bool>
where
    S: StoreReader + ?Sized,
{
    Ok(get_run_id(store, switch_id).await?.is_some())
}

/// Resolve the fabric attachment of a running switch.
///
/// # Errors
///
/// Returns an error if a store call fails.
pub async fn get_networking_id<S>(store: &S, switch_id: &SwitchId) -> Result<Option<ResourceRef>>
where
    S: StoreReader + ?Sized,
{
    if !is_running(store, switch_id).await? {
        return Ok(None);
    }

    let attachments = store
        .walk(&switch_scope(switch_id), ResourceKind::FabricAttachment)
        .await?;
    Ok(attachments
        .first()
        .map(|row| ResourceRef::new(ResourceKind::FabricAttachment, row.id.as_str())))
}

/// Derive the lifecycle state of a switch from the store.
///
/// # Errors
///
/// Returns an error if a store call fails.
pub async fn switch_state<S>(store: &S, switch_id: &SwitchId) -> Result<SwitchState>
where
    S: StoreReader + ?Sized,
{
    if !is_defined(store, switch_id).await? {
        return Ok(SwitchState::Undefined);
    }
    let has_run = get_run_id(store, switch_id).await?.is_some();
    let connected = has_run && poller::is_connected(store, switch_id).await?;
    Ok(SwitchState::derive(true, has_run, connected))
}

/// Start a switch and wait for it to connect.
///
/// Creates a run instance, then polls the mux for up to `max_wait_seconds`
/// (see [`poller::wait_connected`] for the exact bound). On connection the
/// fabric attachment is confirmed with one `set`. A start that does not
/// connect keeps its run instance.
///
/// # Errors
///
/// Returns an error if a store call fails.
pub async fn start_switch_with<S>(
    store: &S,
    switch_id: &SwitchId,
    max_wait_seconds: u64,
    interval: Duration,
    cancel: &CancellationToken,
) -> Result<StartOutcome>
where
    S: StoreReader + StoreWriter + ?Sized,
{
    if !is_defined(store, switch_id).await? {
        tracing::debug!(switch_id = %switch_id, "Cannot start undefined switch");
        return Ok(StartOutcome::NotDefined);
    }
    if is_running(store, switch_id).await? {
        tracing::debug!(switch_id = %switch_id, "Switch already running");
        return Ok(StartOutcome::AlreadyRunning);
    }
    validate_transition(switch_id, SwitchState::Defined, SwitchState::Starting)?;

    let request = CreateRunRequest {
        configuration: ResourceRef::new(ResourceKind::Switch, switch_id.as_str()),
    };
    let run = store
        .set(&Scope::Agent, ResourceKind::SwitchRun, to_fields(&request)?)
        .await?;
    let run_id = RunId::new(run.id)?;

    tracing::info!(switch_id = %switch_id, run_id = %run_id, "Starting switch");

    match poller::wait_connected(store, switch_id, max_wait_seconds, interval, cancel).await? {
        PollOutcome::Connected => {
            validate_transition(switch_id, SwitchState::Starting, SwitchState::Running)?;
        }
        PollOutcome::TimedOut => {
            tracing::warn!(
                switch_id = %switch_id,
                run_id = %run_id,
                max_wait_seconds,
                "Switch did not connect; run instance left in place"
            );
            return Ok(StartOutcome::TimedOut { run_id });
        }
        PollOutcome::Cancelled => {
            tracing::warn!(switch_id = %switch_id, run_id = %run_id, "Switch start cancelled");
            return Ok(StartOutcome::Cancelled { run_id });
        }
    }

    store
        .set(
            &switch_scope(switch_id),
            ResourceKind::FabricAttachment,
            Fields::new(),
        )
        .await?;

    tracing::info!(switch_id = %switch_id, run_id = %run_id, "Started switch");
    Ok(StartOutcome::Started)
}

/// Start a switch, reporting only whether it came up.
///
/// # Errors
///
/// Returns an error if a store call fails.
pub async fn start_switch<S>(
    store: &S,
    switch_id: &SwitchId,
    max_wait_seconds: u64,
    interval: Duration,
) -> Result<bool>
where
    S: StoreReader + StoreWriter + ?Sized,
{
    let outcome = start_switch_with(
        store,
        switch_id,
        max_wait_seconds,
        interval,
        &CancellationToken::new(),
    )
    .await?;
    Ok(outcome.is_started())
}

/// Stop a switch by deleting its run instance.
///
/// Returns `false` if the switch is not running.
///
/// # Errors
///
/// Returns an error if a store call fails.
pub async fn stop_switch<S>(store: &S, switch_id: &SwitchId) -> Result<bool>
where
    S: ResourceStore + ?Sized,
{
    let Some(run_id) = get_run_id(store, switch_id).await? else {
        tracing::debug!(switch_id = %switch_id, "Switch not running");
        return Ok(false);
    };

    store
        .delete(&Scope::Agent, ResourceKind::SwitchRun, id_selector(run_id.as_str()))
        .await?;

    tracing::info!(switch_id = %switch_id, run_id = %run_id, "Stopped switch");
    Ok(true)
}

/// Delete a switch and everything bound to it.
///
/// In order: stop the run instance if there is one, delete every domain
/// together with its bindings and bound ports, then delete the definition.
/// Networks, subnets and unbound VLAN ports are left alone.
///
/// Returns `false` if the switch is not defined.
///
/// # Errors
///
/// Returns `ControlError::CascadeAborted` if a step refuses part way, and
/// store errors as they occur. Completed steps are not undone.
pub async fn delete_switch<S>(store: &S, switch_id: &SwitchId) -> Result<bool>
where
    S: ResourceStore + ?Sized,
{
    let state = switch_state(store, switch_id).await?;
    if state == SwitchState::Undefined {
        tracing::debug!(switch_id = %switch_id, "Cannot delete undefined switch");
        return Ok(false);
    }

    validate_transition(switch_id, state, SwitchState::Undefined)?;
    let resource = format!("switch {switch_id}");

    if state != SwitchState::Defined {
        validate_transition(switch_id, state, SwitchState::Defined)?;
        if !stop_switch(store, switch_id).await? {
            return Err(ControlError::cascade(&resource, "stop instance"));
        }
    }

    let domains: Vec<Domain> = scan::list(store, &switch_scope(switch_id)).await?;
    for found in &domains {
        domain::purge_domain(store, switch_id, &found.id)
            .await
            .map_err(|e| match e {
                ControlError::CascadeAborted { step, .. } => ControlError::cascade(
                    &resource,
                    format!("delete domain {}: {step}", found.id),
                ),
                other => other,
            })?;
    }

    store
        .delete(&Scope::Agent, ResourceKind::Switch, id_selector(switch_id.as_str()))
        .await?;

    tracing::info!(
        switch_id = %switch_id,
        from = %state,
        domains = domains.len(),
        "Deleted switch"
    );
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{publish_connection, running_switch, INTERVAL};
    use vnet_store::{MemoryStore, Operation};

    #[tokio::test]
    async fn undefined_switch_queries() {
        let store = MemoryStore::new();
        let id = SwitchId::new("wrong").unwrap();

        assert!(!is_defined(&store, &id).await.unwrap());
        assert_eq!(get_run_id(&store, &id).await.unwrap(), None);
        assert!(!is_running(&store, &id).await.unwrap());
        assert_eq!(switch_state(&store, &id).await.unwrap(), SwitchState::Undefined);
        assert!(!stop_switch(&store, &id).await.unwrap());
        assert!(!delete_switch(&store, &id).await.unwrap());
        assert!(!start_switch(&store, &id, 0, INTERVAL).await.unwrap());
    }

    #[tokio::test]
    async fn add_and_find_switches() {
        let store = MemoryStore::new();
        let first = add_switch(&store, "demo").await.unwrap();
        let second = add_switch(&store, "demo").await.unwrap();
        assert_ne!(first, second);

        assert!(is_defined(&store, &first).await.unwrap());
        assert_eq!(get_switches(&store).await.unwrap().len(), 2);

        let found = get_switch_by_name(&store, "demo").await.unwrap().unwrap();
        assert_eq!(found.id, first);
        assert!(get_switch_by_name(&store, "lab").await.unwrap().is_none());
        assert_eq!(switch_state(&store, &first).await.unwrap(), SwitchState::Defined);
    }

    #[tokio::test]
    async fn start_confirms_attachment() {
        let store = MemoryStore::new();
        let id = add_switch(&store, "demo").await.unwrap();
        publish_connection(&store, &id).await;

        assert!(start_switch(&store, &id, 10, INTERVAL).await.unwrap());
        assert!(is_running(&store, &id).await.unwrap());
        assert_eq!(switch_state(&store, &id).await.unwrap(), SwitchState::Running);

        let attachment = get_networking_id(&store, &id).await.unwrap().unwrap();
        assert_eq!(attachment.tid, ResourceKind::FabricAttachment);
    }

    #[tokio::test]
    async fn start_on_running_switch_creates_no_second_run() {
        let store = MemoryStore::new();
        let id = running_switch(&store, "demo").await;

        let outcome = start_switch_with(&store, &id, 10, INTERVAL, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome, StartOutcome::AlreadyRunning);
        assert_eq!(store.count(&Scope::Agent, ResourceKind::SwitchRun), 1);
        assert_eq!(
            store.count(&switch_scope(&id), ResourceKind::FabricAttachment),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_start_keeps_run() {
        let store = MemoryStore::new();
        let id = add_switch(&store, "demo").await.unwrap();

        let outcome = start_switch_with(&store, &id, 2, INTERVAL, &CancellationToken::new())
            .await
            .unwrap();

        let StartOutcome::TimedOut { run_id } = outcome else {
            panic!("expected timeout, got {outcome:?}");
        };
        assert_eq!(get_run_id(&store, &id).await.unwrap(), Some(run_id));
        assert_eq!(switch_state(&store, &id).await.unwrap(), SwitchState::Starting);
        assert_eq!(store.calls(Operation::Set, ResourceKind::FabricAttachment), 0);

        assert!(stop_switch(&store, &id).await.unwrap());
        assert_eq!(switch_state(&store, &id).await.unwrap(), SwitchState::Defined);
    }

    #[tokio::test]
    async fn cancelled_start_reports_run() {
        let store = MemoryStore::new();
        let id = add_switch(&store, "demo").await.unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = start_switch_with(&store, &id, 10, INTERVAL, &cancel)
            .await
            .unwrap();
        assert!(matches!(outcome, StartOutcome::Cancelled { .. }));
        assert!(is_running(&store, &id).await.unwrap());
    }

    #[tokio::test]
    async fn running_matches_run_id() {
        let store = MemoryStore::new();
        let stopped = add_switch(&store, "a").await.unwrap();
        let running = running_switch(&store, "b").await;

        for id in [&stopped, &running] {
            assert_eq!(
                is_running(&store, id).await.unwrap(),
                get_run_id(&store, id).await.unwrap().is_some()
            );
        }
        assert!(!is_running(&store, &stopped).await.unwrap());
        assert!(get_networking_id(&store, &stopped).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stop_removes_run() {
        let store = MemoryStore::new();
        let id = running_switch(&store, "demo").await;

        assert!(stop_switch(&store, &id).await.unwrap());
        assert!(!is_running(&store, &id).await.unwrap());
        assert!(!stop_switch(&store, &id).await.unwrap());
        assert!(is_defined(&store, &id).await.unwrap());
    }

    #[tokio::test]
    async fn delete_stopped_switch() {
        let store = MemoryStore::new();
        let id = add_switch(&store, "demo").await.unwrap();

        assert!(delete_switch(&store, &id).await.unwrap());
        assert!(!is_defined(&store, &id).await.unwrap());
        assert!(!delete_switch(&store, &id).await.unwrap());
    }

    #[tokio::test]
    async fn delete_running_switch_stops_it_first() {
        let store = MemoryStore::new();
        let id = running_switch(&store, "demo").await;

        assert!(delete_switch(&store, &id).await.unwrap());
        assert_eq!(store.count(&Scope::Agent, ResourceKind::SwitchRun), 0);
        assert_eq!(store.count(&Scope::Agent, ResourceKind::Switch), 0);
    }

    #[tokio::test]
    async fn store_failure_aborts_delete() {
        let store = MemoryStore::new();
        let id = running_switch(&store, "demo").await;
        store.reject(Operation::Delete, ResourceKind::SwitchRun, "agent busy");

        let result = delete_switch(&store, &id).await;
        assert!(matches!(result, Err(ControlError::Store(_))));
        assert!(is_defined(&store, &id).await.unwrap());
    }
}
