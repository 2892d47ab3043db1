//! Readiness polling for a starting switch.
//!
//! A switch counts as connected once the mux publishes a `connection` row
//! named after the switch id. Starting a switch waits for that row with a
//! bounded number of checks.
//!
//! The loop checks, sleeps one interval, and gives up once the number of
//! sleeps exceeds the budget. A budget of `n` therefore makes `n + 1`
//! checks and sleeps after the last one as well, so a timed-out wait lasts
//! `n + 1` intervals.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use vnet_core::{ResourceKind, SwitchId};
use vnet_store::{Scope, StoreReader};

use crate::error::Result;
use crate::types::PollOutcome;

/// Check once whether the mux reports a connection for this switch.
///
/// # Errors
///
/// Returns an error if the mux cannot be walked.
pub async fn is_connected<S>(store: &S, switch_id: &SwitchId) -> Result<bool>
where
    S: StoreReader + ?Sized,
{
    let connections = store.walk(&Scope::Mux, ResourceKind::Connection).await?;
    Ok(connections
        .iter()
        .any(|c| c.str_field("name") == Some(switch_id.as_str())))
}

/// Wait until the switch connects, the budget runs out, or `cancel` fires.
///
/// # Errors
///
/// Returns an error if a check fails. Store failures end the wait; they are
/// not retried.
pub async fn wait_connected<S>(
    store: &S,
    switch_id: &SwitchId,
    max_wait_seconds: u64,
    interval: Duration,
    cancel: &CancellationToken,
) -> Result<PollOutcome>
where
    S: StoreReader + ?Sized,
{
    let mut slept: u64 = 0;

    loop {
        if cancel.is_cancelled() {
            return Ok(PollOutcome::Cancelled);
        }

        if is_connected(store, switch_id).await? {
            tracing::debug!(switch_id = %switch_id, checks = slept + 1, "Switch connected");
            return Ok(PollOutcome::Connected);
        }

        tokio::select! {
            () = cancel.cancelled() => {
                tracing::debug!(switch_id = %switch_id, "Connection wait cancelled");
                return Ok(PollOutcome::Cancelled);
            }
            () = tokio::time::sleep(interval) => {}
        }

        slept += 1;
        if slept > max_wait_seconds {
            return Ok(PollOutcome::TimedOut);
        }
        tracing::debug!(switch_id = %switch_id, checks = slept, "Waiting for switch connection");
    }
}
