//! Error types for switch control operations.
//!
//! "Not found" and "precondition not met" are not errors here: operations
//! report them as `Ok(false)` or `Ok(None)`. What remains is store failure,
//! a cascade that stopped half way, and records that do not decode.

use thiserror::Error;
use vnet_core::{IdError, ResourceKind, SwitchId};
use vnet_store::StoreError;

use crate::lifecycle::SwitchState;

/// A result type using `ControlError`.
pub type Result<T> = std::result::Result<T, ControlError>;

/// Errors that can occur in control operations.
#[derive(Debug, Error)]
pub enum ControlError {
    /// The store refused or failed a call.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A step of a multi-step delete refused after earlier steps had run.
    ///
    /// Steps already executed are not undone; re-invoking the operation
    /// continues from the remaining state.
    #[error("cascade delete of {resource} aborted at step: {step}")]
    CascadeAborted {
        /// The resource whose delete was cascading.
        resource: String,
        /// The step that refused.
        step: String,
    },

    /// A store record does not have the shape of its entity.
    #[error("malformed {kind} record {id}: {reason}")]
    Decode {
        /// Type tag of the record.
        kind: ResourceKind,
        /// Id of the record, if it had one.
        id: String,
        /// What did not match.
        reason: String,
    },

    /// An operation would move a switch along an edge the lifecycle lacks.
    #[error("switch {switch_id} cannot go from {from} to {to}")]
    InvalidState {
        /// The switch.
        switch_id: SwitchId,
        /// State observed before the operation.
        from: SwitchState,
        /// State the operation would produce.
        to: SwitchState,
    },

    /// A running switch has no fabric attachment to bind domains to.
    #[error("switch {0} is running but has no fabric attachment")]
    MissingAttachment(SwitchId),

    /// The store generated an id that is not usable.
    #[error("invalid id: {0}")]
    InvalidId(#[from] IdError),
}

impl ControlError {
    pub(crate) fn cascade(resource: impl ToString, step: impl Into<String>) -> Self {
        Self::CascadeAborted {
            resource: resource.to_string(),
            step: step.into(),
        }
    }

    /// Returns true if this error might be resolved by retrying.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        match self {
            Self::Store(e) => e.is_retriable(),
            Self::CascadeAborted { .. } => true,
            Self::Decode { .. }
            | Self::InvalidState { .. }
            | Self::MissingAttachment(_)
            | Self::InvalidId(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retriable_errors() {
        assert!(ControlError::Store(StoreError::Transport("refused".into())).is_retriable());
        assert!(!ControlError::Store(StoreError::Rejected("vlan in use".into())).is_retriable());
        assert!(ControlError::cascade("domain d-1", "delete GRE port p-1").is_retriable());
        assert!(!ControlError::InvalidId(IdError::Empty).is_retriable());
    }

    #[test]
    fn store_message_is_kept() {
        let err = ControlError::from(StoreError::Rejected(
            "192.168.32.10 is not in available subnet address range".into(),
        ));
        assert!(err.to_string().contains("192.168.32.10"));
    }

    #[test]
    fn cascade_message_names_step() {
        let err = ControlError::cascade("switch sw-1", "stop instance");
        assert_eq!(
            err.to_string(),
            "cascade delete of switch sw-1 aborted at step: stop instance"
        );
    }
}
