//! Error types for the storage layer.

use thiserror::Error;

/// A result type using `StoreError`.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The addressed record was not found.
    #[error("record not found")]
    NotFound,

    /// The store refused the call. Carries the store-supplied message, e.g.
    /// an endpoint address outside its subnet or a VLAN tag already in use.
    #[error("store rejected request: {0}")]
    Rejected(String),

    /// The store could not be reached.
    #[error("transport error: {0}")]
    Transport(String),

    /// A request or response body could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The call failed for a reason the store did not report.
    #[error("reason unknown")]
    Unknown,
}

impl StoreError {
    /// Returns true if this error might be resolved by retrying.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}
