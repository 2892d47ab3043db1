//! Common error types for vnet.

use thiserror::Error;

/// A result type using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors shared by every vnet crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An invalid identifier was provided.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] crate::ids::IdError),

    /// A type tag that does not name any known resource kind.
    #[error("unknown resource kind: {0}")]
    UnknownKind(String),
}
