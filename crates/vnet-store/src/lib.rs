//! Resource store access for vnet.
//!
//! The switch control layer never owns state: every switch, network, port and
//! binding lives in a remote, schemaless resource tree reached through four
//! primitives. This crate defines those primitives as capability traits and
//! ships two implementations:
//!
//! - [`MemoryStore`]: in-process tree used by tests and dry runs, with fault
//!   injection and call counters
//! - [`HttpStore`]: JSON-over-HTTP adapter forwarding each primitive to the
//!   host agent
//!
//! # Capabilities
//!
//! | Trait | Primitive |
//! |---|---|
//! | [`StoreReader`] | `walk`, `get` |
//! | [`StoreWriter`] | `set` |
//! | [`StoreDeleter`] | `delete` |
//!
//! [`ResourceStore`] is implemented for every type that has all three.
//!
//! # Example
//!
//! ```
//! use vnet_core::ResourceKind;
//! use vnet_store::{MemoryStore, Scope, StoreReader, StoreWriter, to_fields};
//!
//! # async fn example() -> vnet_store::Result<()> {
//! let store = MemoryStore::new();
//! let created = store
//!     .set(
//!         &Scope::Agent,
//!         ResourceKind::Switch,
//!         to_fields(&serde_json::json!({ "name": "demo" }))?,
//!     )
//!     .await?;
//!
//! let switches = store.walk(&Scope::Agent, ResourceKind::Switch).await?;
//! assert_eq!(switches[0].id, created.id);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod http;
pub mod memory;
pub mod types;

pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use http::HttpStore;
pub use memory::{MemoryStore, Operation};
pub use types::{id_selector, to_fields, Fields, Resource, ResourceRef, Scope};

use async_trait::async_trait;
use vnet_core::ResourceKind;

/// Read access to the resource tree.
#[async_trait]
pub trait StoreReader: Send + Sync {
    /// List every child of `kind` under `scope`, in store enumeration order.
    ///
    /// # Errors
    ///
    /// Returns an error if the store call fails.
    async fn walk(&self, scope: &Scope, kind: ResourceKind) -> Result<Vec<Resource>>;

    /// Fetch a single row by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the store call fails. A missing row is `Ok(None)`.
    async fn get(&self, scope: &Scope, kind: ResourceKind, id: &str) -> Result<Option<Resource>>;
}

/// Create/update access to the resource tree.
#[async_trait]
pub trait StoreWriter: Send + Sync {
    /// Create a row, or update one when `fields` carries an `id`.
    ///
    /// Returns the stored row including its generated id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Rejected` with the store's message when the store
    /// refuses the row.
    async fn set(&self, scope: &Scope, kind: ResourceKind, fields: Fields) -> Result<Resource>;
}

/// Delete access to the resource tree.
#[async_trait]
pub trait StoreDeleter: Send + Sync {
    /// Delete the rows of `kind` matching `selector`.
    ///
    /// Most rows are selected by `id`; bindings are selected by their
    /// `domain` and `port` references.
    ///
    /// # Errors
    ///
    /// Returns an error if the store call fails or nothing matched.
    async fn delete(&self, scope: &Scope, kind: ResourceKind, selector: Fields) -> Result<()>;
}

/// Full access to the resource tree.
pub trait ResourceStore: StoreReader + StoreWriter + StoreDeleter {}

impl<T> ResourceStore for T where T: StoreReader + StoreWriter + StoreDeleter + ?Sized {}
