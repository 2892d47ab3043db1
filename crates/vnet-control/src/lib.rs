//! Switch, network, port and domain lifecycle management for vnet.
//!
//! Every resource this crate manages lives in a remote resource tree that has
//! no schema, no foreign keys and no transactions. This crate is where the
//! rules the store cannot check are enforced: creation and deletion order,
//! membership guards, and the wait for a started switch to connect.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       VswitchService                        │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!       ┌──────────────┬────────┴───────┬──────────────┐
//!       ▼              ▼                ▼              ▼
//!  ┌─────────┐   ┌───────────┐    ┌──────────┐   ┌─────────┐
//!  │ switch  │◀──│  network  │    │  domain  │──▶│  port   │
//!  │(poller) │   │ (subnets) │    │(bindings)│◀──│(GRE/VLAN│
//!  └─────────┘   └───────────┘    └──────────┘   └─────────┘
//!       │                               ▲
//!       └──────── delete cascade ───────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │            ResourceStore (walk / get / set / delete)        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The component modules are stateless free functions over a borrowed store;
//! [`VswitchService`] bundles them behind the [`VswitchControl`] trait.
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//! use vnet_control::{VswitchControl, VswitchService};
//! use vnet_store::MemoryStore;
//!
//! # async fn example() -> vnet_control::Result<()> {
//! let control = VswitchService::with_defaults(Arc::new(MemoryStore::new()));
//!
//! let switch_id = control.add_switch("demo").await?;
//! assert!(control.is_defined(&switch_id).await?);
//!
//! // Not running yet, so there are no networks to list.
//! assert!(control.get_networks(&switch_id).await?.is_none());
//! # Ok(())
//! # }
//! ```
//!
//! # Return conventions
//!
//! - a missing resource or unmet precondition is `Ok(false)` / `Ok(None)`
//! - a store failure is `ControlError::Store`, carrying the store's message
//! - a refusal part way through a cascade is `ControlError::CascadeAborted`

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod domain;
pub mod error;
pub mod host;
pub mod lifecycle;
pub mod model;
pub mod nat;
pub mod network;
pub mod poller;
pub mod port;
mod scan;
pub mod service;
pub mod switch;
pub mod types;

#[cfg(test)]
mod testing;

pub use error::{ControlError, Result};
pub use host::HostNetworkRole;
pub use lifecycle::SwitchState;
pub use model::{
    AllocationPool, Domain, DomainPortBinding, Endpoint, GrePort, Nat, Network, Port, PortKind,
    Record, Subnet, Switch, SwitchRun, VlanPort,
};
pub use service::{VswitchControl, VswitchService};
pub use types::{ControlConfig, GrePortSpec, PollOutcome, StartOutcome, SubnetSpec};

// Re-export commonly used types from dependencies for convenience
pub use tokio_util::sync::CancellationToken;
pub use vnet_core::{DomainId, NatId, NetworkId, PortId, RunId, SubnetId, SwitchId};
pub use vnet_store::ResourceRef;
