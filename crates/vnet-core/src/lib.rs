//! Core types for vnet.
//!
//! This crate provides the foundational types shared by the store adapters and
//! the switch control layer:
//!
//! - **Identifiers**: strongly-typed wrappers around the opaque ids the resource
//!   store hands out for switches, runs, networks, subnets, domains and ports
//! - **Resource kinds**: the type tags every store call is keyed by
//! - **Error types**: parse errors shared across crates
//!
//! # Example
//!
//! ```
//! use vnet_core::{ResourceKind, SwitchId};
//!
//! let switch_id: SwitchId = "7ee373eb-8aa7-4a24-8c76-c4fa52022624".parse().unwrap();
//! assert_eq!(switch_id.as_str(), "7ee373eb-8aa7-4a24-8c76-c4fa52022624");
//!
//! let kind: ResourceKind = "networking.port.gre".parse().unwrap();
//! assert_eq!(kind, ResourceKind::GrePort);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod ids;
pub mod kind;

pub use error::{CoreError, Result};
pub use ids::{DomainId, IdError, NatId, NetworkId, PortId, RunId, SubnetId, SwitchId};
pub use kind::ResourceKind;
