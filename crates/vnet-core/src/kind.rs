//! Resource kinds and their store type tags.
//!
//! Every store primitive is keyed by a type tag string (`tid` on the wire).
//! [`ResourceKind`] is the closed set of tags this workspace reads or writes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// A type tag understood by the resource store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Switch definition.
    #[serde(rename = "compute.vswitch")]
    Switch,
    /// Running switch instance; its `configuration` points at a definition.
    #[serde(rename = "compute.server")]
    SwitchRun,
    /// Attachment of a running switch to the switching fabric. Domains
    /// reference it as their `vswitch`.
    #[serde(rename = "networking.vswitch")]
    FabricAttachment,
    /// Mux connection, named after the switch id.
    #[serde(rename = "connection")]
    Connection,
    /// Associate network.
    #[serde(rename = "networking.network")]
    Network,
    /// Subnet belonging to a network.
    #[serde(rename = "networking.subnet")]
    Subnet,
    /// Domain of ports on a switch.
    #[serde(rename = "networking.vswitch.domain")]
    Domain,
    /// Domain/port binding.
    #[serde(rename = "networking.vswitch.domain.ports")]
    DomainPort,
    /// GRE tunnel port.
    #[serde(rename = "networking.port.gre")]
    GrePort,
    /// Raw (VLAN) port.
    #[serde(rename = "networking.port.raw")]
    VlanPort,
    /// Host NAT rule.
    #[serde(rename = "host.nat")]
    HostNat,
}

impl ResourceKind {
    /// All kinds, in declaration order.
    pub const ALL: [Self; 11] = [
        Self::Switch,
        Self::SwitchRun,
        Self::FabricAttachment,
        Self::Connection,
        Self::Network,
        Self::Subnet,
        Self::Domain,
        Self::DomainPort,
        Self::GrePort,
        Self::VlanPort,
        Self::HostNat,
    ];

    /// The wire type tag.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Switch => "compute.vswitch",
            Self::SwitchRun => "compute.server",
            Self::FabricAttachment => "networking.vswitch",
            Self::Connection => "connection",
            Self::Network => "networking.network",
            Self::Subnet => "networking.subnet",
            Self::Domain => "networking.vswitch.domain",
            Self::DomainPort => "networking.vswitch.domain.ports",
            Self::GrePort => "networking.port.gre",
            Self::VlanPort => "networking.port.raw",
            Self::HostNat => "host.nat",
        }
    }

    /// Returns true for kinds the store keeps at most one of per scope.
    ///
    /// A `set` on such a kind without an id updates the existing row instead
    /// of creating a second one.
    #[must_use]
    pub const fn is_singleton(self) -> bool {
        matches!(self, Self::FabricAttachment)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for ResourceKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.tag() == s)
            .ok_or_else(|| CoreError::UnknownKind(s.to_string()))
    }
}
