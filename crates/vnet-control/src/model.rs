//! Typed views of the records the control layer reads back from the store.
//!
//! Records are decoded leniently: optional attributes default when absent and
//! unknown attributes are ignored, since the store adds fields of its own
//! (`ip_version`, `mac_address`, generated host interfaces).

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use vnet_core::{DomainId, NatId, NetworkId, PortId, ResourceKind, RunId, SubnetId, SwitchId};
use vnet_store::ResourceRef;

/// A store row with a known type tag.
pub trait Record: DeserializeOwned + Send {
    /// Type tag the record is stored under.
    const KIND: ResourceKind;

    /// Store-generated id.
    fn id(&self) -> &str;

    /// Human-readable name, for kinds that have one.
    fn name(&self) -> Option<&str> {
        None
    }
}

macro_rules! record {
    ($ty:ty, $kind:expr) => {
        impl Record for $ty {
            const KIND: ResourceKind = $kind;

            fn id(&self) -> &str {
                self.id.as_str()
            }
        }
    };
    ($ty:ty, $kind:expr, named) => {
        impl Record for $ty {
            const KIND: ResourceKind = $kind;

            fn id(&self) -> &str {
                self.id.as_str()
            }

            fn name(&self) -> Option<&str> {
                Some(self.name.as_str())
            }
        }
    };
}

/// A switch definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Switch {
    /// Switch id.
    pub id: SwitchId,
    /// Name given at creation. Not unique.
    #[serde(default)]
    pub name: String,
}

/// A running switch instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchRun {
    /// Run id.
    pub id: RunId,
    /// The switch definition this instance runs.
    pub configuration: ResourceRef,
}

/// An associate network of a running switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    /// Network id.
    pub id: NetworkId,
    /// Name given at creation. Not unique.
    #[serde(default)]
    pub name: String,
    /// Network type, `associate` for networks created here.
    #[serde(default)]
    pub network_type: String,
    /// Host interface the network is attached to.
    #[serde(default)]
    pub host_interface: Option<String>,
    /// Subnets owned by the network, maintained by the store.
    #[serde(default)]
    pub subnets: Vec<SubnetId>,
}

/// A range of assignable addresses within a subnet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationPool {
    /// First assignable address.
    pub start: String,
    /// Last assignable address.
    pub end: String,
}

/// A subnet, either of an associate network or host-level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subnet {
    /// Subnet id.
    pub id: SubnetId,
    /// Address range in CIDR notation.
    pub cidr: String,
    /// Owning network.
    #[serde(default)]
    pub network_id: Option<NetworkId>,
    /// Optional name.
    #[serde(default)]
    pub name: Option<String>,
    /// Gateway address, filled in by the store when not supplied.
    #[serde(default)]
    pub gateway_ip: Option<String>,
    /// Assignable ranges, filled in by the store when not supplied.
    #[serde(default)]
    pub allocation_pools: Vec<AllocationPool>,
    /// IP version reported by the store.
    #[serde(default)]
    pub ip_version: Option<u8>,
}

/// A domain grouping ports of one switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    /// Domain id.
    pub id: DomainId,
    /// Name given at creation. Not unique.
    #[serde(default)]
    pub name: String,
    /// The fabric attachment the domain belongs to.
    #[serde(default)]
    pub vswitch: Option<ResourceRef>,
}

/// A GRE tunnel endpoint address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Endpoint address. The store reports unset endpoints as `{}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
}

/// A GRE port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrePort {
    /// Port id.
    pub id: PortId,
    /// Name given at creation. Not unique.
    #[serde(default)]
    pub name: String,
    /// Subnet the local endpoint is drawn from.
    pub local_subnet: SubnetId,
    /// Local tunnel endpoint.
    #[serde(default)]
    pub local_endpoint: Option<Endpoint>,
    /// Remote tunnel endpoint.
    #[serde(default)]
    pub remote_endpoint: Option<Endpoint>,
    /// Whether GRE checksums are sent.
    #[serde(default)]
    pub checksum_present: bool,
    /// Whether GRE sequence numbers are sent.
    #[serde(default)]
    pub seq_num_present: bool,
    /// MAC address assigned by the store.
    #[serde(default)]
    pub mac_address: Option<String>,
}

/// A VLAN (raw) port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VlanPort {
    /// Port id.
    pub id: PortId,
    /// Name given at creation. Not unique.
    #[serde(default)]
    pub name: String,
    /// Network the port attaches to.
    pub network_id: NetworkId,
    /// VLAN tags carried by the port.
    #[serde(default, alias = "vlan_id")]
    pub vlan_ids: Vec<u16>,
    /// Host sub-interface created for the port.
    #[serde(default)]
    pub host_interface: Option<String>,
    /// MAC address assigned by the store.
    #[serde(default)]
    pub mac_address: Option<String>,
}

/// Which port type tag an operation addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortKind {
    /// `networking.port.gre`
    Gre,
    /// `networking.port.raw`
    Vlan,
}

impl PortKind {
    /// Type tag of ports of this kind.
    #[must_use]
    pub const fn resource_kind(self) -> ResourceKind {
        match self {
            Self::Gre => ResourceKind::GrePort,
            Self::Vlan => ResourceKind::VlanPort,
        }
    }

    /// Map a type tag back to a port kind.
    #[must_use]
    pub const fn from_resource_kind(kind: ResourceKind) -> Option<Self> {
        match kind {
            ResourceKind::GrePort => Some(Self::Gre),
            ResourceKind::VlanPort => Some(Self::Vlan),
            _ => None,
        }
    }
}

impl std::fmt::Display for PortKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gre => f.write_str("GRE"),
            Self::Vlan => f.write_str("VLAN"),
        }
    }
}

/// A port of either kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Port {
    /// GRE port.
    Gre(GrePort),
    /// VLAN port.
    Vlan(VlanPort),
}

impl Port {
    /// Port id.
    #[must_use]
    pub const fn id(&self) -> &PortId {
        match self {
            Self::Gre(port) => &port.id,
            Self::Vlan(port) => &port.id,
        }
    }

    /// Port name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Gre(port) => &port.name,
            Self::Vlan(port) => &port.name,
        }
    }

    /// Port kind.
    #[must_use]
    pub const fn kind(&self) -> PortKind {
        match self {
            Self::Gre(_) => PortKind::Gre,
            Self::Vlan(_) => PortKind::Vlan,
        }
    }
}

impl From<GrePort> for Port {
    fn from(port: GrePort) -> Self {
        Self::Gre(port)
    }
}

impl From<VlanPort> for Port {
    fn from(port: VlanPort) -> Self {
        Self::Vlan(port)
    }
}

/// A domain/port association.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainPortBinding {
    /// Bound domain.
    pub domain: ResourceRef,
    /// Bound port, GRE or VLAN by its type tag.
    pub port: ResourceRef,
}

impl DomainPortBinding {
    /// Create a binding value.
    #[must_use]
    pub fn new(domain: &DomainId, kind: PortKind, port: &PortId) -> Self {
        Self {
            domain: ResourceRef::new(ResourceKind::Domain, domain.as_str()),
            port: ResourceRef::new(kind.resource_kind(), port.as_str()),
        }
    }

    /// Kind of the bound port, if the reference is a port at all.
    #[must_use]
    pub const fn port_kind(&self) -> Option<PortKind> {
        PortKind::from_resource_kind(self.port.tid)
    }

    /// Whether the binding joins exactly this domain and port.
    #[must_use]
    pub fn joins(&self, domain: &DomainId, kind: PortKind, port: &PortId) -> bool {
        self.domain.id == domain.as_str() && self.binds_port(kind, port)
    }

    /// Whether the binding holds this port, in any domain.
    #[must_use]
    pub fn binds_port(&self, kind: PortKind, port: &PortId) -> bool {
        self.port_kind() == Some(kind) && self.port.id == port.as_str()
    }
}

impl Record for DomainPortBinding {
    const KIND: ResourceKind = ResourceKind::DomainPort;

    fn id(&self) -> &str {
        &self.port.id
    }
}

/// The host NAT rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nat {
    /// Rule id.
    pub id: NatId,
    /// Interface traffic is masqueraded out of.
    pub out_interface: String,
    /// Host-level subnet whose traffic is translated.
    pub subnet_id: SubnetId,
}

record!(Switch, ResourceKind::Switch, named);
record!(SwitchRun, ResourceKind::SwitchRun);
record!(Network, ResourceKind::Network, named);
record!(Subnet, ResourceKind::Subnet);
record!(Domain, ResourceKind::Domain, named);
record!(GrePort, ResourceKind::GrePort, named);
record!(VlanPort, ResourceKind::VlanPort, named);
record!(Nat, ResourceKind::HostNat);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn gre_port_with_empty_remote_endpoint() {
        let port: GrePort = serde_json::from_value(json!({
            "id": "f1739786",
            "name": "gre10",
            "local_subnet": "e67d8e96",
            "checksum_present": false,
            "local_endpoint": { "ip_address": "192.168.30.10" },
            "seq_num_present": false,
            "mac_address": "3a:26:2d:9c:84:4a",
            "remote_endpoint": {}
        }))
        .unwrap();

        assert_eq!(
            port.local_endpoint.and_then(|e| e.ip_address).as_deref(),
            Some("192.168.30.10")
        );
        assert_eq!(port.remote_endpoint, Some(Endpoint::default()));
    }

    #[test]
    fn vlan_port_accepts_singular_tag_field() {
        let port: VlanPort = serde_json::from_value(json!({
            "id": "45233226",
            "name": "vlan666",
            "network_id": "33b97119",
            "host_interface": "eth1.666",
            "vlan_id": [666]
        }))
        .unwrap();
        assert_eq!(port.vlan_ids, vec![666]);
    }

    #[test]
    fn subnet_store_defaults() {
        let subnet: Subnet = serde_json::from_value(json!({
            "id": "c4e3dfcd",
            "network_id": "cce575af",
            "ip_version": 4,
            "allocation_pools": [{ "start": "192.168.30.2", "end": "192.168.30.254" }],
            "gateway_ip": "192.168.30.1",
            "cidr": "192.168.30.0/24"
        }))
        .unwrap();
        assert_eq!(subnet.allocation_pools.len(), 1);
        assert_eq!(subnet.gateway_ip.as_deref(), Some("192.168.30.1"));
        assert!(subnet.name.is_none());
    }

    #[test]
    fn binding_matches_by_port_tag() {
        let domain = DomainId::new("d-1").unwrap();
        let port = PortId::new("p-1").unwrap();
        let binding = DomainPortBinding::new(&domain, PortKind::Gre, &port);

        assert!(binding.joins(&domain, PortKind::Gre, &port));
        assert!(!binding.joins(&domain, PortKind::Vlan, &port));
        assert!(binding.binds_port(PortKind::Gre, &port));
        assert_eq!(binding.port_kind(), Some(PortKind::Gre));
    }

    #[test]
    fn port_kind_tags() {
        assert_eq!(PortKind::Gre.resource_kind().tag(), "networking.port.gre");
        assert_eq!(PortKind::Vlan.resource_kind().tag(), "networking.port.raw");
        assert_eq!(PortKind::from_resource_kind(ResourceKind::Domain), None);
    }
}
