//! Request, option and outcome types for control operations.
//!
//! Request bodies are serialized straight into `set` field maps, so optional
//! attributes are skipped rather than sent as `null`.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use vnet_core::{NetworkId, RunId, SubnetId};
use vnet_store::ResourceRef;

use crate::model::{AllocationPool, Endpoint};

/// Network type of every network created by this crate.
pub const ASSOCIATE_NETWORK: &str = "associate";

/// Configuration for the control service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Connection wait budget used when a start does not name one (seconds).
    #[serde(default = "ControlConfig::default_max_wait_seconds")]
    pub default_max_wait_seconds: u64,
    /// Pause between connection checks (milliseconds).
    #[serde(default = "ControlConfig::default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            default_max_wait_seconds: Self::default_max_wait_seconds(),
            poll_interval_ms: Self::default_poll_interval_ms(),
        }
    }
}

impl ControlConfig {
    const fn default_max_wait_seconds() -> u64 {
        10
    }

    const fn default_poll_interval_ms() -> u64 {
        1000
    }

    /// Get the poll interval as a Duration.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Result of waiting for a switch to connect to the mux.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// A connection named after the switch was observed.
    Connected,
    /// The check budget ran out.
    TimedOut,
    /// The caller cancelled the wait.
    Cancelled,
}

/// Result of starting a switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StartOutcome {
    /// The switch connected and its fabric attachment was confirmed.
    Started,
    /// No switch definition has this id.
    NotDefined,
    /// The switch already has a run instance.
    AlreadyRunning,
    /// The run instance was created but the switch never connected.
    ///
    /// The instance is left in place; stop the switch to remove it.
    TimedOut {
        /// The instance that was created.
        run_id: RunId,
    },
    /// The wait was cancelled after the run instance was created.
    Cancelled {
        /// The instance that was created.
        run_id: RunId,
    },
}

impl StartOutcome {
    /// Whether the switch is up and attached.
    #[must_use]
    pub const fn is_started(&self) -> bool {
        matches!(self, Self::Started)
    }

    /// The run instance left behind by an incomplete start.
    #[must_use]
    pub const fn dangling_run(&self) -> Option<&RunId> {
        match self {
            Self::TimedOut { run_id } | Self::Cancelled { run_id } => Some(run_id),
            Self::Started | Self::NotDefined | Self::AlreadyRunning => None,
        }
    }
}

/// Options for creating a subnet.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SubnetSpec {
    /// Address range in CIDR notation.
    pub cidr: String,
    /// Optional name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Gateway address. The store picks one when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_ip: Option<String>,
    /// Assignable range. The store uses the whole subnet when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allocation_pool: Option<AllocationPool>,
}

impl SubnetSpec {
    /// Create a spec with only a CIDR.
    #[must_use]
    pub fn new(cidr: impl Into<String>) -> Self {
        Self {
            cidr: cidr.into(),
            ..Self::default()
        }
    }

    /// Set the name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the gateway address.
    #[must_use]
    pub fn with_gateway(mut self, gateway_ip: impl Into<String>) -> Self {
        self.gateway_ip = Some(gateway_ip.into());
        self
    }

    /// Set the allocation pool.
    #[must_use]
    pub fn with_pool(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.allocation_pool = Some(AllocationPool {
            start: start.into(),
            end: end.into(),
        });
        self
    }

    pub(crate) fn into_request(self, network_id: &NetworkId) -> CreateSubnetRequest {
        CreateSubnetRequest {
            network_id: network_id.clone(),
            cidr: self.cidr,
            name: self.name,
            gateway_ip: self.gateway_ip,
            allocation_pools: self.allocation_pool.map(|pool| vec![pool]),
        }
    }
}

/// Options for creating a GRE port.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GrePortSpec {
    /// Port name.
    pub name: String,
    /// Local tunnel address, drawn from the port's subnet.
    #[serde(default)]
    pub local_ip: Option<String>,
    /// Remote tunnel address.
    #[serde(default)]
    pub remote_ip: Option<String>,
    /// Send GRE checksums.
    #[serde(default)]
    pub checksum: bool,
    /// Send GRE sequence numbers.
    #[serde(default)]
    pub seq_num: bool,
}

impl GrePortSpec {
    /// Create a spec with no endpoints and both header options off.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the local endpoint address.
    #[must_use]
    pub fn with_local_ip(mut self, ip: impl Into<String>) -> Self {
        self.local_ip = Some(ip.into());
        self
    }

    /// Set the remote endpoint address.
    #[must_use]
    pub fn with_remote_ip(mut self, ip: impl Into<String>) -> Self {
        self.remote_ip = Some(ip.into());
        self
    }

    /// Enable GRE checksums.
    #[must_use]
    pub const fn with_checksum(mut self, enabled: bool) -> Self {
        self.checksum = enabled;
        self
    }

    /// Enable GRE sequence numbers.
    #[must_use]
    pub const fn with_seq_num(mut self, enabled: bool) -> Self {
        self.seq_num = enabled;
        self
    }

    pub(crate) fn into_request(self, subnet_id: &SubnetId) -> CreateGrePortRequest {
        // An unset endpoint is left out of the request. The agent also accepts
        // `"local_endpoint": {}` in its place; map `None` to
        // `Some(Endpoint::default())` if a store insists on the key.
        let endpoint = |ip: Option<String>| ip.map(|ip| Endpoint { ip_address: Some(ip) });
        CreateGrePortRequest {
            name: self.name,
            local_subnet: subnet_id.clone(),
            local_endpoint: endpoint(self.local_ip),
            remote_endpoint: endpoint(self.remote_ip),
            checksum_present: self.checksum,
            seq_num_present: self.seq_num,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateSwitchRequest<'a> {
    pub name: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateRunRequest {
    pub configuration: ResourceRef,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateNetworkRequest<'a> {
    pub network_type: &'a str,
    pub name: &'a str,
    pub host_interface: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateSubnetRequest {
    pub network_id: NetworkId,
    pub cidr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allocation_pools: Option<Vec<AllocationPool>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateDomainRequest<'a> {
    pub name: &'a str,
    pub vswitch: ResourceRef,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateGrePortRequest {
    pub name: String,
    pub local_subnet: SubnetId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_endpoint: Option<Endpoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_endpoint: Option<Endpoint>,
    pub checksum_present: bool,
    pub seq_num_present: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateVlanPortRequest<'a> {
    pub name: &'a str,
    pub network_id: &'a NetworkId,
    pub vlan_ids: [u16; 1],
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateNatRequest<'a> {
    pub out_interface: &'a str,
    pub subnet_id: &'a SubnetId,
}
