//! Switch control service implementation.
//!
//! This module provides the `VswitchControl` trait and the `VswitchService`
//! implementation that runs every operation against one injected store.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use vnet_core::{DomainId, NatId, NetworkId, PortId, RunId, SubnetId, SwitchId};
use vnet_store::{ResourceRef, ResourceStore};

use crate::error::Result;
use crate::host::HostNetworkRole;
use crate::lifecycle::SwitchState;
use crate::model::{Domain, GrePort, Nat, Network, PortKind, Subnet, Switch, VlanPort};
use crate::types::{ControlConfig, GrePortSpec, StartOutcome, SubnetSpec};
use crate::{domain, host, nat, network, poller, port, switch};

/// Trait defining the switch control operations.
///
/// Lookups that find nothing and operations whose preconditions do not hold
/// return `Ok(false)` or `Ok(None)`. Errors are reserved for store failures
/// and aborted cascades.
#[async_trait]
pub trait VswitchControl: Send + Sync {
    // =========================================================================
    // Switch Lifecycle
    // =========================================================================

    /// Check whether a switch definition exists.
    async fn is_defined(&self, switch_id: &SwitchId) -> Result<bool>;

    /// List every switch definition.
    async fn get_switches(&self) -> Result<Vec<Switch>>;

    /// Find the first switch with this name.
    async fn get_switch_by_name(&self, name: &str) -> Result<Option<Switch>>;

    /// Find the first running switch that has a domain with this name.
    async fn get_switch_by_domain(&self, domain_name: &str) -> Result<Option<Switch>>;

    /// Create a switch definition.
    async fn add_switch(&self, name: &str) -> Result<SwitchId>;

    /// Delete a switch, cascading through its run instance and domains.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::CascadeAborted` if a step refuses part way.
    async fn delete_switch(&self, switch_id: &SwitchId) -> Result<bool>;

    /// Start a switch, waiting up to `max_wait_seconds` for it to connect.
    ///
    /// `None` uses the configured default budget.
    async fn start_switch(
        &self,
        switch_id: &SwitchId,
        max_wait_seconds: Option<u64>,
    ) -> Result<bool>;

    /// Start a switch, reporting the detailed outcome. The wait ends early
    /// when `cancel` fires.
    async fn start_switch_with(
        &self,
        switch_id: &SwitchId,
        max_wait_seconds: Option<u64>,
        cancel: &CancellationToken,
    ) -> Result<StartOutcome>;

    /// Stop a running switch.
    async fn stop_switch(&self, switch_id: &SwitchId) -> Result<bool>;

    /// Resolve the run instance of a switch.
    async fn get_run_id(&self, switch_id: &SwitchId) -> Result<Option<RunId>>;

    /// Check whether a switch has a run instance.
    async fn is_running(&self, switch_id: &SwitchId) -> Result<bool>;

    /// Check once whether the mux reports the switch as connected.
    async fn is_connected(&self, switch_id: &SwitchId) -> Result<bool>;

    /// Resolve the fabric attachment of a running switch.
    async fn get_networking_id(&self, switch_id: &SwitchId) -> Result<Option<ResourceRef>>;

    /// Derive the lifecycle state of a switch.
    async fn switch_state(&self, switch_id: &SwitchId) -> Result<SwitchState>;

    // =========================================================================
    // Networks and Subnets
    // =========================================================================

    /// Create an associate network, optionally with one subnet.
    async fn add_network(
        &self,
        switch_id: &SwitchId,
        name: &str,
        host_interface: &str,
        cidr: Option<&str>,
    ) -> Result<Option<NetworkId>>;

    /// List networks.
    async fn get_networks(&self, switch_id: &SwitchId) -> Result<Option<Vec<Network>>>;

    /// Find a network by id.
    async fn get_network_by_id(
        &self,
        switch_id: &SwitchId,
        network_id: &NetworkId,
    ) -> Result<Option<Network>>;

    /// Find the first network with this name.
    async fn get_network_by_name(
        &self,
        switch_id: &SwitchId,
        name: &str,
    ) -> Result<Option<Network>>;

    /// Delete a network and its subnets.
    async fn delete_network(&self, switch_id: &SwitchId, network_id: &NetworkId) -> Result<bool>;

    /// Add a subnet with only a CIDR.
    async fn add_subnet(
        &self,
        switch_id: &SwitchId,
        network_id: &NetworkId,
        cidr: &str,
    ) -> Result<Option<SubnetId>>;

    /// Add a subnet with optional name, gateway and allocation pool.
    async fn add_subnet_with(
        &self,
        switch_id: &SwitchId,
        network_id: &NetworkId,
        spec: SubnetSpec,
    ) -> Result<Option<SubnetId>>;

    /// List subnets.
    async fn get_subnets(&self, switch_id: &SwitchId) -> Result<Option<Vec<Subnet>>>;

    /// Find a subnet by id.
    async fn get_subnet_by_id(
        &self,
        switch_id: &SwitchId,
        subnet_id: &SubnetId,
    ) -> Result<Option<Subnet>>;

    /// Delete a subnet.
    async fn delete_subnet(&self, switch_id: &SwitchId, subnet_id: &SubnetId) -> Result<bool>;

    // =========================================================================
    // Ports
    // =========================================================================

    /// Create a GRE port on a subnet.
    async fn add_port_gre(
        &self,
        switch_id: &SwitchId,
        subnet_id: &SubnetId,
        spec: GrePortSpec,
    ) -> Result<Option<PortId>>;

    /// Create a VLAN port on a network.
    async fn add_port_vlan(
        &self,
        switch_id: &SwitchId,
        network_id: &NetworkId,
        name: &str,
        vlan_tag: u16,
    ) -> Result<Option<PortId>>;

    /// List GRE ports.
    async fn get_ports_gre(&self, switch_id: &SwitchId) -> Result<Option<Vec<GrePort>>>;

    /// Find a GRE port by id.
    async fn get_port_gre_by_id(
        &self,
        switch_id: &SwitchId,
        port_id: &PortId,
    ) -> Result<Option<GrePort>>;

    /// Find the first GRE port with this name.
    async fn get_port_gre_by_name(
        &self,
        switch_id: &SwitchId,
        name: &str,
    ) -> Result<Option<GrePort>>;

    /// List VLAN ports.
    async fn get_ports_vlan(&self, switch_id: &SwitchId) -> Result<Option<Vec<VlanPort>>>;

    /// Find a VLAN port by id.
    async fn get_port_vlan_by_id(
        &self,
        switch_id: &SwitchId,
        port_id: &PortId,
    ) -> Result<Option<VlanPort>>;

    /// Find the first VLAN port with this name.
    async fn get_port_vlan_by_name(
        &self,
        switch_id: &SwitchId,
        name: &str,
    ) -> Result<Option<VlanPort>>;

    /// Delete a GRE port that no domain holds.
    async fn delete_port_gre(&self, switch_id: &SwitchId, port_id: &PortId) -> Result<bool>;

    /// Delete a VLAN port, bound or not.
    async fn delete_port_vlan(&self, switch_id: &SwitchId, port_id: &PortId) -> Result<bool>;

    // =========================================================================
    // Domains
    // =========================================================================

    /// Create a domain.
    async fn add_domain(&self, switch_id: &SwitchId, name: &str) -> Result<Option<DomainId>>;

    /// List domains.
    async fn get_domains(&self, switch_id: &SwitchId) -> Result<Option<Vec<Domain>>>;

    /// Find a domain by id.
    async fn get_domain_by_id(
        &self,
        switch_id: &SwitchId,
        domain_id: &DomainId,
    ) -> Result<Option<Domain>>;

    /// Find the first domain with this name.
    async fn get_domain_by_name(&self, switch_id: &SwitchId, name: &str) -> Result<Option<Domain>>;

    /// Delete a domain with its bindings and bound ports.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::CascadeAborted` if a binding or port refuses.
    async fn delete_domain(&self, switch_id: &SwitchId, domain_id: &DomainId) -> Result<bool>;

    /// Bind a GRE port to a domain.
    async fn add_port_gre_domain(
        &self,
        switch_id: &SwitchId,
        domain_id: &DomainId,
        port_id: &PortId,
    ) -> Result<bool>;

    /// Bind a VLAN port to a domain.
    async fn add_port_vlan_domain(
        &self,
        switch_id: &SwitchId,
        domain_id: &DomainId,
        port_id: &PortId,
    ) -> Result<bool>;

    /// Check whether a GRE port is bound to a domain.
    async fn is_port_gre_domain(
        &self,
        switch_id: &SwitchId,
        domain_id: &DomainId,
        port_id: &PortId,
    ) -> Result<bool>;

    /// Check whether a VLAN port is bound to a domain.
    async fn is_port_vlan_domain(
        &self,
        switch_id: &SwitchId,
        domain_id: &DomainId,
        port_id: &PortId,
    ) -> Result<bool>;

    /// Check whether a GRE port is bound to any domain.
    async fn is_port_gre_any_domain(&self, switch_id: &SwitchId, port_id: &PortId) -> Result<bool>;

    /// Check whether a VLAN port is bound to any domain.
    async fn is_port_vlan_any_domain(
        &self,
        switch_id: &SwitchId,
        port_id: &PortId,
    ) -> Result<bool>;

    /// Remove a GRE binding, keeping the port.
    async fn delete_port_gre_domain(
        &self,
        switch_id: &SwitchId,
        domain_id: &DomainId,
        port_id: &PortId,
    ) -> Result<bool>;

    /// Remove a VLAN binding, keeping the port.
    async fn delete_port_vlan_domain(
        &self,
        switch_id: &SwitchId,
        domain_id: &DomainId,
        port_id: &PortId,
    ) -> Result<bool>;

    // =========================================================================
    // Host Networking
    // =========================================================================

    /// Create a host-level network on the agent.
    async fn add_host_network(
        &self,
        name: &str,
        network_type: &str,
        host_interface: &str,
    ) -> Result<NetworkId>;

    /// Whether any host network exists.
    async fn has_host_networking(&self) -> Result<bool>;

    /// List host networks.
    async fn get_host_networks(&self) -> Result<Vec<Network>>;

    /// Find a host network by id.
    async fn get_host_network_by_id(&self, network_id: &NetworkId) -> Result<Option<Network>>;

    /// Find the first host network with this name.
    async fn get_host_network_by_name(&self, name: &str) -> Result<Option<Network>>;

    /// Find the host network serving a role.
    async fn get_host_network_by_role(&self, role: HostNetworkRole) -> Result<Option<Network>>;

    /// Delete a host network and its subnets.
    async fn delete_host_network(&self, network_id: &NetworkId) -> Result<bool>;

    /// Delete the first host network with this name.
    async fn delete_host_network_by_name(&self, name: &str) -> Result<bool>;

    /// Add a subnet to a host network.
    async fn add_host_subnet(
        &self,
        network_id: &NetworkId,
        spec: SubnetSpec,
    ) -> Result<Option<SubnetId>>;

    /// List host subnets.
    async fn get_host_subnets(&self) -> Result<Vec<Subnet>>;

    /// Find a host subnet by id.
    async fn get_host_subnet_by_id(&self, subnet_id: &SubnetId) -> Result<Option<Subnet>>;

    /// Find the first host subnet with this name.
    async fn get_host_subnet_by_name(&self, name: &str) -> Result<Option<Subnet>>;

    /// First subnet of a host network.
    async fn get_host_network_subnet(&self, network_id: &NetworkId) -> Result<Option<SubnetId>>;

    /// Delete a host subnet.
    async fn delete_host_subnet(&self, subnet_id: &SubnetId) -> Result<bool>;

    // =========================================================================
    // Host NAT
    // =========================================================================

    /// Get the host NAT rule.
    async fn get_nat(&self) -> Result<Option<Nat>>;

    /// Enable NAT for a host-level subnet.
    async fn enable_nat(&self, out_interface: &str, subnet_id: &SubnetId) -> Result<Option<NatId>>;

    /// Remove the host NAT rule.
    async fn disable_nat(&self) -> Result<bool>;
}

/// The switch control service implementation.
pub struct VswitchService<S: ResourceStore> {
    store: Arc<S>,
    config: ControlConfig,
}

impl<S: ResourceStore> VswitchService<S> {
    /// Create a new control service.
    #[must_use]
    pub fn new(store: Arc<S>, config: ControlConfig) -> Self {
        Self { store, config }
    }

    /// Create with default configuration.
    #[must_use]
    pub fn with_defaults(store: Arc<S>) -> Self {
        Self::new(store, ControlConfig::default())
    }

    /// Get a reference to the store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get the configuration.
    #[must_use]
    pub const fn config(&self) -> &ControlConfig {
        &self.config
    }

    fn budget(&self, max_wait_seconds: Option<u64>) -> u64 {
        max_wait_seconds.unwrap_or(self.config.default_max_wait_seconds)
    }
}

#[async_trait]
impl<S: ResourceStore + 'static> VswitchControl for VswitchService<S> {
    // =========================================================================
    // Switch Lifecycle
    // =========================================================================

    async fn is_defined(&self, switch_id: &SwitchId) -> Result<bool> {
        switch::is_defined(&*self.store, switch_id).await
    }

    async fn get_switches(&self) -> Result<Vec<Switch>> {
        switch::get_switches(&*self.store).await
    }

    async fn get_switch_by_name(&self, name: &str) -> Result<Option<Switch>> {
        switch::get_switch_by_name(&*self.store, name).await
    }

    async fn get_switch_by_domain(&self, domain_name: &str) -> Result<Option<Switch>> {
        switch::get_switch_by_domain(&*self.store, domain_name).await
    }

    async fn add_switch(&self, name: &str) -> Result<SwitchId> {
        switch::add_switch(&*self.store, name).await
    }

    async fn delete_switch(&self, switch_id: &SwitchId) -> Result<bool> {
        switch::delete_switch(&*self.store, switch_id).await
    }

    async fn start_switch(
        &self,
        switch_id: &SwitchId,
        max_wait_seconds: Option<u64>,
    ) -> Result<bool> {
        switch::start_switch(
            &*self.store,
            switch_id,
            self.budget(max_wait_seconds),
            self.config.poll_interval(),
        )
        .await
    }

    async fn start_switch_with(
        &self,
        switch_id: &SwitchId,
        max_wait_seconds: Option<u64>,
        cancel: &CancellationToken,
    ) -> Result<StartOutcome> {
        switch::start_switch_with(
            &*self.store,
            switch_id,
            self.budget(max_wait_seconds),
            self.config.poll_interval(),
            cancel,
        )
        .await
    }

    async fn stop_switch(&self, switch_id: &SwitchId) -> Result<bool> {
        switch::stop_switch(&*self.store, switch_id).await
    }

    async fn get_run_id(&self, switch_id: &SwitchId) -> Result<Option<RunId>> {
        switch::get_run_id(&*self.store, switch_id).await
    }

    async fn is_running(&self, switch_id: &SwitchId) -> Result<bool> {
        switch::is_running(&*self.store, switch_id).await
    }

    async fn is_connected(&self, switch_id: &SwitchId) -> Result<bool> {
        poller::is_connected(&*self.store, switch_id).await
    }

    async fn get_networking_id(&self, switch_id: &SwitchId) -> Result<Option<ResourceRef>> {
        switch::get_networking_id(&*self.store, switch_id).await
    }

    async fn switch_state(&self, switch_id: &SwitchId) -> Result<SwitchState> {
        switch::switch_state(&*self.store, switch_id).await
    }

    // =========================================================================
    // Networks and Subnets
    // =========================================================================

    async fn add_network(
        &self,
        switch_id: &SwitchId,
        name: &str,
        host_interface: &str,
        cidr: Option<&str>,
    ) -> Result<Option<NetworkId>> {
        network::add_network(&*self.store, switch_id, name, host_interface, cidr).await
    }

    async fn get_networks(&self, switch_id: &SwitchId) -> Result<Option<Vec<Network>>> {
        network::get_networks(&*self.store, switch_id).await
    }

    async fn get_network_by_id(
        &self,
        switch_id: &SwitchId,
        network_id: &NetworkId,
    ) -> Result<Option<Network>> {
        network::get_network_by_id(&*self.store, switch_id, network_id).await
    }

    async fn get_network_by_name(
        &self,
        switch_id: &SwitchId,
        name: &str,
    ) -> Result<Option<Network>> {
        network::get_network_by_name(&*self.store, switch_id, name).await
    }

    async fn delete_network(&self, switch_id: &SwitchId, network_id: &NetworkId) -> Result<bool> {
        network::delete_network(&*self.store, switch_id, network_id).await
    }

    async fn add_subnet(
        &self,
        switch_id: &SwitchId,
        network_id: &NetworkId,
        cidr: &str,
    ) -> Result<Option<SubnetId>> {
        network::add_subnet(&*self.store, switch_id, network_id, cidr).await
    }

    async fn add_subnet_with(
        &self,
        switch_id: &SwitchId,
        network_id: &NetworkId,
        spec: SubnetSpec,
    ) -> Result<Option<SubnetId>> {
        network::add_subnet_with(&*self.store, switch_id, network_id, spec).await
    }

    async fn get_subnets(&self, switch_id: &SwitchId) -> Result<Option<Vec<Subnet>>> {
        network::get_subnets(&*self.store, switch_id).await
    }

    async fn get_subnet_by_id(
        &self,
        switch_id: &SwitchId,
        subnet_id: &SubnetId,
    ) -> Result<Option<Subnet>> {
        network::get_subnet_by_id(&*self.store, switch_id, subnet_id).await
    }

    async fn delete_subnet(&self, switch_id: &SwitchId, subnet_id: &SubnetId) -> Result<bool> {
        network::delete_subnet(&*self.store, switch_id, subnet_id).await
    }

    // =========================================================================
    // Ports
    // =========================================================================

    async fn add_port_gre(
        &self,
        switch_id: &SwitchId,
        subnet_id: &SubnetId,
        spec: GrePortSpec,
    ) -> Result<Option<PortId>> {
        port::add_port_gre(&*self.store, switch_id, subnet_id, spec).await
    }

    async fn add_port_vlan(
        &self,
        switch_id: &SwitchId,
        network_id: &NetworkId,
        name: &str,
        vlan_tag: u16,
    ) -> Result<Option<PortId>> {
        port::add_port_vlan(&*self.store, switch_id, network_id, name, vlan_tag).await
    }

    async fn get_ports_gre(&self, switch_id: &SwitchId) -> Result<Option<Vec<GrePort>>> {
        port::get_ports(&*self.store, switch_id).await
    }

    async fn get_port_gre_by_id(
        &self,
        switch_id: &SwitchId,
        port_id: &PortId,
    ) -> Result<Option<GrePort>> {
        port::get_port_by_id(&*self.store, switch_id, port_id).await
    }

    async fn get_port_gre_by_name(
        &self,
        switch_id: &SwitchId,
        name: &str,
    ) -> Result<Option<GrePort>> {
        port::get_port_by_name(&*self.store, switch_id, name).await
    }

    async fn get_ports_vlan(&self, switch_id: &SwitchId) -> Result<Option<Vec<VlanPort>>> {
        port::get_ports(&*self.store, switch_id).await
    }

    async fn get_port_vlan_by_id(
        &self,
        switch_id: &SwitchId,
        port_id: &PortId,
    ) -> Result<Option<VlanPort>> {
        port::get_port_by_id(&*self.store, switch_id, port_id).await
    }

    async fn get_port_vlan_by_name(
        &self,
        switch_id: &SwitchId,
        name: &str,
    ) -> Result<Option<VlanPort>> {
        port::get_port_by_name(&*self.store, switch_id, name).await
    }

    async fn delete_port_gre(&self, switch_id: &SwitchId, port_id: &PortId) -> Result<bool> {
        port::delete_port(&*self.store, switch_id, PortKind::Gre, port_id).await
    }

    async fn delete_port_vlan(&self, switch_id: &SwitchId, port_id: &PortId) -> Result<bool> {
        port::delete_port(&*self.store, switch_id, PortKind::Vlan, port_id).await
    }

    // =========================================================================
    // Domains
    // =========================================================================

    async fn add_domain(&self, switch_id: &SwitchId, name: &str) -> Result<Option<DomainId>> {
        domain::add_domain(&*self.store, switch_id, name).await
    }

    async fn get_domains(&self, switch_id: &SwitchId) -> Result<Option<Vec<Domain>>> {
        domain::get_domains(&*self.store, switch_id).await
    }

    async fn get_domain_by_id(
        &self,
        switch_id: &SwitchId,
        domain_id: &DomainId,
    ) -> Result<Option<Domain>> {
        domain::get_domain_by_id(&*self.store, switch_id, domain_id).await
    }

    async fn get_domain_by_name(
        &self,
        switch_id: &SwitchId,
        name: &str,
    ) -> Result<Option<Domain>> {
        domain::get_domain_by_name(&*self.store, switch_id, name).await
    }

    async fn delete_domain(&self, switch_id: &SwitchId, domain_id: &DomainId) -> Result<bool> {
        domain::delete_domain(&*self.store, switch_id, domain_id).await
    }

    async fn add_port_gre_domain(
        &self,
        switch_id: &SwitchId,
        domain_id: &DomainId,
        port_id: &PortId,
    ) -> Result<bool> {
        domain::add_port_domain(&*self.store, switch_id, PortKind::Gre, domain_id, port_id).await
    }

    async fn add_port_vlan_domain(
        &self,
        switch_id: &SwitchId,
        domain_id: &DomainId,
        port_id: &PortId,
    ) -> Result<bool> {
        domain::add_port_domain(&*self.store, switch_id, PortKind::Vlan, domain_id, port_id).await
    }

    async fn is_port_gre_domain(
        &self,
        switch_id: &SwitchId,
        domain_id: &DomainId,
        port_id: &PortId,
    ) -> Result<bool> {
        domain::is_port_domain(&*self.store, switch_id, PortKind::Gre, domain_id, port_id).await
    }

    async fn is_port_vlan_domain(
        &self,
        switch_id: &SwitchId,
        domain_id: &DomainId,
        port_id: &PortId,
    ) -> Result<bool> {
        domain::is_port_domain(&*self.store, switch_id, PortKind::Vlan, domain_id, port_id).await
    }

    async fn is_port_gre_any_domain(
        &self,
        switch_id: &SwitchId,
        port_id: &PortId,
    ) -> Result<bool> {
        domain::is_port_any_domain(&*self.store, switch_id, PortKind::Gre, port_id).await
    }

    async fn is_port_vlan_any_domain(
        &self,
        switch_id: &SwitchId,
        port_id: &PortId,
    ) -> Result<bool> {
        domain::is_port_any_domain(&*self.store, switch_id, PortKind::Vlan, port_id).await
    }

    async fn delete_port_gre_domain(
        &self,
        switch_id: &SwitchId,
        domain_id: &DomainId,
        port_id: &PortId,
    ) -> Result<bool> {
        domain::delete_port_domain(&*self.store, switch_id, PortKind::Gre, domain_id, port_id)
            .await
    }

    async fn delete_port_vlan_domain(
        &self,
        switch_id: &SwitchId,
        domain_id: &DomainId,
        port_id: &PortId,
    ) -> Result<bool> {
        domain::delete_port_domain(&*self.store, switch_id, PortKind::Vlan, domain_id, port_id)
            .await
    }

    // =========================================================================
    // Host Networking
    // =========================================================================

    async fn add_host_network(
        &self,
        name: &str,
        network_type: &str,
        host_interface: &str,
    ) -> Result<NetworkId> {
        host::add_host_network(&*self.store, name, network_type, host_interface).await
    }

    async fn has_host_networking(&self) -> Result<bool> {
        host::has_host_networking(&*self.store).await
    }

    async fn get_host_networks(&self) -> Result<Vec<Network>> {
        host::get_host_networks(&*self.store).await
    }

    async fn get_host_network_by_id(&self, network_id: &NetworkId) -> Result<Option<Network>> {
        host::get_host_network_by_id(&*self.store, network_id).await
    }

    async fn get_host_network_by_name(&self, name: &str) -> Result<Option<Network>> {
        host::get_host_network_by_name(&*self.store, name).await
    }

    async fn get_host_network_by_role(&self, role: HostNetworkRole) -> Result<Option<Network>> {
        host::get_host_network_by_role(&*self.store, role).await
    }

    async fn delete_host_network(&self, network_id: &NetworkId) -> Result<bool> {
        host::delete_host_network(&*self.store, network_id).await
    }

    async fn delete_host_network_by_name(&self, name: &str) -> Result<bool> {
        host::delete_host_network_by_name(&*self.store, name).await
    }

    async fn add_host_subnet(
        &self,
        network_id: &NetworkId,
        spec: SubnetSpec,
    ) -> Result<Option<SubnetId>> {
        host::add_host_subnet(&*self.store, network_id, spec).await
    }

    async fn get_host_subnets(&self) -> Result<Vec<Subnet>> {
        host::get_host_subnets(&*self.store).await
    }

    async fn get_host_subnet_by_id(&self, subnet_id: &SubnetId) -> Result<Option<Subnet>> {
        host::get_host_subnet_by_id(&*self.store, subnet_id).await
    }

    async fn get_host_subnet_by_name(&self, name: &str) -> Result<Option<Subnet>> {
        host::get_host_subnet_by_name(&*self.store, name).await
    }

    async fn get_host_network_subnet(&self, network_id: &NetworkId) -> Result<Option<SubnetId>> {
        host::get_host_network_subnet(&*self.store, network_id).await
    }

    async fn delete_host_subnet(&self, subnet_id: &SubnetId) -> Result<bool> {
        host::delete_host_subnet(&*self.store, subnet_id).await
    }

    // =========================================================================
    // Host NAT
    // =========================================================================

    async fn get_nat(&self) -> Result<Option<Nat>> {
        nat::get_nat(&*self.store).await
    }

    async fn enable_nat(
        &self,
        out_interface: &str,
        subnet_id: &SubnetId,
    ) -> Result<Option<NatId>> {
        nat::enable_nat(&*self.store, out_interface, subnet_id).await
    }

    async fn disable_nat(&self) -> Result<bool> {
        nat::disable_nat(&*self.store).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::publish_connection;
    use vnet_store::MemoryStore;

    fn service() -> VswitchService<MemoryStore> {
        VswitchService::with_defaults(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn default_budget_comes_from_config() {
        let control = VswitchService::new(
            Arc::new(MemoryStore::new()),
            ControlConfig {
                default_max_wait_seconds: 3,
                poll_interval_ms: 10,
            },
        );
        assert_eq!(control.budget(None), 3);
        assert_eq!(control.budget(Some(0)), 0);
    }

    #[tokio::test]
    async fn gre_and_vlan_bindings_are_distinct() {
        let control = service();
        let sw = control.add_switch("demo").await.unwrap();
        publish_connection(control.store(), &sw).await;
        assert!(control.start_switch(&sw, None).await.unwrap());

        let net = control
            .add_network(&sw, "vm", "eth1", Some("192.168.30.0/24"))
            .await
            .unwrap()
            .unwrap();
        let subnet = control
            .get_network_by_id(&sw, &net)
            .await
            .unwrap()
            .unwrap()
            .subnets[0]
            .clone();
        let gre = control
            .add_port_gre(&sw, &subnet, GrePortSpec::new("gre10"))
            .await
            .unwrap()
            .unwrap();
        let domain = control.add_domain(&sw, "user1").await.unwrap().unwrap();

        assert!(control.add_port_gre_domain(&sw, &domain, &gre).await.unwrap());
        assert!(control.is_port_gre_domain(&sw, &domain, &gre).await.unwrap());
        assert!(!control.is_port_vlan_domain(&sw, &domain, &gre).await.unwrap());
        assert!(!control.is_port_vlan_any_domain(&sw, &gre).await.unwrap());
        assert!(!control.delete_port_vlan_domain(&sw, &domain, &gre).await.unwrap());
        assert!(!control.delete_port_gre(&sw, &gre).await.unwrap());
    }

    #[tokio::test]
    async fn is_running_agrees_with_run_id() {
        let control = service();
        let sw = control.add_switch("demo").await.unwrap();
        let unknown = SwitchId::new("wrong").unwrap();

        for id in [&sw, &unknown] {
            assert_eq!(
                control.is_running(id).await.unwrap(),
                control.get_run_id(id).await.unwrap().is_some()
            );
        }
    }

    #[tokio::test]
    async fn host_subnet_feeds_nat() {
        let control = service();
        let net = control
            .add_host_network("wan-network", "flat", "eth0")
            .await
            .unwrap();
        let subnet = control
            .add_host_subnet(&net, SubnetSpec::new("172.16.0.0/24").with_name("vms"))
            .await
            .unwrap()
            .unwrap();

        let wan = control
            .get_host_network_by_role(HostNetworkRole::Tap)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(wan.id, net);
        assert_eq!(
            control.get_host_network_subnet(&net).await.unwrap(),
            Some(subnet.clone())
        );

        let nat = control.enable_nat("eth0", &subnet).await.unwrap();
        assert!(nat.is_some());
        assert!(control.disable_nat().await.unwrap());
        assert!(control.delete_host_network_by_name("wan-network").await.unwrap());
        assert!(!control.has_host_networking().await.unwrap());
    }
}
