//! Subcommands and their dispatch onto [`VswitchControl`].

use clap::{Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::{json, Value};
use vnet_control::{
    CancellationToken, DomainId, GrePortSpec, HostNetworkRole, NetworkId, PortId, PortKind,
    SubnetId, SubnetSpec, SwitchId, VswitchControl,
};

/// Top-level command groups.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Switch definitions and runs.
    #[command(subcommand)]
    Switch(SwitchCommand),
    /// Associate networks.
    #[command(subcommand)]
    Network(NetworkCommand),
    /// Subnets of associate networks.
    #[command(subcommand)]
    Subnet(SubnetCommand),
    /// GRE and VLAN ports.
    #[command(subcommand)]
    Port(PortCommand),
    /// Domains and their port bindings.
    #[command(subcommand)]
    Domain(DomainCommand),
    /// Host-level networks and subnets.
    #[command(subcommand)]
    Host(HostCommand),
    /// The host NAT rule.
    #[command(subcommand)]
    Nat(NatCommand),
}

#[derive(Subcommand, Debug)]
pub enum SwitchCommand {
    /// List switch definitions.
    List,
    /// Show a switch by name.
    Show { name: String },
    /// Find the running switch holding a domain with this name.
    ByDomain { domain: String },
    /// Define a switch.
    Add { name: String },
    /// Stop a switch, purge its domains and delete the definition.
    Delete { id: SwitchId },
    /// Start a switch and wait for it to connect. Ctrl-C stops waiting.
    Start {
        id: SwitchId,
        /// Seconds to wait for the connection.
        #[arg(long)]
        max_wait: Option<u64>,
    },
    /// Stop a running switch.
    Stop { id: SwitchId },
    /// Show the derived state of a switch.
    State { id: SwitchId },
}

#[derive(Subcommand, Debug)]
pub enum NetworkCommand {
    /// List networks on a running switch.
    List { switch: SwitchId },
    /// Show a network by id, or by name with `--name`.
    Show {
        switch: SwitchId,
        id: String,
        #[arg(long)]
        name: bool,
    },
    /// Create a network, optionally with one subnet.
    Add {
        switch: SwitchId,
        name: String,
        /// Host interface the network is associated with.
        interface: String,
        #[arg(long)]
        cidr: Option<String>,
    },
    /// Delete a network and its subnets.
    Delete { switch: SwitchId, id: NetworkId },
}

#[derive(Subcommand, Debug)]
pub enum SubnetCommand {
    /// List subnets on a running switch.
    List { switch: SwitchId },
    /// Show a subnet by id.
    Show { switch: SwitchId, id: SubnetId },
    /// Add a subnet to a network.
    Add {
        switch: SwitchId,
        network: NetworkId,
        cidr: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        gateway: Option<String>,
        /// First address of the allocation pool (requires `--pool-end`).
        #[arg(long, requires = "pool_end")]
        pool_start: Option<String>,
        /// Last address of the allocation pool (requires `--pool-start`).
        #[arg(long, requires = "pool_start")]
        pool_end: Option<String>,
    },
    /// Delete a subnet.
    Delete { switch: SwitchId, id: SubnetId },
}

/// Port kind as given on the command line.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindArg {
    Gre,
    Vlan,
}

impl From<KindArg> for PortKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Gre => Self::Gre,
            KindArg::Vlan => Self::Vlan,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum PortCommand {
    /// List ports of one kind.
    List { switch: SwitchId, kind: KindArg },
    /// Show a port by id, or by name with `--name`.
    Show {
        switch: SwitchId,
        kind: KindArg,
        id: String,
        #[arg(long)]
        name: bool,
    },
    /// Create a GRE port on a subnet.
    AddGre {
        switch: SwitchId,
        subnet: SubnetId,
        name: String,
        #[arg(long)]
        local_ip: Option<String>,
        #[arg(long)]
        remote_ip: Option<String>,
    },
    /// Create a VLAN port on a network.
    AddVlan {
        switch: SwitchId,
        network: NetworkId,
        name: String,
        tag: u16,
    },
    /// Delete a port. Bound GRE ports are refused.
    Delete {
        switch: SwitchId,
        kind: KindArg,
        id: PortId,
    },
}

#[derive(Subcommand, Debug)]
pub enum DomainCommand {
    /// List domains on a running switch.
    List { switch: SwitchId },
    /// Show a domain by id, or by name with `--name`.
    Show {
        switch: SwitchId,
        id: String,
        #[arg(long)]
        name: bool,
    },
    /// Create a domain.
    Add { switch: SwitchId, name: String },
    /// Unbind and delete every bound port, then delete the domain.
    Delete { switch: SwitchId, id: DomainId },
    /// Bind a port to a domain.
    Bind {
        switch: SwitchId,
        domain: DomainId,
        kind: KindArg,
        port: PortId,
    },
    /// Remove a port binding.
    Unbind {
        switch: SwitchId,
        domain: DomainId,
        kind: KindArg,
        port: PortId,
    },
    /// Check whether a port is bound, to one domain or to any.
    Bound {
        switch: SwitchId,
        kind: KindArg,
        port: PortId,
        #[arg(long)]
        domain: Option<DomainId>,
    },
}

/// Host network role as given on the command line.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleArg {
    Overlay,
    Vlan,
    Tap,
}

impl From<RoleArg> for HostNetworkRole {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Overlay => Self::Overlay,
            RoleArg::Vlan => Self::Vlan,
            RoleArg::Tap => Self::Tap,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum HostCommand {
    /// Networks on the host agent.
    #[command(subcommand)]
    Network(HostNetworkCommand),
    /// Subnets of host networks.
    #[command(subcommand)]
    Subnet(HostSubnetCommand),
}

#[derive(Subcommand, Debug)]
pub enum HostNetworkCommand {
    /// List host networks.
    List,
    /// Show a host network by id, or by name with `--name`.
    Show {
        id: String,
        #[arg(long)]
        name: bool,
    },
    /// Show the host network serving a role.
    Role { role: RoleArg },
    /// Create a host network.
    Add {
        name: String,
        /// Network type understood by the host agent.
        network_type: String,
        /// Host interface the network is attached to.
        interface: String,
    },
    /// Delete a host network and its subnets, by id or by name with `--name`.
    Delete {
        id: String,
        #[arg(long)]
        name: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum HostSubnetCommand {
    /// List host subnets.
    List,
    /// Show a host subnet by id, or by name with `--name`.
    Show {
        id: String,
        #[arg(long)]
        name: bool,
    },
    /// Add a subnet to a host network.
    Add {
        network: NetworkId,
        cidr: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        gateway: Option<String>,
        #[arg(long, requires = "pool_end")]
        pool_start: Option<String>,
        #[arg(long, requires = "pool_start")]
        pool_end: Option<String>,
    },
    /// Delete a host subnet.
    Delete { id: SubnetId },
}

#[derive(Subcommand, Debug)]
pub enum NatCommand {
    /// Show the NAT rule, if any.
    Show,
    /// Create the NAT rule for a host subnet.
    Enable { interface: String, subnet: SubnetId },
    /// Delete the NAT rule.
    Disable,
}

fn to_json<T: Serialize>(value: T) -> anyhow::Result<Value> {
    Ok(serde_json::to_value(value)?)
}

fn done(ok: bool) -> Value {
    json!({ "ok": ok })
}

fn subnet_spec(
    cidr: String,
    name: Option<String>,
    gateway: Option<String>,
    pool: (Option<String>, Option<String>),
) -> SubnetSpec {
    let mut spec = SubnetSpec::new(cidr);
    if let Some(name) = name {
        spec = spec.with_name(name);
    }
    if let Some(gateway) = gateway {
        spec = spec.with_gateway(gateway);
    }
    if let (Some(start), Some(end)) = pool {
        spec = spec.with_pool(start, end);
    }
    spec
}

/// Execute a command and return its JSON result.
///
/// # Errors
///
/// Returns an error if the store fails or a cascade is aborted.
pub async fn run<C>(control: &C, command: Command) -> anyhow::Result<Value>
where
    C: VswitchControl + ?Sized,
{
    match command {
        Command::Switch(cmd) => run_switch(control, cmd).await,
        Command::Network(cmd) => run_network(control, cmd).await,
        Command::Subnet(cmd) => run_subnet(control, cmd).await,
        Command::Port(cmd) => run_port(control, cmd).await,
        Command::Domain(cmd) => run_domain(control, cmd).await,
        Command::Host(HostCommand::Network(cmd)) => run_host_network(control, cmd).await,
        Command::Host(HostCommand::Subnet(cmd)) => run_host_subnet(control, cmd).await,
        Command::Nat(cmd) => run_nat(control, cmd).await,
    }
}

async fn run_switch<C>(control: &C, command: SwitchCommand) -> anyhow::Result<Value>
where
    C: VswitchControl + ?Sized,
{
    match command {
        SwitchCommand::List => to_json(control.get_switches().await?),
        SwitchCommand::Show { name } => to_json(control.get_switch_by_name(&name).await?),
        SwitchCommand::ByDomain { domain } => {
            to_json(control.get_switch_by_domain(&domain).await?)
        }
        SwitchCommand::Add { name } => {
            let id = control.add_switch(&name).await?;
            Ok(json!({ "id": id }))
        }
        SwitchCommand::Delete { id } => Ok(done(control.delete_switch(&id).await?)),
        SwitchCommand::Start { id, max_wait } => {
            let cancel = CancellationToken::new();
            let interrupt = cancel.clone();
            let watcher = tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupted, no longer waiting for the switch");
                    interrupt.cancel();
                }
            });
            let outcome = control.start_switch_with(&id, max_wait, &cancel).await;
            watcher.abort();

            let outcome = outcome?;
            if let Some(run_id) = outcome.dangling_run() {
                tracing::warn!(
                    switch_id = %id,
                    run_id = %run_id,
                    "Switch run left in place; stop the switch to remove it"
                );
            }
            to_json(outcome)
        }
        SwitchCommand::Stop { id } => Ok(done(control.stop_switch(&id).await?)),
        SwitchCommand::State { id } => {
            let state = control.switch_state(&id).await?;
            let run_id = control.get_run_id(&id).await?;
            Ok(json!({ "id": id, "state": state, "run_id": run_id }))
        }
    }
}

async fn run_network<C>(control: &C, command: NetworkCommand) -> anyhow::Result<Value>
where
    C: VswitchControl + ?Sized,
{
    match command {
        NetworkCommand::List { switch } => to_json(control.get_networks(&switch).await?),
        NetworkCommand::Show { switch, id, name } => {
            let network = if name {
                control.get_network_by_name(&switch, &id).await?
            } else {
                control.get_network_by_id(&switch, &id.parse()?).await?
            };
            to_json(network)
        }
        NetworkCommand::Add {
            switch,
            name,
            interface,
            cidr,
        } => {
            let id = control
                .add_network(&switch, &name, &interface, cidr.as_deref())
                .await?;
            Ok(json!({ "id": id }))
        }
        NetworkCommand::Delete { switch, id } => {
            Ok(done(control.delete_network(&switch, &id).await?))
        }
    }
}

async fn run_subnet<C>(control: &C, command: SubnetCommand) -> anyhow::Result<Value>
where
    C: VswitchControl + ?Sized,
{
    match command {
        SubnetCommand::List { switch } => to_json(control.get_subnets(&switch).await?),
        SubnetCommand::Show { switch, id } => {
            to_json(control.get_subnet_by_id(&switch, &id).await?)
        }
        SubnetCommand::Add {
            switch,
            network,
            cidr,
            name,
            gateway,
            pool_start,
            pool_end,
        } => {
            let spec = subnet_spec(cidr, name, gateway, (pool_start, pool_end));
            let id = control.add_subnet_with(&switch, &network, spec).await?;
            Ok(json!({ "id": id }))
        }
        SubnetCommand::Delete { switch, id } => {
            Ok(done(control.delete_subnet(&switch, &id).await?))
        }
    }
}

async fn run_port<C>(control: &C, command: PortCommand) -> anyhow::Result<Value>
where
    C: VswitchControl + ?Sized,
{
    match command {
        PortCommand::List { switch, kind } => match kind {
            KindArg::Gre => to_json(control.get_ports_gre(&switch).await?),
            KindArg::Vlan => to_json(control.get_ports_vlan(&switch).await?),
        },
        PortCommand::Show {
            switch,
            kind,
            id,
            name,
        } => match (kind, name) {
            (KindArg::Gre, true) => to_json(control.get_port_gre_by_name(&switch, &id).await?),
            (KindArg::Gre, false) => {
                to_json(control.get_port_gre_by_id(&switch, &id.parse()?).await?)
            }
            (KindArg::Vlan, true) => to_json(control.get_port_vlan_by_name(&switch, &id).await?),
            (KindArg::Vlan, false) => {
                to_json(control.get_port_vlan_by_id(&switch, &id.parse()?).await?)
            }
        },
        PortCommand::AddGre {
            switch,
            subnet,
            name,
            local_ip,
            remote_ip,
        } => {
            let mut spec = GrePortSpec::new(name);
            if let Some(ip) = local_ip {
                spec = spec.with_local_ip(ip);
            }
            if let Some(ip) = remote_ip {
                spec = spec.with_remote_ip(ip);
            }
            let id = control.add_port_gre(&switch, &subnet, spec).await?;
            Ok(json!({ "id": id }))
        }
        PortCommand::AddVlan {
            switch,
            network,
            name,
            tag,
        } => {
            let id = control.add_port_vlan(&switch, &network, &name, tag).await?;
            Ok(json!({ "id": id }))
        }
        PortCommand::Delete { switch, kind, id } => {
            let deleted = match PortKind::from(kind) {
                PortKind::Gre => control.delete_port_gre(&switch, &id).await?,
                PortKind::Vlan => control.delete_port_vlan(&switch, &id).await?,
            };
            Ok(done(deleted))
        }
    }
}

async fn run_domain<C>(control: &C, command: DomainCommand) -> anyhow::Result<Value>
where
    C: VswitchControl + ?Sized,
{
    match command {
        DomainCommand::List { switch } => to_json(control.get_domains(&switch).await?),
        DomainCommand::Show { switch, id, name } => {
            let domain = if name {
                control.get_domain_by_name(&switch, &id).await?
            } else {
                control.get_domain_by_id(&switch, &id.parse()?).await?
            };
            to_json(domain)
        }
        DomainCommand::Add { switch, name } => {
            let id = control.add_domain(&switch, &name).await?;
            Ok(json!({ "id": id }))
        }
        DomainCommand::Delete { switch, id } => {
            Ok(done(control.delete_domain(&switch, &id).await?))
        }
        DomainCommand::Bind {
            switch,
            domain,
            kind,
            port,
        } => {
            let bound = match PortKind::from(kind) {
                PortKind::Gre => control.add_port_gre_domain(&switch, &domain, &port).await?,
                PortKind::Vlan => control.add_port_vlan_domain(&switch, &domain, &port).await?,
            };
            Ok(done(bound))
        }
        DomainCommand::Unbind {
            switch,
            domain,
            kind,
            port,
        } => {
            let removed = match PortKind::from(kind) {
                PortKind::Gre => {
                    control
                        .delete_port_gre_domain(&switch, &domain, &port)
                        .await?
                }
                PortKind::Vlan => {
                    control
                        .delete_port_vlan_domain(&switch, &domain, &port)
                        .await?
                }
            };
            Ok(done(removed))
        }
        DomainCommand::Bound {
            switch,
            kind,
            port,
            domain,
        } => {
            let bound = match (PortKind::from(kind), domain) {
                (PortKind::Gre, Some(domain)) => {
                    control.is_port_gre_domain(&switch, &domain, &port).await?
                }
                (PortKind::Vlan, Some(domain)) => {
                    control.is_port_vlan_domain(&switch, &domain, &port).await?
                }
                (PortKind::Gre, None) => control.is_port_gre_any_domain(&switch, &port).await?,
                (PortKind::Vlan, None) => control.is_port_vlan_any_domain(&switch, &port).await?,
            };
            Ok(json!({ "bound": bound }))
        }
    }
}

async fn run_host_network<C>(control: &C, command: HostNetworkCommand) -> anyhow::Result<Value>
where
    C: VswitchControl + ?Sized,
{
    match command {
        HostNetworkCommand::List => to_json(control.get_host_networks().await?),
        HostNetworkCommand::Show { id, name } => {
            let network = if name {
                control.get_host_network_by_name(&id).await?
            } else {
                control.get_host_network_by_id(&id.parse()?).await?
            };
            to_json(network)
        }
        HostNetworkCommand::Role { role } => {
            to_json(control.get_host_network_by_role(role.into()).await?)
        }
        HostNetworkCommand::Add {
            name,
            network_type,
            interface,
        } => {
            let id = control
                .add_host_network(&name, &network_type, &interface)
                .await?;
            Ok(json!({ "id": id }))
        }
        HostNetworkCommand::Delete { id, name } => {
            let deleted = if name {
                control.delete_host_network_by_name(&id).await?
            } else {
                control.delete_host_network(&id.parse()?).await?
            };
            Ok(done(deleted))
        }
    }
}

async fn run_host_subnet<C>(control: &C, command: HostSubnetCommand) -> anyhow::Result<Value>
where
    C: VswitchControl + ?Sized,
{
    match command {
        HostSubnetCommand::List => to_json(control.get_host_subnets().await?),
        HostSubnetCommand::Show { id, name } => {
            let subnet = if name {
                control.get_host_subnet_by_name(&id).await?
            } else {
                control.get_host_subnet_by_id(&id.parse()?).await?
            };
            to_json(subnet)
        }
        HostSubnetCommand::Add {
            network,
            cidr,
            name,
            gateway,
            pool_start,
            pool_end,
        } => {
            let spec = subnet_spec(cidr, name, gateway, (pool_start, pool_end));
            let id = control.add_host_subnet(&network, spec).await?;
            Ok(json!({ "id": id }))
        }
        HostSubnetCommand::Delete { id } => Ok(done(control.delete_host_subnet(&id).await?)),
    }
}

async fn run_nat<C>(control: &C, command: NatCommand) -> anyhow::Result<Value>
where
    C: VswitchControl + ?Sized,
{
    match command {
        NatCommand::Show => to_json(control.get_nat().await?),
        NatCommand::Enable { interface, subnet } => {
            let id = control.enable_nat(&interface, &subnet).await?;
            Ok(json!({ "id": id }))
        }
        NatCommand::Disable => Ok(done(control.disable_nat().await?)),
    }
}
