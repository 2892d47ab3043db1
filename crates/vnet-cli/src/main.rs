//! vnet CLI - manage virtual switches from the terminal.
//!
//! This is the entry point for the `vnetctl` binary. Every command prints
//! its result as JSON on stdout; logs go to stderr.

mod commands;

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use vnet_control::{ControlConfig, VswitchService};
use vnet_store::{HttpStore, StoreConfig};

use commands::Command;

/// vnet CLI - manage virtual switches, networks, ports and domains.
#[derive(Parser, Debug)]
#[command(name = "vnetctl")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Resource store endpoint.
    #[arg(
        long,
        env = "VNET_STORE_URL",
        default_value = "http://localhost:26265"
    )]
    store_url: String,

    /// Host whose switch agent owns the switches.
    #[arg(long, env = "VNET_HOST", default_value = "localhost")]
    host: String,

    /// Name of the switch agent service on the host.
    #[arg(long, env = "VNET_AGENT", default_value = "switch-agent")]
    agent: String,

    /// Credential presented to the store.
    #[arg(long, env = "VNET_CREDENTIAL", default_value = "anonymous")]
    credential: String,

    /// Seconds to wait for a started switch when `--max-wait` is not given.
    #[arg(long, default_value_t = 10)]
    default_max_wait: u64,

    /// Enable debug logging.
    #[arg(long, default_value = "false")]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    fn store_config(&self) -> StoreConfig {
        StoreConfig {
            base_url: self.store_url.clone(),
            host: self.host.clone(),
            agent_service: self.agent.clone(),
            credential: self.credential.clone(),
            ..StoreConfig::default()
        }
    }

    fn control_config(&self) -> ControlConfig {
        ControlConfig {
            default_max_wait_seconds: self.default_max_wait,
            ..ControlConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_filter = if args.debug {
        "info,vnet=debug"
    } else {
        "warn,vnet=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let store = HttpStore::new(args.store_config())?;
    tracing::debug!(
        store_url = %store.config().base_url,
        agent = %store.config().agent_target(),
        "Connected store client"
    );
    let control = VswitchService::new(Arc::new(store), args.control_config());

    let output = commands::run(&control, args.command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
