//! wgsync - Main Entry Point
//!
//! `wgsync server <config-path>` runs the registry;
//! `wgsync client <server-address> [interface-name]` runs the node agent.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use wgsync_agent::{
    Agent, AgentConfig, InMemoryTunnel, Reconciler, RegistryClient, SystemdTunnel, TunnelControl,
};
use wgsync_registry::RegistryConfig;

/// Keep a WireGuard mesh in sync with a central registry
#[derive(Parser)]
#[command(name = "wgsync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the heartbeat protocol from the registry store
    Server {
        /// Registry configuration file (TOML)
        config: PathBuf,
    },

    /// Converge this node's tunnel with the registry
    Client(ClientArgs),
}

#[derive(Args)]
struct ClientArgs {
    /// Registry address (host:port)
    server: String,

    /// NIC whose hardware address identifies this node
    interface: Option<String>,

    /// Tunnel interface to manage
    #[arg(long, env = "WGSYNC_TUNNEL", default_value = wgsync_common::DEFAULT_TUNNEL_NAME)]
    tunnel: String,

    /// Directory holding the tunnel configuration file
    #[arg(long, env = "WGSYNC_CONFIG_DIR", default_value = "/etc/wireguard")]
    config_dir: PathBuf,

    /// Seconds between heartbeats
    #[arg(long, env = "WGSYNC_INTERVAL", default_value_t = 10)]
    interval: u64,

    /// Port announced for this node's endpoint
    #[arg(long, env = "WGSYNC_ANNOUNCE_PORT", default_value_t = wgsync_common::DEFAULT_ANNOUNCE_PORT)]
    announce_port: u16,

    /// Write the configuration but only log service actions
    #[arg(long)]
    dry_run: bool,
}

impl ClientArgs {
    fn agent_config(&self) -> anyhow::Result<AgentConfig> {
        if self.interval == 0 {
            anyhow::bail!("--interval must be at least 1 second");
        }
        Ok(AgentConfig {
            server_addr: self.server.clone(),
            nic: self.interface.clone().filter(|nic| !nic.is_empty()),
            tunnel: self.tunnel.clone(),
            config_dir: self.config_dir.clone(),
            heartbeat_interval: Duration::from_secs(self.interval),
            announce_port: self.announce_port,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    if cli.log_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }

    info!("wgsync v{}", wgsync_common::VERSION);

    match cli.command {
        Commands::Server { config } => {
            let config = RegistryConfig::load(&config)?;
            wgsync_registry::serve(config).await?;
        }
        Commands::Client(args) => {
            let config = args.agent_config()?;
            let tunnel: Arc<dyn TunnelControl> = if args.dry_run {
                info!("Dry run: service actions are logged only");
                Arc::new(InMemoryTunnel::new())
            } else {
                Arc::new(SystemdTunnel::new())
            };

            let client = RegistryClient::connect_lazy(&config)?;
            let reconciler = Arc::new(Reconciler::new(&config, tunnel));
            Agent::new(config, client, reconciler).run().await?;
        }
    }

    Ok(())
}
