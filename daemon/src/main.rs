//! Plaudit daemon: entry point for running the endorsement service.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use plaudit_node::{init_logging, NodeConfig, PlauditNode};
use plaudit_rpc::{build_router, RpcServer, RpcState};
use plaudit_verification::OrcidVerifier;

#[derive(Parser, Debug)]
#[command(name = "plaudit-daemon", about = "Plaudit endorsement service")]
struct Cli {
    /// Path to a TOML configuration file. File settings are the base;
    /// flags and environment variables override them.
    #[arg(long, env = "PLAUDIT_CONFIG")]
    config: Option<PathBuf>,

    /// Address the HTTP API listens on, e.g. "0.0.0.0:8787".
    #[arg(long, env = "PLAUDIT_LISTEN_ADDR")]
    listen_addr: Option<String>,

    /// Directory holding the LMDB environment.
    #[arg(long, env = "PLAUDIT_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Origin allowed by CORS.
    #[arg(long, env = "ALLOWED_ORIGIN")]
    allowed_origin: Option<String>,

    #[arg(long, env = "ORCID_CLIENT_ID")]
    orcid_client_id: Option<String>,

    #[arg(long, env = "ORCID_CLIENT_SECRET", hide_env_values = true)]
    orcid_client_secret: Option<String>,

    /// Revoke a session after its first endorsement.
    #[arg(long, env = "PLAUDIT_SINGLE_USE_SESSIONS")]
    single_use_sessions: bool,

    /// Serve Prometheus metrics at /metrics.
    #[arg(long, env = "PLAUDIT_ENABLE_METRICS")]
    metrics: bool,

    /// "human" or "json".
    #[arg(long, env = "PLAUDIT_LOG_FORMAT")]
    log_format: Option<String>,

    /// "trace", "debug", "info", "warn" or "error".
    #[arg(long, env = "PLAUDIT_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(clap::Subcommand, Debug, Clone, PartialEq, Eq)]
enum Command {
    /// Serve the HTTP API (the default).
    Run,
    /// Recount every proposal counter from the stored endorsements and exit.
    Reconcile,
}

impl Cli {
    /// Layer flags and environment variables over `base`.
    fn apply(self, base: NodeConfig) -> NodeConfig {
        let mut config = base;
        if let Some(addr) = self.listen_addr {
            config.listen_addr = addr;
        }
        if let Some(dir) = self.data_dir {
            config.data_dir = dir;
        }
        if let Some(origin) = self.allowed_origin {
            config.allowed_origin = origin;
        }
        if let Some(id) = self.orcid_client_id {
            config.orcid.client_id = id;
        }
        if let Some(secret) = self.orcid_client_secret {
            config.orcid.client_secret = secret;
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        config.single_use_sessions |= self.single_use_sessions;
        config.enable_metrics |= self.metrics;
        config
    }
}

fn load_config(cli: Cli) -> anyhow::Result<(NodeConfig, Command)> {
    let base = match &cli.config {
        Some(path) => NodeConfig::from_toml_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => NodeConfig::default(),
    };
    let command = cli.command.clone().unwrap_or(Command::Run);
    let config = cli.apply(base);
    config.validate().context("invalid configuration")?;
    Ok((config, command))
}

fn open_node(config: NodeConfig) -> anyhow::Result<PlauditNode> {
    let verifier = OrcidVerifier::new(config.orcid.clone(), config.upstream_timeout())
        .context("configuring the ORCID client")?;
    let node = PlauditNode::open(config, Arc::new(verifier)).context("opening the node")?;
    Ok(node)
}

async fn run(config: NodeConfig) -> anyhow::Result<()> {
    let listen_addr = config.listen_addr.clone();
    let allowed_origin = config.allowed_origin.clone();
    let metrics_enabled = config.enable_metrics;

    let mut node = open_node(config)?;
    node.start_housekeeping();

    let router = build_router(
        RpcState {
            service: node.service().clone(),
            metrics_enabled,
        },
        &allowed_origin,
    )?;
    let server = RpcServer::bind(&listen_addr, router).await?;
    tracing::info!(addr = %server.local_addr()?, origin = %allowed_origin, "listening");

    let shutdown = node.shutdown_controller().clone();
    tokio::spawn(async move { shutdown.wait_for_signal().await });

    server.serve(node.shutdown_controller().signalled()).await?;

    tracing::info!("shutdown signal received, stopping node");
    node.stop().await;
    tracing::info!("plaudit daemon exited cleanly");
    Ok(())
}

async fn reconcile(config: NodeConfig) -> anyhow::Result<()> {
    let node = open_node(config)?;
    let drift = node.service().reconcile().await?;
    if drift.is_empty() {
        tracing::info!("all proposal counters agree with stored endorsements");
    }
    for entry in &drift {
        tracing::warn!(
            proposal = %entry.proposal,
            recorded = entry.recorded,
            actual = entry.actual,
            "counter repaired"
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (config, command) = load_config(Cli::parse())?;
    init_logging(config.log_format()?, &config.log_level)?;

    match command {
        Command::Run => run(config).await,
        Command::Reconcile => reconcile(config).await,
    }
}
