//! rcss-agent - Entry Point
//!
//! Connects one player to a running soccer server, plays with the
//! ball-chasing policy until Ctrl-C (or `--duration-secs`), then prints the
//! run report as JSON.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use rcss_agent::core::config::AgentConfig;
use rcss_agent::core::error::Result;
use rcss_agent::policy::ChaseBallPolicy;
use rcss_agent::protocol::message::{parse_message, ServerMessage};
use rcss_agent::scheduler::CycleScheduler;
use rcss_agent::transport::UdpTransport;
use rcss_agent::world::registry::Registry;

/// Soccer simulation agent
#[derive(Parser, Debug)]
#[command(name = "rcss-agent")]
#[command(about = "Connect a player to a soccer simulation server")]
struct Args {
    /// TOML configuration file; missing keys keep their defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Server host
    #[arg(long)]
    host: Option<String>,

    /// Server port for the init handshake
    #[arg(long)]
    port: Option<u16>,

    /// Team name sent in the handshake
    #[arg(long)]
    team: Option<String>,

    /// Protocol version announced to the server
    #[arg(long)]
    protocol_version: Option<f64>,

    /// Actuation period in milliseconds
    #[arg(long)]
    cycle_ms: Option<u64>,

    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[arg(long)]
    duration_secs: Option<u64>,

    /// Log filter directive, e.g. "rcss_agent=debug" (overrides RUST_LOG)
    #[arg(long)]
    log: Option<String>,
}

fn build_config(args: &Args) -> Result<AgentConfig> {
    let mut config = match &args.config {
        Some(path) => AgentConfig::load(path)?,
        None => AgentConfig::default(),
    };

    if let Some(host) = &args.host {
        config.server.host = host.clone();
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(team) = &args.team {
        config.server.team_name = team.clone();
    }
    if let Some(version) = args.protocol_version {
        config.server.protocol_version = version;
    }
    if let Some(cycle_ms) = args.cycle_ms {
        config.schedule.cycle_ms = cycle_ms;
    }

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = match &args.log {
        Some(directive) => EnvFilter::new(directive),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("rcss_agent=info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Arc::new(build_config(&args)?);
    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        team = %config.server.team_name,
        "rcss-agent starting"
    );

    let (transport, reply) = UdpTransport::connect(&config.server).await?;
    let mut registry = Registry::new(Arc::clone(&config));
    match parse_message(&reply)? {
        ServerMessage::Init(info) => {
            tracing::info!(side = %info.side, number = info.number, mode = %info.play_mode, "joined");
            registry.set_identity(info);
        }
        other => tracing::warn!(kind = %other.header().kind, "unexpected handshake reply"),
    }

    let mut scheduler = CycleScheduler::new(
        Arc::clone(&config),
        registry.into_shared(),
        Arc::new(transport),
        Arc::new(ChaseBallPolicy::default()),
    );
    scheduler.start()?;

    match args.duration_secs {
        Some(secs) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {}
            }
        }
        None => tokio::signal::ctrl_c().await?,
    }

    let report = scheduler.stop().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
