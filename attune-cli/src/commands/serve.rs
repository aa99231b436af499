//! Attune serve command
//!
//! Runs the attune server: HTTP API for session commands and WebSocket for
//! the ordered event stream. Command-line flags override the TOML config
//! file, which overrides built-in defaults.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use tracing::info;

use attune_server::{AttuneServer, ServerConfig};

use crate::config::AttuneConfig;

/// Arguments for the serve command
#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Port to listen on (overrides config)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Host to bind to (overrides config)
    #[arg(long)]
    pub host: Option<String>,

    /// Path to a TOML config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Run the serve command
pub async fn run(args: ServeArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => AttuneConfig::load(path)?,
        None => AttuneConfig::default(),
    };

    let server_config = ServerConfig {
        host: args.host.unwrap_or(config.server.host),
        port: args.port.unwrap_or(config.server.port),
        tick: Duration::from_secs(config.server.tick_secs),
        session_defaults: config.session,
    };

    info!("starting attune server on {}", server_config.addr());
    AttuneServer::new(server_config).run().await?;
    Ok(())
}
