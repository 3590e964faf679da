use std::path::PathBuf;

use clap::Parser;

/// Relay multi-provider AI chat backend
#[derive(Debug, Parser)]
#[command(name = "relay", about = "Multi-provider AI chat backend with quota-aware failover")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "relay.toml", env = "RELAY_CONFIG")]
    pub config: PathBuf,

    /// Override the listen address
    #[arg(long, env = "RELAY_LISTEN")]
    pub listen: Option<std::net::SocketAddr>,
}
