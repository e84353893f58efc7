//! # Ferrous Policyd
//!
//! A policy daemon for MTAs: weighted IP-list and DNS-RBL filters wired into
//! a hook graph, spoken over the policy-delegation protocol.

use clap::Parser;
use ferrous_policyd::bootstrap;
use ferrous_policyd::server::PolicyServer;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::error;

#[derive(Parser)]
#[command(name = "ferrous-policyd")]
#[command(version)]
#[command(about = "MTA policy daemon with weighted RBL filtering")]
struct Cli {
    /// Filter configuration file
    #[arg(short = 'c', long)]
    config: PathBuf,

    /// Address to answer policy requests on
    #[arg(short = 'l', long, default_value = "127.0.0.1:10000")]
    listen: SocketAddr,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    bootstrap::logging::init_logging(&cli.log_level);

    let engine = match bootstrap::config::load_engine(&cli.config) {
        Ok(engine) => engine,
        Err(e) => {
            error!(error = %e, "cannot load configuration");
            std::process::exit(1);
        }
    };

    if cli.check {
        tracing::info!("configuration OK");
        return Ok(());
    }

    let server = PolicyServer::bind(cli.listen).await?;
    server.run(Arc::new(engine)).await?;
    Ok(())
}
