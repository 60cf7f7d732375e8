//! tinkerbench daemon
//!
//! Serves the remote-control protocol until Ctrl-C.

use std::path::PathBuf;

use anyhow::{Context, Result};
use benchconf::BenchConfig;
use clap::Parser;
use tracing::info;

/// Remote-control listener for the node-graph editor
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Config file used in place of ./tinkerbench.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host to bind (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Extra reflection catalog to load; may be repeated
    #[arg(long = "catalog", value_name = "FILE")]
    catalogs: Vec<PathBuf>,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mut config, sources) = BenchConfig::load_with_sources_from(cli.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(host) = cli.host {
        config.infra.bind.host = host;
    }
    if let Some(port) = cli.port {
        config.infra.bind.port = port;
    }
    config.bootstrap.catalog.files.extend(cli.catalogs);

    if cli.print_config {
        print!("{}", config.to_toml());
        return Ok(());
    }

    tinkerbench::telemetry::init(&config.infra.telemetry.log_level)?;
    info!("tinkerbench {} starting", env!("CARGO_PKG_VERSION"));
    for file in &sources.files {
        info!(file = %file.display(), "config file");
    }
    for var in &sources.env_overrides {
        info!(var = %var, "config env override");
    }

    let daemon = tinkerbench::Daemon::start(&config).await?;
    info!(addr = %daemon.local_addr(), "ready");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("shutdown requested");

    let host = daemon.shutdown().await?;
    info!(
        blueprints = host.blueprints().count(),
        "tinkerbench shutdown complete"
    );
    Ok(())
}
