//! benchctl - send one command to a running tinkerbench and print the reply
//!
//! ```text
//! benchctl discover_operations '{"query": "clamp", "max-results": 5}'
//! benchctl create_node_by_key '{"key": "fn:/Script/Engine.KismetMathLibrary:FClamp"}'
//! ```

use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use benchproto::{BenchClient, Request, DEFAULT_PORT};
use clap::Parser;
use serde_json::Value;

#[derive(Parser, Debug)]
#[command(version, about = "Send one command to tinkerbench", long_about = None)]
struct Cli {
    /// Command type, e.g. discover_operations
    command_type: String,

    /// Parameters as a JSON object
    parameters: Option<String>,

    /// Listener address
    #[arg(long, default_value_t = format!("127.0.0.1:{DEFAULT_PORT}"))]
    addr: String,

    /// How long to wait for the response
    #[arg(long, default_value_t = 30_000)]
    timeout_ms: u64,
}

async fn run(cli: Cli) -> Result<bool> {
    let parameters: Value = match &cli.parameters {
        Some(raw) => serde_json::from_str(raw).context("parameters must be a JSON object")?,
        None => Value::Object(Default::default()),
    };
    if !parameters.is_object() {
        anyhow::bail!("parameters must be a JSON object");
    }

    let mut client = BenchClient::connect(cli.addr.as_str())
        .await?
        .with_timeout(Duration::from_millis(cli.timeout_ms));
    let response = client
        .request(&Request::with_parameters(&cli.command_type, parameters))
        .await?;

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(response.success)
}

#[tokio::main]
async fn main() -> ExitCode {
    match run(Cli::parse()).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("benchctl: {e:#}");
            ExitCode::from(2)
        }
    }
}
