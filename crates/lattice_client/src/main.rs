//! # Lattice Test Client
//!
//! A small command-line client for exercising a running Lattice messenger
//! server: it connects, invokes one method with the given parameters,
//! prints the response, and closes the connection.

use std::time::Duration;

use anyhow::{anyhow, Context};
use clap::Parser;
use serde_json::Value;
use tracing::{error, info};

use lattice_net::{HandledExpression, Messenger, NetError, Request};

#[derive(Parser, Debug)]
#[command(name = "lattice-client")]
#[command(about = "Lattice messenger test client")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:7313")]
    address: String,

    /// Method to invoke
    #[arg(short, long, default_value = "ping")]
    method: String,

    /// Request parameters as key=json pairs (repeatable)
    ///
    /// Example: --param text='"hi"' --param count=3
    #[arg(short, long = "param")]
    params: Vec<String>,

    /// Shared secret, sent as the "token" parameter
    #[arg(long)]
    secret: Option<String>,

    /// Request timeout in milliseconds
    #[arg(short, long, default_value = "5000")]
    timeout_ms: u64,
}

/// Parses one `key=json` pair; bare values fall back to JSON strings so
/// `--param text=hi` works without quoting.
fn parse_param(raw: &str) -> anyhow::Result<(String, Value)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("parameter '{raw}' is not a key=value pair"))?;
    if key.is_empty() {
        return Err(anyhow!("parameter '{raw}' has an empty key"));
    }
    let value = serde_json::from_str(value)
        .unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn build_request(args: &Args) -> anyhow::Result<Request> {
    let mut request = Request::new(args.method.clone());
    for raw in &args.params {
        let (key, value) = parse_param(raw)?;
        request = request.with_parameter(key, value);
    }
    if let Some(secret) = &args.secret {
        request = request.with_parameter("token", Value::String(secret.clone()));
    }
    Ok(request)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    let request = build_request(&args)?;
    let timeout = Duration::from_millis(args.timeout_ms);

    info!("Connecting to {}", args.address);
    let messenger = Messenger::connect(args.address.as_str())
        .await
        .with_context(|| format!("failed to connect to {}", args.address))?;

    let connection = messenger.clone();
    let response = HandledExpression::using(async move {
        connection.send(request, timeout).await
    })
    .handle(|e: &NetError| error!("Request failed: {e}"))
    .next(async {
        messenger.close().await;
        Ok(())
    })
    .provide()
    .await;

    match response {
        Some(response) => match response.error() {
            None => {
                info!("✅ {}", serde_json::to_string_pretty(response.result().unwrap_or(&serde_json::Value::Null))?);
                Ok(())
            }
            Some(failure) => {
                error!("❌ {} ({})", failure.message, failure.kind);
                Err(anyhow!("request rejected: {}", failure.kind))
            }
        },
        None => Err(anyhow!("request did not complete")),
    }
}
