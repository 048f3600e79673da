//! Main application entry point for the Lattice messenger server
//!
//! Provides the CLI interface, configuration loading, logging setup, and
//! server startup around the messaging core in `lattice_net`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use lattice_net::{AllowAll, Authenticator, MessengerServer, ReceptorRegistry};

mod auth;
mod config;
mod logging;
mod receptors;
mod shutdown;

use auth::SharedSecretAuthenticator;
use config::{Args, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = Config::load_or_create(&args.config)?;
    config.apply_args(&args);

    logging::setup_logging(&args, &config)?;

    let listen_addr: SocketAddr = config
        .server
        .listen_addr
        .parse()
        .with_context(|| format!("invalid listen address '{}'", config.server.listen_addr))?;

    info!("🚀 Starting Lattice messenger server on {listen_addr}");

    let authenticator: Arc<dyn Authenticator> = match &config.server.shared_secret {
        Some(secret) => {
            info!("🔐 Shared-secret authentication enabled");
            Arc::new(SharedSecretAuthenticator::new(secret.clone()))
        }
        None => Arc::new(AllowAll),
    };

    let registry = Arc::new(ReceptorRegistry::new());
    receptors::register_core_receptors(&registry)?;

    let started = Instant::now();
    let server = MessengerServer::bind(listen_addr, registry.clone(), authenticator)
        .await
        .with_context(|| format!("failed to bind {listen_addr}"))?;
    receptors::register_status_receptor(&registry, server.clone(), started)?;

    info!(
        "✅ Ready: {} receptor(s) registered, listening on {}",
        registry.len(),
        server.local_addr()
    );

    // Run until a termination signal arrives
    let shutdown_rx = shutdown::setup_shutdown_handler().await;
    if shutdown_rx.await.is_err() {
        error!("Shutdown signal handler dropped unexpectedly");
    }

    info!("🛑 Shutting down ({} live session(s))", server.session_count());
    server.shutdown().await;
    info!("Goodbye");

    Ok(())
}
