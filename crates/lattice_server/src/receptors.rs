//! Built-in receptors registered by the server at startup.
//!
//! These cover the minimal operational surface every deployment gets:
//! `ping` for liveness probes and `status` for a view of the running
//! server. Everything else is registered by the embedding application.

use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use lattice_net::{MessengerServer, ReceptorRegistry, Response};
use serde_json::json;

/// Milliseconds since the Unix epoch.
fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

/// Registers the receptors that do not need a running server.
pub fn register_core_receptors(registry: &Arc<ReceptorRegistry>) -> lattice_net::Result<()> {
    registry.register_fn("ping", |request, _caller| async move {
        Ok(Response::ok(
            request.id(),
            json!({ "pong": true, "timestamp": current_timestamp() }),
        ))
    })
}

/// Registers the `status` receptor once the listener is up.
pub fn register_status_receptor(
    registry: &Arc<ReceptorRegistry>,
    server: Arc<MessengerServer>,
    started: Instant,
) -> lattice_net::Result<()> {
    registry.register_fn("status", move |request, _caller| {
        let server = server.clone();
        async move {
            Ok(Response::ok(
                request.id(),
                json!({
                    "listen_addr": server.local_addr().to_string(),
                    "sessions": server.session_count(),
                    "uptime_secs": started.elapsed().as_secs(),
                }),
            ))
        }
    })
}
