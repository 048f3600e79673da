//! The listening side: a family of Messengers over one server socket.
//!
//! A [`MessengerServer`] owns a TCP listener and turns every accepted
//! connection into a server-side [`Messenger`] sharing one receptor
//! registry and one authenticator. Sessions are tracked for the listener's
//! lifetime and reaped as their connections end; shutting the server down
//! closes every live session.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use futures::future::join_all;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::Authenticator;
use crate::error::Result;
use crate::identity::{IdentityResolver, SessionIdentityResolver};
use crate::messenger::Messenger;
use crate::receptor::ReceptorRegistry;

/// Accepts connections and runs one [`Messenger`] per peer.
pub struct MessengerServer {
    /// The address the listener is actually bound to.
    local_addr: SocketAddr,
    /// Live sessions keyed by their caller identity's session id.
    sessions: Arc<DashMap<Uuid, Arc<Messenger>>>,
    /// Signals the accept loop to stop.
    shutdown: broadcast::Sender<()>,
    /// Set once shutdown has run; makes it idempotent.
    stopped: AtomicBool,
}

impl MessengerServer {
    /// Binds a listener and starts accepting connections, assigning each an
    /// anonymous session identity.
    pub async fn bind(
        addr: SocketAddr,
        registry: Arc<ReceptorRegistry>,
        authenticator: Arc<dyn Authenticator>,
    ) -> Result<Arc<Self>> {
        Self::bind_with_resolver(addr, registry, authenticator, Arc::new(SessionIdentityResolver))
            .await
    }

    /// Binds a listener with an explicit identity resolver.
    pub async fn bind_with_resolver(
        addr: SocketAddr,
        registry: Arc<ReceptorRegistry>,
        authenticator: Arc<dyn Authenticator>,
        resolver: Arc<dyn IdentityResolver>,
    ) -> Result<Arc<Self>> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let (shutdown, _) = broadcast::channel(1);

        let server = Arc::new(Self {
            local_addr,
            sessions: Arc::new(DashMap::new()),
            shutdown,
            stopped: AtomicBool::new(false),
        });

        let accept = server.clone();
        tokio::spawn(async move {
            accept
                .accept_loop(listener, registry, authenticator, resolver)
                .await;
        });

        info!("Messenger server listening on {local_addr}");
        Ok(server)
    }

    /// The address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Stops accepting connections and closes every live session.
    /// Idempotent.
    pub async fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Shutting down messenger server on {}", self.local_addr);
        let _ = self.shutdown.send(());

        let live: Vec<Arc<Messenger>> = self
            .sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        join_all(live.iter().map(|messenger| messenger.close())).await;
        self.sessions.clear();
    }

    /// Accepts peers until shutdown, wiring each into a Messenger and a
    /// reaper task that drops the session when its connection ends.
    async fn accept_loop(
        self: Arc<Self>,
        listener: TcpListener,
        registry: Arc<ReceptorRegistry>,
        authenticator: Arc<dyn Authenticator>,
        resolver: Arc<dyn IdentityResolver>,
    ) {
        let mut shutdown = self.shutdown.subscribe();
        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, remote_addr)) => {
                        let identity = resolver.resolve(remote_addr).await;
                        let session_id = identity.session_id();
                        debug!("Accepted connection from {identity}");

                        let messenger = Messenger::from_stream(
                            stream,
                            identity,
                            registry.clone(),
                            authenticator.clone(),
                        );
                        self.sessions.insert(session_id, messenger.clone());

                        let sessions = self.sessions.clone();
                        tokio::spawn(async move {
                            messenger.closed().await;
                            sessions.remove(&session_id);
                            debug!("Session {session_id} ended");
                        });
                    }
                    Err(e) => {
                        warn!("Failed to accept connection: {e}");
                    }
                },
            }
        }
        debug!("Accept loop on {} stopped", self.local_addr);
    }
}

impl std::fmt::Debug for MessengerServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessengerServer")
            .field("local_addr", &self.local_addr)
            .field("sessions", &self.sessions.len())
            .finish()
    }
}
