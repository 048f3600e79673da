//! Caller identity and its resolution from accepted connections.
//!
//! The messaging core never inspects credentials itself; it only threads a
//! [`CallerIdentity`] from the connection that produced a request into the
//! authenticator and the receptor answering it. How that identity is
//! derived from the raw connection is the [`IdentityResolver`]'s concern.

use std::net::SocketAddr;

use async_trait::async_trait;
use uuid::Uuid;

/// The identity of the peer on the far side of a connection.
///
/// Assigned once when the connection is established and immutable for the
/// connection's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    /// Unique session id for this connection.
    session_id: Uuid,
    /// The remote network address of the peer.
    remote_addr: SocketAddr,
}

impl CallerIdentity {
    /// Creates an identity with a fresh session id.
    pub fn new(remote_addr: SocketAddr) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            remote_addr,
        }
    }

    /// The session id of this connection.
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// The remote address of the peer.
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }
}

impl std::fmt::Display for CallerIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.session_id, self.remote_addr)
    }
}

/// Maps a raw accepted connection to the identity passed into
/// [`Authenticator`](crate::auth::Authenticator) checks and receptors.
///
/// Implementations may consult an external identity or session store.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Resolves the identity for a connection from the given remote address.
    async fn resolve(&self, remote_addr: SocketAddr) -> CallerIdentity;
}

/// Default resolver: every connection gets a fresh anonymous session id.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionIdentityResolver;

#[async_trait]
impl IdentityResolver for SessionIdentityResolver {
    async fn resolve(&self, remote_addr: SocketAddr) -> CallerIdentity {
        CallerIdentity::new(remote_addr)
    }
}
