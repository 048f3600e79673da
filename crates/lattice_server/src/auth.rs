//! Authenticator implementations for the messenger server.

use async_trait::async_trait;
use lattice_net::{Authenticator, CallerIdentity, Request};
use serde_json::Value;

/// Accepts a request only when its `token` parameter matches the shared
/// secret from the server configuration.
pub struct SharedSecretAuthenticator {
    secret: String,
}

impl SharedSecretAuthenticator {
    /// Creates an authenticator around the configured secret.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

#[async_trait]
impl Authenticator for SharedSecretAuthenticator {
    async fn is_authenticated(&self, _caller: &CallerIdentity, request: &Request) -> bool {
        request.parameter("token") == Some(&Value::String(self.secret.clone()))
    }
}
