//! Request authentication.

use async_trait::async_trait;

use crate::identity::CallerIdentity;
use crate::messages::Request;

/// Decides whether a request from a given caller may be dispatched.
///
/// Implementations must be pure with respect to protocol state - they never
/// touch pending-request tables or connection lifecycles - but may consult
/// an external identity or session store. A negative answer is not an error
/// condition: the dispatcher turns it into a normal `"unauthenticated"`
/// failure response and the connection stays open.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Returns whether `request` from `caller` is allowed to reach its
    /// receptor.
    async fn is_authenticated(&self, caller: &CallerIdentity, request: &Request) -> bool;
}

/// Permits every request. The default for trusted peers.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl Authenticator for AllowAll {
    async fn is_authenticated(&self, _caller: &CallerIdentity, _request: &Request) -> bool {
        true
    }
}
