//! Receptors and the registry that dispatches requests to them.
//!
//! A receptor is a named handler: given a request and the identity of the
//! caller, it produces exactly one response. Receptors are registered into
//! a [`ReceptorRegistry`] under a unique method name before their Messenger
//! begins accepting traffic; the registry may be shared across many
//! connections, so receptors must tolerate concurrent invocation.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, error, warn};

use crate::auth::Authenticator;
use crate::error::{NetError, Result};
use crate::identity::CallerIdentity;
use crate::messages::{failure, Request, Response};

/// A named handler producing a response for a request and its caller.
///
/// Invoked concurrently from different connections (and repeatedly from the
/// same one); implementations must provide their own synchronization around
/// shared mutable state.
#[async_trait]
pub trait Receptor: Send + Sync {
    /// Produces the response for `request` from `caller`.
    ///
    /// Returning an error never crosses the wire as-is: the dispatcher
    /// converts it into a `"handler error"` failure response with a
    /// sanitized message.
    async fn receive(&self, request: Request, caller: CallerIdentity) -> Result<Response>;
}

/// Adapts a plain async closure into a [`Receptor`].
pub struct FnReceptor<F> {
    function: F,
}

impl<F, Fut> FnReceptor<F>
where
    F: Fn(Request, CallerIdentity) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response>> + Send,
{
    /// Wraps `function` as a receptor.
    pub fn new(function: F) -> Self {
        Self { function }
    }
}

#[async_trait]
impl<F, Fut> Receptor for FnReceptor<F>
where
    F: Fn(Request, CallerIdentity) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response>> + Send,
{
    async fn receive(&self, request: Request, caller: CallerIdentity) -> Result<Response> {
        (self.function)(request, caller).await
    }
}

/// Maps method names to receptors and dispatches inbound requests.
///
/// Read-mostly: registration happens at startup, resolution happens on
/// every inbound request from every connection. Registering a method name
/// twice is rejected rather than silently replacing the first binding.
#[derive(Default)]
pub struct ReceptorRegistry {
    /// Registered receptors keyed by unique method name.
    receptors: DashMap<String, Arc<dyn Receptor>>,
}

impl ReceptorRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            receptors: DashMap::new(),
        }
    }

    /// Binds `receptor` to `method`.
    ///
    /// Fails with [`NetError::DuplicateReceptor`] if the name is taken.
    pub fn register(
        &self,
        method: impl Into<String>,
        receptor: Arc<dyn Receptor>,
    ) -> Result<()> {
        let method = method.into();
        match self.receptors.entry(method.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(NetError::DuplicateReceptor(method))
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                debug!("Registered receptor for method '{method}'");
                entry.insert(receptor);
                Ok(())
            }
        }
    }

    /// Binds an async closure to `method`.
    pub fn register_fn<F, Fut>(&self, method: impl Into<String>, function: F) -> Result<()>
    where
        F: Fn(Request, CallerIdentity) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response>> + Send + 'static,
    {
        self.register(method, Arc::new(FnReceptor::new(function)))
    }

    /// Looks up the receptor registered under `method`.
    pub fn resolve(&self, method: &str) -> Option<Arc<dyn Receptor>> {
        self.receptors.get(method).map(|entry| entry.value().clone())
    }

    /// The number of registered receptors.
    pub fn len(&self) -> usize {
        self.receptors.len()
    }

    /// Whether the registry has no receptors.
    pub fn is_empty(&self) -> bool {
        self.receptors.is_empty()
    }

    /// Authenticates and routes a request to its receptor, producing the
    /// response to write back.
    ///
    /// The algorithm is fixed:
    /// 1. resolve the receptor; absent → `"unknown method"` failure;
    /// 2. check the authenticator; rejected → `"unauthenticated"` failure,
    ///    without invoking the receptor;
    /// 3. invoke the receptor on its own task, so an error return or a
    ///    panic becomes a `"handler error"` failure with a sanitized
    ///    message and the connection survives;
    /// 4. force the response's id to the request's id.
    ///
    /// A request is never left unanswered.
    pub async fn dispatch(
        &self,
        request: Request,
        caller: CallerIdentity,
        authenticator: &Arc<dyn Authenticator>,
    ) -> Response {
        let id = request.id();
        let method = request.method().to_string();

        let receptor = match self.resolve(&method) {
            Some(receptor) => receptor,
            None => {
                debug!("No receptor for method '{method}' requested by {caller}");
                return Response::failure(
                    id,
                    failure::UNKNOWN_METHOD,
                    format!("no receptor registered for method '{method}'"),
                );
            }
        };

        if !authenticator.is_authenticated(&caller, &request).await {
            debug!("Rejected unauthenticated request for '{method}' from {caller}");
            return Response::failure(
                id,
                failure::UNAUTHENTICATED,
                format!("caller is not authenticated for method '{method}'"),
            );
        }

        // The receptor runs on its own task so that a panic is contained in
        // the task boundary instead of tearing down the read path.
        let invocation =
            tokio::spawn(async move { receptor.receive(request, caller).await });
        match invocation.await {
            Ok(Ok(response)) => response.with_id(id),
            Ok(Err(e)) => {
                warn!("Receptor '{method}' failed: {e}");
                Response::failure(
                    id,
                    failure::HANDLER_ERROR,
                    format!("receptor '{method}' failed to produce a response"),
                )
            }
            Err(join_error) => {
                error!("Receptor '{method}' panicked: {join_error}");
                Response::failure(
                    id,
                    failure::HANDLER_ERROR,
                    format!("receptor '{method}' failed to produce a response"),
                )
            }
        }
    }
}

impl std::fmt::Debug for ReceptorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReceptorRegistry")
            .field("receptors", &self.receptors.len())
            .finish()
    }
}
