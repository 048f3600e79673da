//! # Lattice Net - Messaging Core
//!
//! The network messaging core of the Lattice game-server platform: a
//! request/response protocol that lets two processes exchange JSON-encoded
//! method invocations over a TCP socket, correlate asynchronous replies to
//! their requests, authenticate callers, and dispatch inbound calls to
//! registered handlers.
//!
//! ## Architecture Overview
//!
//! * **Message model** - immutable [`Request`]/[`Response`] records
//!   correlated by a 128-bit random id
//! * **Receptor registry** - named handlers resolved by method name,
//!   shared read-mostly across connections
//! * **Authenticator** - a pluggable predicate gating every inbound
//!   request before it reaches its receptor
//! * **Messenger** - the per-connection actor owning the socket, the read
//!   loop, and the pending-request table
//! * **Messenger server** - a listener running a family of Messengers over
//!   one shared registry
//!
//! ## Message Flow
//!
//! 1. Application code builds a [`Request`] and calls [`Messenger::send`]
//! 2. The Messenger registers the request's correlation id in its pending
//!    table, writes the frame, and suspends the caller
//! 3. The peer's Messenger reads the frame, authenticates it, resolves the
//!    receptor by method name, and invokes it
//! 4. The resulting [`Response`] travels back carrying the same id and
//!    completes the waiting call
//!
//! Requests are never silently dropped: an unknown method, a rejected
//! caller, a failing receptor, or a malformed-but-identifiable frame all
//! produce a failure response so the remote `send` resolves
//! deterministically.
//!
//! ## Wire Format
//!
//! Newline-delimited JSON, one object per line. A request is
//! `{"id", "method", "parameters"}`; a response is `{"id", "result"}` on
//! success or `{"id", "error": {"kind", "message"}}` on failure. The
//! presence of `method` is the request/response discriminator.
//!
//! ## Error Handling
//!
//! No public operation panics or throws across the API boundary: fallible
//! calls return [`NetError`] values, and the
//! [`HandledExpression`](expression::HandledExpression) combinator gives
//! callers an explicit decision point plus an ordered cleanup chain.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use lattice_net::{
//!     AllowAll, Messenger, MessengerServer, ReceptorRegistry, Request, Response,
//! };
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), lattice_net::NetError> {
//! let registry = Arc::new(ReceptorRegistry::new());
//! registry.register_fn("echo", |request, _caller| async move {
//!     let text = request.parameter("text").cloned().unwrap_or(json!(null));
//!     Ok(Response::ok(request.id(), text))
//! })?;
//!
//! let server = MessengerServer::bind(
//!     "127.0.0.1:0".parse().unwrap(),
//!     registry,
//!     Arc::new(AllowAll),
//! )
//! .await?;
//!
//! let client = Messenger::connect(server.local_addr()).await?;
//! let request = Request::new("echo").with_parameter("text", json!("hi"));
//! let response = client.send(request, Duration::from_secs(5)).await?;
//! assert_eq!(response.result(), Some(&json!("hi")));
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod codec;
pub mod error;
pub mod expression;
pub mod identity;
pub mod messages;
pub mod messenger;
pub mod receptor;
pub mod server;

// Re-export the core types for easy access
pub use auth::{AllowAll, Authenticator};
pub use codec::{Codec, JsonCodec};
pub use error::{NetError, Result};
pub use expression::HandledExpression;
pub use identity::{CallerIdentity, IdentityResolver, SessionIdentityResolver};
pub use messages::{failure, Frame, Request, Response, ResponseError};
pub use messenger::{ConnectionState, Messenger};
pub use receptor::{FnReceptor, Receptor, ReceptorRegistry};
pub use server::MessengerServer;
