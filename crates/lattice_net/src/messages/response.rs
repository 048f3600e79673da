//! Response messages: correlated replies carrying a result or a failure.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Failure kinds produced by the dispatch layer.
///
/// These are part of the wire contract: remote peers match on them to
/// distinguish why an invocation failed.
pub mod failure {
    /// No receptor is registered under the requested method.
    pub const UNKNOWN_METHOD: &str = "unknown method";
    /// The authenticator rejected the caller for this request.
    pub const UNAUTHENTICATED: &str = "unauthenticated";
    /// The receptor failed or panicked while producing its response.
    pub const HANDLER_ERROR: &str = "handler error";
    /// The inbound frame could not be decoded but carried a recoverable id.
    pub const INVALID_FRAME: &str = "invalid frame";
}

/// The failure descriptor of an unsuccessful [`Response`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseError {
    /// Machine-readable failure kind (see [`failure`]).
    pub kind: String,
    /// Human-readable description; never carries internal stack detail.
    pub message: String,
}

/// The reply to a [`Request`](crate::messages::Request).
///
/// A response echoes the originating request's correlation id and carries
/// exactly one of a success payload or a failure descriptor. Responses are
/// immutable once built; [`with_id`](Response::with_id) produces a new
/// value rather than mutating in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// The correlation id of the originating request.
    id: Uuid,
    /// The success payload, present only on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    /// The failure descriptor, present only on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<ResponseError>,
}

impl Response {
    /// Creates a successful response for the request with the given id.
    pub fn ok(id: Uuid, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Creates a failure response for the request with the given id.
    pub fn failure(id: Uuid, kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id,
            result: None,
            error: Some(ResponseError {
                kind: kind.into(),
                message: message.into(),
            }),
        }
    }

    /// Returns this response re-correlated to a different request id.
    ///
    /// The dispatch layer uses this to force a receptor's response onto the
    /// id of the request it answers.
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    /// The correlation id this response answers.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The success payload, if this response succeeded.
    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    /// The failure descriptor, if this response failed.
    pub fn error(&self) -> Option<&ResponseError> {
        self.error.as_ref()
    }

    /// Whether this response carries a success payload.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Whether this response carries exactly one of result and error.
    ///
    /// The codec rejects inbound responses for which this is false.
    pub fn is_well_formed(&self) -> bool {
        self.result.is_some() != self.error.is_some()
    }
}
