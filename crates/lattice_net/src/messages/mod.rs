//! The wire message model: requests, responses, and frame classification.
//!
//! One logical message travels as one JSON object. The discriminator
//! between the two shapes is the presence of the `method` field - requests
//! carry it, responses never do. [`Frame`] captures that classification for
//! the read loop.

pub mod request;
pub mod response;

pub use request::Request;
pub use response::{failure, Response, ResponseError};

use serde::{Deserialize, Serialize};

/// A single inbound or outbound wire message.
///
/// Deserialization tries the request shape first: a request requires
/// `method`, so a response object (which has no `method`) can never match
/// it, and the classification is deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Frame {
    /// A method invocation awaiting a correlated response.
    Request(Request),
    /// The reply to a previously sent request.
    Response(Response),
}
