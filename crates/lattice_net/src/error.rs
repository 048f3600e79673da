//! Error types for the messaging core.
//!
//! Every fallible public operation in this crate returns a [`NetError`]
//! rather than propagating an unhandled fault. Remote failures that arrive
//! as part of a well-formed [`Response`](crate::messages::Response) are not
//! errors at this layer; they surface as the response's failure descriptor,
//! except through the typed decode path where they become
//! [`NetError::ResponseFailure`].

use thiserror::Error;

/// Errors produced by the messaging core.
#[derive(Error, Debug)]
pub enum NetError {
    /// Transport-level I/O failure (connect, read, write, shutdown).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A frame could not be encoded or decoded.
    #[error("Codec error: {0}")]
    Codec(String),

    /// A decoded frame violated the protocol shape (e.g. a response carrying
    /// both a result and an error).
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// The connection is closed, closing, or was never open.
    #[error("Connection closed")]
    ConnectionClosed,

    /// A `send` exceeded its deadline before the matching response arrived.
    #[error("Request timed out")]
    Timeout,

    /// A receptor is already registered under this method name.
    #[error("A receptor is already registered for method '{0}'")]
    DuplicateReceptor(String),

    /// A response carried a failure descriptor where a typed result was
    /// expected.
    #[error("Remote failure ({kind}): {message}")]
    ResponseFailure {
        /// Machine-readable failure kind (see [`crate::messages::failure`]).
        kind: String,
        /// Human-readable description of the failure.
        message: String,
    },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, NetError>;
