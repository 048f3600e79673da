//! Handled expressions: fallible operations with an attached failure handler
//! and an ordered cleanup chain.
//!
//! A [`HandledExpression`] wraps a single fallible operation. Executing it
//! with [`provide`](HandledExpression::provide) returns the value on success
//! and `None` on failure, after routing the failure to a caller-installed
//! handler. Cleanup steps registered with [`next`](HandledExpression::next)
//! run in order after the operation, regardless of outcome; their own
//! failures go to the same handler and never abort the remaining steps.
//!
//! This is the result-or-failure idiom used at the public seams of the
//! crate: callers always get an explicit decision point instead of an
//! escaping fault.
//!
//! # Examples
//!
//! ```no_run
//! use lattice_net::expression::HandledExpression;
//! use lattice_net::NetError;
//!
//! # async fn example() {
//! let port = HandledExpression::using(async {
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
//!     Ok::<u16, NetError>(listener.local_addr()?.port())
//! })
//! .handle(|e| tracing::warn!("could not bind: {e}"))
//! .provide()
//! .await;
//! # let _ = port;
//! # }
//! ```

use std::future::Future;
use std::pin::Pin;

use crate::error::NetError;

type BoxedOp<'a, T> = Pin<Box<dyn Future<Output = Result<T, NetError>> + Send + 'a>>;
type BoxedCleanup<'a> = Pin<Box<dyn Future<Output = Result<(), NetError>> + Send + 'a>>;

/// A fallible operation paired with a failure handler and cleanup steps.
///
/// The handler defaults to a no-op and may be replaced any time before
/// execution. Cleanup steps accumulate via chaining and always run.
pub struct HandledExpression<'a, T> {
    /// The operation executed when the expression is provided.
    expression: BoxedOp<'a, T>,
    /// Cleanup steps, run in registration order after the operation.
    next: Vec<BoxedCleanup<'a>>,
    /// Receives the operation's failure and any cleanup failures.
    handle: Box<dyn FnMut(&NetError) + Send + 'a>,
}

impl<'a, T> HandledExpression<'a, T> {
    /// Starts handling an asynchronous fallible operation.
    pub fn using<F>(expression: F) -> Self
    where
        F: Future<Output = Result<T, NetError>> + Send + 'a,
    {
        Self {
            expression: Box::pin(expression),
            next: Vec::new(),
            handle: Box::new(|_| {}),
        }
    }

    /// Starts handling a synchronous fallible operation.
    pub fn using_fn<F>(expression: F) -> Self
    where
        F: FnOnce() -> Result<T, NetError> + Send + 'a,
        T: Send + 'a,
    {
        Self::using(async move { expression() })
    }

    /// Replaces the failure handler.
    pub fn handle<F>(mut self, handle: F) -> Self
    where
        F: FnMut(&NetError) + Send + 'a,
    {
        self.handle = Box::new(handle);
        self
    }

    /// Appends a cleanup step to run after the operation, whether or not it
    /// succeeded.
    pub fn next<F>(mut self, next: F) -> Self
    where
        F: Future<Output = Result<(), NetError>> + Send + 'a,
    {
        self.next.push(Box::pin(next));
        self
    }

    /// Executes the operation and then every cleanup step in order.
    ///
    /// Returns the operation's value, or `None` if it failed. Failures of
    /// the operation and of individual cleanup steps are forwarded to the
    /// handler; a failing cleanup does not stop the ones after it.
    pub async fn provide(mut self) -> Option<T> {
        let provided = match self.expression.await {
            Ok(value) => Some(value),
            Err(e) => {
                (self.handle)(&e);
                None
            }
        };
        for next in self.next {
            if let Err(e) = next.await {
                (self.handle)(&e);
            }
        }
        provided
    }

    /// Executes the expression, discarding its result.
    pub async fn run(self) {
        self.provide().await;
    }
}
