//! The per-connection messaging actor.
//!
//! A [`Messenger`] owns one TCP socket. It runs a single read loop that
//! classifies inbound frames: requests are dispatched (each on its own
//! task, so a slow authenticator or receptor never stalls the routing of
//! responses) and responses complete the matching entry of the
//! pending-request table. Outbound frames from concurrent `send` calls and
//! from the dispatcher share a single writer lock, so the bytes of two
//! frames never interleave on the wire.
//!
//! # Lifecycle
//!
//! A connection moves through `Connecting -> Open -> Closing -> Closed`.
//! Closing is idempotent and safe from any task: it flushes the write path,
//! fails every still-pending entry with a closed-connection failure (no
//! caller is ever left blocked forever), and releases the socket.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::{broadcast, oneshot, Mutex};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth::{AllowAll, Authenticator};
use crate::codec::{salvage_id, Codec, JsonCodec};
use crate::error::{NetError, Result};
use crate::expression::HandledExpression;
use crate::identity::CallerIdentity;
use crate::messages::{failure, Frame, Request, Response};
use crate::receptor::ReceptorRegistry;

const CONNECTING: u8 = 0;
const OPEN: u8 = 1;
const CLOSING: u8 = 2;
const CLOSED: u8 = 3;

/// The lifecycle state of a [`Messenger`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// The socket is being established.
    Connecting,
    /// Traffic flows in both directions.
    Open,
    /// Close has begun; pending entries are being failed.
    Closing,
    /// The socket has been released.
    Closed,
}

impl ConnectionState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            CONNECTING => Self::Connecting,
            OPEN => Self::Open,
            CLOSING => Self::Closing,
            _ => Self::Closed,
        }
    }
}

/// The connection-level actor: sends requests, routes replies, dispatches
/// inbound invocations.
///
/// A Messenger exclusively owns its socket and pending-request table. The
/// receptor registry and authenticator may be shared with other Messengers
/// accepting traffic from other peers.
pub struct Messenger {
    /// Lifecycle state (`CONNECTING`/`OPEN`/`CLOSING`/`CLOSED`).
    state: AtomicU8,
    /// In-flight requests awaiting their correlated response. Entries are
    /// removed exactly once; `DashMap::remove` is the atomic take that
    /// keeps a racing timeout and response from both completing.
    pending: DashMap<Uuid, oneshot::Sender<Response>>,
    /// Single-writer lock over the socket's write half.
    writer: Mutex<OwnedWriteHalf>,
    /// Receptors answering inbound requests on this connection.
    registry: Arc<ReceptorRegistry>,
    /// Gate applied to every inbound request before dispatch.
    authenticator: Arc<dyn Authenticator>,
    /// Wire encoding.
    codec: Arc<dyn Codec>,
    /// Identity of the peer on the far side of this connection.
    identity: CallerIdentity,
    /// Signals the read loop (and `closed()` waiters) when closing begins.
    shutdown: broadcast::Sender<()>,
}

impl Messenger {
    /// Connects to a peer as a pure client: no receptors, every inbound
    /// request rejected as unknown.
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Arc<Self>> {
        Self::connect_with(addr, Arc::new(ReceptorRegistry::new()), Arc::new(AllowAll)).await
    }

    /// Connects to a peer with receptors of its own, so the remote side can
    /// invoke methods over the same connection.
    pub async fn connect_with(
        addr: impl ToSocketAddrs,
        registry: Arc<ReceptorRegistry>,
        authenticator: Arc<dyn Authenticator>,
    ) -> Result<Arc<Self>> {
        let stream = TcpStream::connect(addr).await?;
        let identity = CallerIdentity::new(stream.peer_addr()?);
        Ok(Self::from_stream(stream, identity, registry, authenticator))
    }

    /// Wraps an already-established stream, e.g. one accepted by a
    /// [`MessengerServer`](crate::server::MessengerServer).
    pub fn from_stream(
        stream: TcpStream,
        identity: CallerIdentity,
        registry: Arc<ReceptorRegistry>,
        authenticator: Arc<dyn Authenticator>,
    ) -> Arc<Self> {
        Self::with_codec(stream, identity, registry, authenticator, Arc::new(JsonCodec))
    }

    /// Wraps a stream with an explicit wire codec.
    pub fn with_codec(
        stream: TcpStream,
        identity: CallerIdentity,
        registry: Arc<ReceptorRegistry>,
        authenticator: Arc<dyn Authenticator>,
        codec: Arc<dyn Codec>,
    ) -> Arc<Self> {
        let (read_half, write_half) = stream.into_split();
        let (shutdown, _) = broadcast::channel(1);
        let messenger = Arc::new(Self {
            state: AtomicU8::new(CONNECTING),
            pending: DashMap::new(),
            writer: Mutex::new(write_half),
            registry,
            authenticator,
            codec,
            identity,
            shutdown,
        });
        messenger.state.store(OPEN, Ordering::SeqCst);
        let reader = messenger.clone();
        tokio::spawn(async move { reader.read_loop(read_half).await });
        messenger
    }

    /// The current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Whether the connection is open for traffic.
    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// The identity of the remote peer.
    pub fn identity(&self) -> &CallerIdentity {
        &self.identity
    }

    /// The number of requests currently awaiting a response.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Sends a request and waits for its correlated response.
    ///
    /// Resolves when the matching response arrives, the timeout elapses
    /// ([`NetError::Timeout`]; a late response is then discarded by the
    /// read loop), or the connection closes
    /// ([`NetError::ConnectionClosed`]). The returned [`Response`] may
    /// itself carry a failure descriptor produced by the remote dispatcher.
    pub async fn send(&self, request: Request, timeout: Duration) -> Result<Response> {
        if !self.is_open() {
            return Err(NetError::ConnectionClosed);
        }
        let id = request.id();
        let (sender, receiver) = oneshot::channel();
        self.pending.insert(id, sender);

        // A close racing the insert above may already have drained the
        // table; re-checking after the insert guarantees the entry cannot
        // be stranded: either this removes it, or the close's drain does.
        if !self.is_open() {
            self.pending.remove(&id);
            return Err(NetError::ConnectionClosed);
        }

        if let Err(e) = self.write_frame(&Frame::Request(request)).await {
            self.pending.remove(&id);
            self.close().await;
            return Err(e);
        }

        match tokio::time::timeout(timeout, receiver).await {
            Ok(Ok(response)) => Ok(response),
            // The sender was dropped: the connection closed underneath us.
            Ok(Err(_)) => Err(NetError::ConnectionClosed),
            Err(_) => {
                // Take-once: if the read loop removed the entry in the same
                // instant, the response wins and this removal is a no-op.
                self.pending.remove(&id);
                Err(NetError::Timeout)
            }
        }
    }

    /// Sends a request and decodes the success payload into `T`.
    ///
    /// A failure response maps to [`NetError::ResponseFailure`] instead of
    /// a decode attempt.
    pub async fn send_expect<T: DeserializeOwned>(
        &self,
        request: Request,
        timeout: Duration,
    ) -> Result<T> {
        let response = self.send(request, timeout).await?;
        match response.error() {
            Some(error) => Err(NetError::ResponseFailure {
                kind: error.kind.clone(),
                message: error.message.clone(),
            }),
            None => {
                let value = response.result().cloned().unwrap_or(Value::Null);
                serde_json::from_value(value).map_err(|e| NetError::Codec(e.to_string()))
            }
        }
    }

    /// Closes the connection.
    ///
    /// Idempotent and safe from any task. Flushes the write path, fails
    /// every still-pending entry (their `send` calls resolve with
    /// [`NetError::ConnectionClosed`] rather than hanging), and releases
    /// the socket.
    pub async fn close(&self) {
        let began = self
            .state
            .compare_exchange(OPEN, CLOSING, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
            || self
                .state
                .compare_exchange(CONNECTING, CLOSING, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok();
        if !began {
            return;
        }

        debug!("Closing connection to {}", self.identity);
        let _ = self.shutdown.send(());

        // Flush first, then fail the pending entries, then release the
        // socket; the cleanup chain runs even when the flush faults.
        HandledExpression::using(async {
            let mut writer = self.writer.lock().await;
            writer.flush().await?;
            Ok(())
        })
        .handle(|e| debug!("Transport already unusable during close: {e}"))
        .next(async {
            // Dropping the senders resolves every waiting `send` with a
            // closed-connection failure.
            self.pending.clear();
            Ok(())
        })
        .next(async {
            let mut writer = self.writer.lock().await;
            writer.shutdown().await?;
            Ok(())
        })
        .run()
        .await;

        self.state.store(CLOSED, Ordering::SeqCst);
    }

    /// Resolves once the connection has begun closing.
    pub async fn closed(&self) {
        let mut shutdown = self.shutdown.subscribe();
        if !self.is_open() {
            return;
        }
        let _ = shutdown.recv().await;
    }

    /// Serializes and writes one frame atomically with respect to other
    /// writers.
    async fn write_frame(&self, frame: &Frame) -> Result<()> {
        let bytes = self.codec.encode(frame)?;
        let mut writer = self.writer.lock().await;
        writer.write_all(&bytes).await?;
        writer.flush().await?;
        Ok(())
    }

    /// The read loop: classifies inbound frames until EOF, a transport
    /// fault, or close.
    async fn read_loop(self: Arc<Self>, read_half: OwnedReadHalf) {
        let mut shutdown = self.shutdown.subscribe();
        let mut reader = BufReader::new(read_half);
        let mut line = String::new();
        loop {
            line.clear();
            tokio::select! {
                _ = shutdown.recv() => break,
                read = reader.read_line(&mut line) => match read {
                    Ok(0) => {
                        debug!("Peer {} closed the connection", self.identity);
                        break;
                    }
                    Ok(_) => Self::process_line(&self, line.trim_end()),
                    Err(e) => {
                        warn!("Transport fault on connection to {}: {e}", self.identity);
                        break;
                    }
                },
            }
        }
        self.close().await;
    }

    /// Routes one decoded line: requests to dispatch, responses to the
    /// pending table, malformed frames to the salvage path.
    fn process_line(messenger: &Arc<Self>, line: &str) {
        if line.is_empty() {
            return;
        }
        match messenger.codec.decode(line) {
            Ok(Frame::Request(request)) => {
                // Dispatch on its own task: authentication and the receptor
                // may be slow, and responses already in flight must keep
                // routing underneath them.
                let this = messenger.clone();
                tokio::spawn(async move {
                    let response = this
                        .registry
                        .dispatch(request, this.identity.clone(), &this.authenticator)
                        .await;
                    if let Err(e) = this.write_frame(&Frame::Response(response)).await {
                        warn!("Failed to write response to {}: {e}", this.identity);
                        this.close().await;
                    }
                });
            }
            Ok(Frame::Response(response)) => messenger.complete(response),
            Err(e) => {
                warn!("Malformed frame from {}: {e}", messenger.identity);
                // Protocol faults never terminate the connection; when the
                // broken object still carries an id, answer it so the
                // remote caller's send resolves deterministically.
                if let Some(id) = salvage_id(line) {
                    let this = messenger.clone();
                    tokio::spawn(async move {
                        let response = Response::failure(
                            id,
                            failure::INVALID_FRAME,
                            "frame could not be decoded",
                        );
                        if let Err(e) = this.write_frame(&Frame::Response(response)).await {
                            debug!("Could not answer malformed frame: {e}");
                        }
                    });
                }
            }
        }
    }

    /// Completes the pending entry matching an inbound response.
    fn complete(&self, response: Response) {
        match self.pending.remove(&response.id()) {
            Some((_, sender)) => {
                if sender.send(response).is_err() {
                    debug!("Caller gave up on a request before its response arrived");
                }
            }
            // Late responses after a local timeout land here; never fatal.
            None => debug!(
                "Discarding response with no pending request: {}",
                response.id()
            ),
        }
    }
}

impl std::fmt::Debug for Messenger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Messenger")
            .field("state", &self.state())
            .field("identity", &self.identity)
            .field("pending", &self.pending.len())
            .finish()
    }
}
