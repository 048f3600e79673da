//! Integration tests for the messaging core.
//!
//! These tests run real client/server pairs over localhost sockets and
//! verify the end-to-end protocol properties: correlation, dispatch,
//! authentication, timeouts, and close/liveness behavior.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};

use lattice_net::{
    failure, AllowAll, Authenticator, CallerIdentity, ConnectionState, Messenger,
    MessengerServer, NetError, ReceptorRegistry, Request, Response,
};

/// Registry with an `echo` receptor plus a `slow` one that answers after
/// the given delay.
fn test_registry(slow_delay: Duration) -> Arc<ReceptorRegistry> {
    let registry = Arc::new(ReceptorRegistry::new());
    registry
        .register_fn("echo", |request, _caller| async move {
            let text = request.parameter("text").cloned().unwrap_or(json!(null));
            Ok(Response::ok(request.id(), text))
        })
        .unwrap();
    registry
        .register_fn("slow", move |request, _caller| async move {
            sleep(slow_delay).await;
            Ok(Response::ok(request.id(), json!("finally")))
        })
        .unwrap();
    registry
}

async fn start_server(registry: Arc<ReceptorRegistry>) -> Arc<MessengerServer> {
    MessengerServer::bind("127.0.0.1:0".parse().unwrap(), registry, Arc::new(AllowAll))
        .await
        .expect("failed to bind test server")
}

#[tokio::test(flavor = "multi_thread")]
async fn echo_round_trip_with_matching_id() {
    let server = start_server(test_registry(Duration::from_millis(200))).await;
    let client = Messenger::connect(server.local_addr()).await.unwrap();

    let request = Request::new("echo").with_parameter("text", json!("hi"));
    let id = request.id();
    let response = client
        .send(request, Duration::from_secs(5))
        .await
        .expect("echo should resolve");

    assert_eq!(response.id(), id);
    assert_eq!(response.result(), Some(&json!("hi")));

    client.close().await;
    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_method_resolves_to_failure() {
    let server = start_server(test_registry(Duration::from_millis(200))).await;
    let client = Messenger::connect(server.local_addr()).await.unwrap();

    let response = client
        .send(Request::new("no_such_method"), Duration::from_secs(5))
        .await
        .expect("unknown methods still resolve");

    let error = response.error().expect("must be a failure, never a success");
    assert_eq!(error.kind, failure::UNKNOWN_METHOD);

    client.close().await;
    server.shutdown().await;
}

/// Authenticator that only accepts requests carrying the right token.
struct TokenAuthenticator;

#[async_trait]
impl Authenticator for TokenAuthenticator {
    async fn is_authenticated(&self, _caller: &CallerIdentity, request: &Request) -> bool {
        request.parameter("token") == Some(&json!("secret"))
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn rejected_caller_gets_unauthenticated_and_receptor_never_runs() {
    let invocations = Arc::new(AtomicUsize::new(0));
    let registry = Arc::new(ReceptorRegistry::new());
    let counter = invocations.clone();
    registry
        .register_fn("guarded", move |request, _caller| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Response::ok(request.id(), json!("allowed")))
            }
        })
        .unwrap();

    let server = MessengerServer::bind(
        "127.0.0.1:0".parse().unwrap(),
        registry,
        Arc::new(TokenAuthenticator),
    )
    .await
    .unwrap();
    let client = Messenger::connect(server.local_addr()).await.unwrap();

    let rejected = client
        .send(Request::new("guarded"), Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(rejected.error().unwrap().kind, failure::UNAUTHENTICATED);
    assert_eq!(invocations.load(Ordering::SeqCst), 0);

    // The same connection stays usable and an authenticated call goes through.
    let accepted = client
        .send(
            Request::new("guarded").with_parameter("token", json!("secret")),
            Duration::from_secs(5),
        )
        .await
        .unwrap();
    assert_eq!(accepted.result(), Some(&json!("allowed")));
    assert_eq!(invocations.load(Ordering::SeqCst), 1);

    client.close().await;
    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_sends_never_cross_deliver() {
    // The first request answers slower than the second, so the responses
    // arrive back-to-back in reversed order on the read loop.
    let registry = Arc::new(ReceptorRegistry::new());
    registry
        .register_fn("tagged_echo", |request, _caller| async move {
            let delay = request
                .parameter("delay_ms")
                .and_then(|v| v.as_u64())
                .unwrap_or(0);
            sleep(Duration::from_millis(delay)).await;
            let tag = request.parameter("tag").cloned().unwrap_or(json!(null));
            Ok(Response::ok(request.id(), tag))
        })
        .unwrap();

    let server = start_server(registry).await;
    let client = Messenger::connect(server.local_addr()).await.unwrap();

    let first = Request::new("tagged_echo")
        .with_parameter("tag", json!("first"))
        .with_parameter("delay_ms", json!(100));
    let second = Request::new("tagged_echo")
        .with_parameter("tag", json!("second"))
        .with_parameter("delay_ms", json!(10));
    let first_id = first.id();
    let second_id = second.id();

    let (first_response, second_response) = tokio::join!(
        client.send(first, Duration::from_secs(5)),
        client.send(second, Duration::from_secs(5)),
    );
    let first_response = first_response.unwrap();
    let second_response = second_response.unwrap();

    assert_eq!(first_response.id(), first_id);
    assert_eq!(first_response.result(), Some(&json!("first")));
    assert_eq!(second_response.id(), second_id);
    assert_eq!(second_response.result(), Some(&json!("second")));

    client.close().await;
    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn short_timeout_resolves_early_and_late_response_is_discarded() {
    let server = start_server(test_registry(Duration::from_millis(200))).await;
    let client = Messenger::connect(server.local_addr()).await.unwrap();

    let started = Instant::now();
    let result = client
        .send(Request::new("slow"), Duration::from_millis(50))
        .await;
    let elapsed = started.elapsed();

    assert!(matches!(result, Err(NetError::Timeout)));
    assert!(
        elapsed < Duration::from_millis(150),
        "timeout should fire at ~50ms, took {elapsed:?}"
    );

    // Let the late response arrive; the read loop discards it.
    sleep(Duration::from_millis(300)).await;
    assert_eq!(client.pending_count(), 0);

    // A subsequent unrelated send is unaffected.
    let response = client
        .send(
            Request::new("echo").with_parameter("text", json!("still alive")),
            Duration::from_secs(5),
        )
        .await
        .unwrap();
    assert_eq!(response.result(), Some(&json!("still alive")));

    client.close().await;
    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn close_is_idempotent() {
    let server = start_server(test_registry(Duration::from_millis(200))).await;
    let client = Messenger::connect(server.local_addr()).await.unwrap();
    assert_eq!(client.state(), ConnectionState::Open);

    client.close().await;
    assert_eq!(client.state(), ConnectionState::Closed);

    // Closing again is a no-op, not a fault.
    client.close().await;
    client.close().await;
    assert_eq!(client.state(), ConnectionState::Closed);

    assert!(matches!(
        client.send(Request::new("echo"), Duration::from_secs(1)).await,
        Err(NetError::ConnectionClosed)
    ));

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn all_pending_sends_resolve_when_the_connection_closes() {
    // Receptors that stall far longer than the test guard, so only the
    // close can resolve the pending sends.
    let server = start_server(test_registry(Duration::from_secs(30))).await;
    let client = Messenger::connect(server.local_addr()).await.unwrap();

    let mut waiters = Vec::new();
    for _ in 0..5 {
        let client = client.clone();
        waiters.push(tokio::spawn(async move {
            client
                .send(Request::new("slow"), Duration::from_secs(30))
                .await
        }));
    }

    // Let every send register its pending entry before closing.
    while client.pending_count() < 5 {
        sleep(Duration::from_millis(10)).await;
    }
    client.close().await;

    let outcomes = timeout(Duration::from_secs(2), futures::future::join_all(waiters))
        .await
        .expect("pending sends must resolve within a bounded time after close");
    assert_eq!(outcomes.len(), 5);
    for outcome in outcomes {
        assert!(matches!(
            outcome.expect("send task must not panic"),
            Err(NetError::ConnectionClosed)
        ));
    }

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn server_shutdown_closes_every_session() {
    let server = start_server(test_registry(Duration::from_millis(200))).await;
    let first = Messenger::connect(server.local_addr()).await.unwrap();
    let second = Messenger::connect(server.local_addr()).await.unwrap();

    // Both sessions are live and answering.
    for client in [&first, &second] {
        client
            .send(
                Request::new("echo").with_parameter("text", json!("hello")),
                Duration::from_secs(5),
            )
            .await
            .unwrap();
    }
    assert_eq!(server.session_count(), 2);

    server.shutdown().await;
    // Idempotent, like Messenger::close.
    server.shutdown().await;

    // The clients observe the closure within a bounded time.
    timeout(Duration::from_secs(2), first.closed())
        .await
        .expect("first client should observe the shutdown");
    timeout(Duration::from_secs(2), second.closed())
        .await
        .expect("second client should observe the shutdown");
    assert_eq!(server.session_count(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn send_expect_decodes_typed_results() {
    let registry = Arc::new(ReceptorRegistry::new());
    registry
        .register_fn("stats", |request, _caller| async move {
            Ok(Response::ok(
                request.id(),
                json!({"sessions": 3, "name": "lattice"}),
            ))
        })
        .unwrap();

    let server = start_server(registry).await;
    let client = Messenger::connect(server.local_addr()).await.unwrap();

    #[derive(serde::Deserialize)]
    struct Stats {
        sessions: u32,
        name: String,
    }

    let stats: Stats = client
        .send_expect(Request::new("stats"), Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(stats.sessions, 3);
    assert_eq!(stats.name, "lattice");

    // A failure response surfaces as a typed failure, not a decode attempt.
    let missing: Result<Stats, NetError> = client
        .send_expect(Request::new("absent"), Duration::from_secs(5))
        .await;
    assert!(matches!(
        missing,
        Err(NetError::ResponseFailure { kind, .. }) if kind == failure::UNKNOWN_METHOD
    ));

    client.close().await;
    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_frames_are_answered_when_their_id_is_recoverable() {
    let server = start_server(test_registry(Duration::from_millis(200))).await;

    // A raw socket speaking broken JSON: `method` must be a string.
    let stream = TcpStream::connect(server.local_addr()).await.unwrap();
    let (read_half, mut write_half) = stream.into_split();
    let id = uuid::Uuid::new_v4();
    let broken = format!("{{\"id\":\"{id}\",\"method\":12}}\n");
    write_half.write_all(broken.as_bytes()).await.unwrap();

    let mut reader = BufReader::new(read_half);
    let mut line = String::new();
    timeout(Duration::from_secs(2), reader.read_line(&mut line))
        .await
        .expect("the broken frame must still be answered")
        .unwrap();

    let response: Response = serde_json::from_str(line.trim_end()).unwrap();
    assert_eq!(response.id(), id);
    assert_eq!(response.error().unwrap().kind, failure::INVALID_FRAME);

    // The connection survives the protocol fault: a well-formed request on
    // the same socket still gets its echo.
    let request = Request::new("echo").with_parameter("text", json!("ok"));
    let mut bytes = serde_json::to_vec(&request).unwrap();
    bytes.push(b'\n');
    write_half.write_all(&bytes).await.unwrap();

    line.clear();
    timeout(Duration::from_secs(2), reader.read_line(&mut line))
        .await
        .expect("the follow-up request must be answered")
        .unwrap();
    let response: Response = serde_json::from_str(line.trim_end()).unwrap();
    assert_eq!(response.id(), request.id());
    assert_eq!(response.result(), Some(&json!("ok")));

    server.shutdown().await;
}
