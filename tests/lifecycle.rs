//! Observer registration and server lifecycle tests.

mod common;

use common::{expect_event, expect_no_event, start_server};
use futures::future::join_all;
use futures::StreamExt;
use mock_intercept::{InterceptServer, LifecycleState, ServerError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::connect_async;

/// Register an observer that counts calls and records the delivered urls.
fn counting_observer(server: &InterceptServer) -> (Arc<AtomicUsize>, Arc<Mutex<Vec<String>>>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let urls = Arc::new(Mutex::new(Vec::new()));
    let (counter, seen) = (Arc::clone(&hits), Arc::clone(&urls));
    server
        .test(move |event| {
            counter.fetch_add(1, Ordering::SeqCst);
            seen.lock().push(event.url().to_string());
        })
        .unwrap();
    (hits, urls)
}

#[tokio::test]
async fn test_each_registration_fires_exactly_once() {
    let (server, addr) = start_server().await;
    let client = reqwest::Client::new();
    let hits = Arc::new(AtomicUsize::new(0));

    for i in 0..3 {
        let counter = Arc::clone(&hits);
        let (tx, rx) = tokio::sync::oneshot::channel();
        server
            .test(move |event| {
                counter.fetch_add(1, Ordering::SeqCst);
                let _ = tx.send(event.url().to_string());
            })
            .unwrap();

        client.get(format!("http://{addr}/n/{i}")).send().await.unwrap();
        let url = tokio::time::timeout(common::WAIT, rx).await.unwrap().unwrap();
        assert_eq!(url, format!("/n/{i}"));

        // A second request with no new registration must not re-fire.
        client.get(format!("http://{addr}/extra")).send().await.unwrap();
    }

    assert_eq!(hits.load(Ordering::SeqCst), 3);
    server.close().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_fire_one_registration_once() {
    let (server, addr) = start_server().await;
    let client = reqwest::Client::new();
    let (hits, urls) = counting_observer(&server);

    let sent: Vec<String> = (0..16).map(|i| format!("/race/{i}")).collect();
    let responses = join_all(
        sent.iter()
            .map(|path| client.post(format!("http://{addr}{path}")).body("{\"n\":1}").send()),
    )
    .await;

    for response in responses {
        assert_eq!(response.expect("request failed").status(), reqwest::StatusCode::OK);
    }
    // Delivery happens before the 200 is written, so the count is final here.
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    let delivered = urls.lock().clone();
    assert_eq!(delivered.len(), 1);
    assert!(sent.contains(&delivered[0]), "unexpected url {}", delivered[0]);

    server.close().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_http_and_websocket_race_for_one_registration() {
    let (server, addr) = start_server().await;
    let client = reqwest::Client::new();
    let (hits, urls) = counting_observer(&server);

    let (http, ws) = tokio::join!(
        client.get(format!("http://{addr}/race/http")).send(),
        connect_async(format!("ws://{addr}/race/ws")),
    );
    assert_eq!(http.expect("HTTP request failed").status(), reqwest::StatusCode::OK);

    // The placeholder frame follows the WebSocket delivery attempt.
    let (ws, _) = ws.expect("Failed to connect");
    let (_write, mut read) = ws.split();
    tokio::time::timeout(common::WAIT, read.next())
        .await
        .expect("Timeout waiting for placeholder")
        .expect("No message received")
        .expect("WebSocket error");

    assert_eq!(hits.load(Ordering::SeqCst), 1);
    let delivered = urls.lock().clone();
    assert!(
        delivered == ["/race/http"] || delivered == ["/race/ws"],
        "unexpected deliveries {delivered:?}"
    );

    server.close().await.unwrap();
}

#[tokio::test]
async fn test_second_registration_replaces_first() {
    let (server, addr) = start_server().await;

    let mut first = server.next_event().unwrap();
    let second = server.next_event().unwrap();

    reqwest::get(format!("http://{addr}/api/topology?")).await.unwrap();

    let event = expect_event(second).await;
    assert_eq!(event.url(), "/api/topology?");
    expect_no_event(&mut first, Duration::from_millis(100)).await;

    server.close().await.unwrap();
}

#[tokio::test]
async fn test_events_before_registration_are_not_replayed() {
    let (server, addr) = start_server().await;

    reqwest::get(format!("http://{addr}/missed")).await.unwrap();

    let rx = server.next_event().unwrap();
    reqwest::get(format!("http://{addr}/seen")).await.unwrap();
    assert_eq!(expect_event(rx).await.url(), "/seen");

    server.close().await.unwrap();
}

#[tokio::test]
async fn test_registration_before_listen_captures_first_event() {
    let server = InterceptServer::new();
    let rx = server.next_event().unwrap();
    let addr = server.listen(0, |_| {}).await.unwrap();

    reqwest::get(format!("http://{addr}/scoped/api/topology?")).await.unwrap();
    assert_eq!(expect_event(rx).await.url(), "/scoped/api/topology?");

    server.close().await.unwrap();
}

#[tokio::test]
async fn test_close_releases_the_socket() {
    let (server, addr) = start_server().await;
    assert_eq!(server.state(), LifecycleState::Listening);

    server.close().await.unwrap();
    assert_eq!(server.state(), LifecycleState::Closed);

    assert!(TcpStream::connect(addr).await.is_err());

    // The port is free for a fresh instance.
    let replacement = InterceptServer::new();
    replacement.listen(addr.port(), |_| {}).await.unwrap();
    replacement.close().await.unwrap();
}

#[tokio::test]
async fn test_usage_errors_fail_fast() {
    let server = InterceptServer::new();
    let err = server.close().await.unwrap_err();
    assert!(matches!(err, ServerError::NotListening));
    assert!(err.is_usage_error());

    server.listen(0, |_| {}).await.unwrap();
    assert!(matches!(
        server.listen(0, |_| {}).await,
        Err(ServerError::AlreadyListening)
    ));

    server.close().await.unwrap();
    assert!(matches!(server.listen(0, |_| {}).await, Err(ServerError::Closed)));
    assert!(matches!(server.test(|_| {}), Err(ServerError::Closed)));
    assert!(matches!(server.next_event(), Err(ServerError::Closed)));
}

#[tokio::test]
async fn test_on_ready_called_once_with_bound_addr() {
    let server = InterceptServer::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let addr = server
        .listen(0, move |addr| {
            assert_ne!(addr.port(), 0);
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(server.local_addr(), Some(addr));
    server.close().await.unwrap();
}
