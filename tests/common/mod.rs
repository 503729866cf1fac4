//! Shared test utilities for interception server tests.
//!
//! - Server startup on an ephemeral port
//! - Bounded waits on captured events
//! - Raw HTTP writes for chunk-level control

#![allow(dead_code)]

use mock_intercept::config::{CaptureConfig, ServerConfig};
use mock_intercept::{CapturedEvent, InterceptServer};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;

/// Upper bound for any single wait in these tests.
pub const WAIT: Duration = Duration::from_secs(5);

/// Start a default server on a free port.
pub async fn start_server() -> (InterceptServer, SocketAddr) {
    start_server_with(CaptureConfig::default()).await
}

/// Start a server with custom capture settings on a free port.
pub async fn start_server_with(capture: CaptureConfig) -> (InterceptServer, SocketAddr) {
    let server = InterceptServer::with_config(ServerConfig::default(), capture);
    let addr = server
        .listen(0, |_| {})
        .await
        .expect("Failed to start interception server");
    (server, addr)
}

/// Wait for a registered observer channel to fire.
pub async fn expect_event(rx: oneshot::Receiver<CapturedEvent>) -> CapturedEvent {
    tokio::time::timeout(WAIT, rx)
        .await
        .expect("Timeout waiting for captured event")
        .expect("Observer was dropped without firing")
}

/// Assert that a registered observer does not fire within `within`.
pub async fn expect_no_event(rx: &mut oneshot::Receiver<CapturedEvent>, within: Duration) {
    match tokio::time::timeout(within, rx).await {
        Err(_) | Ok(Err(_)) => {}
        Ok(Ok(event)) => panic!("Unexpected event captured: {:?}", event),
    }
}

/// Send a raw HTTP/1.1 request whose body is written in separate chunks,
/// with a short pause between writes, and return the response status line.
pub async fn send_chunked_body(addr: SocketAddr, path: &str, chunks: &[&str]) -> String {
    let mut stream = TcpStream::connect(addr).await.expect("Failed to connect");
    let head = format!(
        "POST {path} HTTP/1.1\r\nHost: {addr}\r\nContent-Type: application/json\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n"
    );
    stream.write_all(head.as_bytes()).await.unwrap();

    for chunk in chunks {
        let framed = format!("{:x}\r\n{}\r\n", chunk.len(), chunk);
        stream.write_all(framed.as_bytes()).await.unwrap();
        stream.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    stream.write_all(b"0\r\n\r\n").await.unwrap();

    read_status_line(&mut stream).await
}

/// Send a raw request line and headers without a body.
pub async fn send_raw_get(addr: SocketAddr, target: &str) -> String {
    send_raw_request(addr, "GET", target).await
}

/// Send a bodiless request line verbatim and return the response status line.
pub async fn send_raw_request(addr: SocketAddr, method: &str, target: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.expect("Failed to connect");
    let request =
        format!("{method} {target} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();
    read_status_line(&mut stream).await
}

async fn read_status_line(stream: &mut TcpStream) -> String {
    let mut response = Vec::new();
    tokio::time::timeout(WAIT, stream.read_to_end(&mut response))
        .await
        .expect("Timeout waiting for response")
        .expect("Failed to read response");
    String::from_utf8_lossy(&response)
        .lines()
        .next()
        .unwrap_or_default()
        .to_string()
}
