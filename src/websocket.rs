//! WebSocket side of the interception server.
//!
//! Each completed upgrade is captured, acknowledged with a single JSON text
//! frame and then closed from the server side. There is no duplex session.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        WebSocketUpgrade,
    },
    http::request::Parts,
    response::Response,
};
use chrono::Utc;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::{
    capture::{request_url, CapturedEvent, WsCapture},
    intercept::InterceptContext,
};

/// How long to wait for the client to answer our Close frame.
const CLOSE_ACK_TIMEOUT: Duration = Duration::from_secs(1);

/// Complete the handshake and schedule capture of the connection.
pub(crate) fn upgrade(ws: WebSocketUpgrade, parts: Parts, ctx: InterceptContext) -> Response {
    let capture = WsCapture {
        url: request_url(&parts.uri),
        headers: parts.headers,
        received_at: Utc::now(),
    };

    ws.on_failed_upgrade(|e| error!("WebSocket upgrade failed: {}", e))
        .on_upgrade(move |socket| handle_socket(socket, capture, ctx))
}

async fn handle_socket(mut socket: WebSocket, capture: WsCapture, ctx: InterceptContext) {
    let client_id = uuid::Uuid::new_v4();
    info!(url = %capture.url, "WebSocket client connected: {}", client_id);

    let outcome = ctx.slot.deliver(CapturedEvent::WebSocket(capture));
    debug!(?outcome, "WebSocket capture handled for {}", client_id);

    let placeholder = ctx.capture.ws_placeholder.clone();
    if let Err(e) = socket.send(Message::Text(placeholder.into())).await {
        error!("Failed to send placeholder to {}: {}", client_id, e);
        return;
    }

    if let Err(e) = socket.send(Message::Close(None)).await {
        debug!("Failed to send close frame to {}: {}", client_id, e);
        return;
    }

    // Drain until the client acknowledges the close or goes away.
    let drained = tokio::time::timeout(CLOSE_ACK_TIMEOUT, async {
        while let Some(msg) = socket.recv().await {
            match msg {
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(_) => {}
            }
        }
    })
    .await;

    if drained.is_err() {
        debug!("Client {} did not acknowledge close in time", client_id);
    }
    info!("WebSocket handler finished for {}", client_id);
}
