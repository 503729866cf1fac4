//! HTTP surface of the interception server.
//!
//! A single fallback handler answers every method and path. WebSocket
//! handshakes are handed to [`crate::websocket`]; everything else has its
//! body buffered, decoded, captured and acknowledged with an empty 200.
//!
//! `CONNECT` is never captured as plain HTTP: over HTTP/2 it is the RFC 8441
//! WebSocket handshake, and anything `WebSocketUpgrade` refuses gets its
//! rejection response.

use axum::{
    extract::{FromRequestParts, Request, State as AxumState, WebSocketUpgrade},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{
    capture::{accumulate_body, request_url, CapturedEvent, HttpCapture},
    config::{CaptureConfig, MalformedBodyPolicy},
    observer::ObserverSlot,
};

/// State shared by every connection of one server instance.
#[derive(Clone)]
pub struct InterceptContext {
    pub slot: Arc<ObserverSlot>,
    pub capture: Arc<CaptureConfig>,
}

// ---------- Router Builder ----------
pub fn build_router(ctx: InterceptContext) -> Router {
    Router::new().fallback(intercept).with_state(ctx)
}

/// True when the request should be negotiated as a WebSocket.
///
/// HTTP/1.1 asks with `Connection: upgrade` and `Upgrade: websocket`.
/// HTTP/2 uses extended `CONNECT`, whose `:protocol` pseudo-header only
/// `WebSocketUpgrade` can see, so every `CONNECT` is passed along to it.
pub fn is_websocket_handshake(method: &Method, headers: &HeaderMap) -> bool {
    if method == Method::CONNECT {
        return true;
    }


    let connection_upgrade = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"));

    let upgrade_websocket = headers
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().eq_ignore_ascii_case("websocket"))
        .unwrap_or(false);

    connection_upgrade && upgrade_websocket
}

// ---------- Handlers ----------
async fn intercept(AxumState(ctx): AxumState<InterceptContext>, req: Request) -> Response {
    if is_websocket_handshake(req.method(), req.headers()) {
        let (mut parts, _body) = req.into_parts();
        return match WebSocketUpgrade::from_request_parts(&mut parts, &ctx).await {
            Ok(ws) => crate::websocket::upgrade(ws, parts, ctx),
            Err(rejection) => {
                warn!(uri = %parts.uri, "Rejected WebSocket handshake: {}", rejection);
                rejection.into_response()
            }
        };
    }

    let (parts, body) = req.into_parts();
    let url = request_url(&parts.uri);
    let body = accumulate_body(body.into_data_stream(), ctx.capture.max_body_bytes).await;

    info!(method = %parts.method, url = %url, body = body.kind(), "Captured HTTP request");

    if let Some(message) = body.json().err() {
        match ctx.capture.malformed_body {
            MalformedBodyPolicy::Deliver => {
                warn!(url = %url, "{}; delivering raw body", message);
            }
            MalformedBodyPolicy::Drop => {
                warn!(url = %url, "{}; capture dropped", message);
                return StatusCode::OK.into_response();
            }
        }
    }

    let event = CapturedEvent::Http(HttpCapture {
        url,
        method: parts.method,
        headers: parts.headers,
        body,
        received_at: Utc::now(),
    });
    let outcome = ctx.slot.deliver(event);
    debug!(?outcome, "HTTP capture handled");

    StatusCode::OK.into_response()
}
