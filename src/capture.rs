//! Captured request descriptors and body decoding.
//!
//! Every completed HTTP request or WebSocket handshake is turned into a
//! [`CapturedEvent`]. HTTP bodies are accumulated chunk by chunk and decoded
//! into a [`CapturedBody`], which distinguishes "nothing was sent" from
//! "something was sent but it was not JSON".

use axum::http::{HeaderMap, Method, Uri};
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use serde_json::Value;

use crate::error::MalformedBodyError;

/// Decoded HTTP request body.
#[derive(Debug, Clone, PartialEq)]
pub enum CapturedBody {
    /// The request carried no body bytes.
    Empty,
    /// The body decoded as JSON.
    Parsed(Value),
    /// The body was non-empty but not valid JSON (or exceeded the size limit).
    Malformed { raw: Bytes, error: String },
}

impl CapturedBody {
    /// Decode accumulated body bytes.
    pub fn decode(raw: Bytes) -> Self {
        if raw.is_empty() {
            return Self::Empty;
        }
        match serde_json::from_slice::<Value>(&raw) {
            Ok(value) => Self::Parsed(value),
            Err(e) => Self::Malformed {
                raw,
                error: e.to_string(),
            },
        }
    }

    /// The JSON value, `None` for an empty body, or an error for a malformed one.
    pub fn json(&self) -> Result<Option<&Value>, MalformedBodyError> {
        match self {
            Self::Empty => Ok(None),
            Self::Parsed(value) => Ok(Some(value)),
            Self::Malformed { raw, error } => Err(MalformedBodyError {
                raw_len: raw.len(),
                message: error.clone(),
            }),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed { .. })
    }

    /// Short label for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Parsed(_) => "json",
            Self::Malformed { .. } => "malformed",
        }
    }
}

/// A captured plain HTTP request.
#[derive(Debug, Clone)]
pub struct HttpCapture {
    /// Path and query exactly as requested.
    pub url: String,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: CapturedBody,
    pub received_at: DateTime<Utc>,
}

/// A captured WebSocket upgrade.
#[derive(Debug, Clone)]
pub struct WsCapture {
    /// Path and query of the upgrade request.
    pub url: String,
    pub headers: HeaderMap,
    pub received_at: DateTime<Utc>,
}

/// The unit delivered to an observer.
#[derive(Debug, Clone)]
pub enum CapturedEvent {
    Http(HttpCapture),
    WebSocket(WsCapture),
}

impl CapturedEvent {
    pub fn url(&self) -> &str {
        match self {
            Self::Http(http) => &http.url,
            Self::WebSocket(ws) => &ws.url,
        }
    }

    /// HTTP method; `None` for WebSocket captures.
    pub fn method(&self) -> Option<&Method> {
        match self {
            Self::Http(http) => Some(&http.method),
            Self::WebSocket(_) => None,
        }
    }

    /// Decoded body; `None` for WebSocket captures.
    pub fn body(&self) -> Option<&CapturedBody> {
        match self {
            Self::Http(http) => Some(&http.body),
            Self::WebSocket(_) => None,
        }
    }

    pub fn headers(&self) -> &HeaderMap {
        match self {
            Self::Http(http) => &http.headers,
            Self::WebSocket(ws) => &ws.headers,
        }
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        match self {
            Self::Http(http) => http.received_at,
            Self::WebSocket(ws) => ws.received_at,
        }
    }

    pub fn is_websocket(&self) -> bool {
        matches!(self, Self::WebSocket(_))
    }
}

/// Path and query of a request target, preserving a bare trailing `?`.
pub fn request_url(uri: &Uri) -> String {
    uri.path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string())
}

/// Concatenate body chunks in arrival order, stopping at `limit` bytes.
///
/// A stream error or an oversized body yields `Malformed` with whatever was
/// received so far.
pub async fn accumulate_body<S, E>(chunks: S, limit: usize) -> CapturedBody
where
    S: Stream<Item = Result<Bytes, E>>,
    E: std::fmt::Display,
{
    let mut chunks = std::pin::pin!(chunks);
    let mut buf = BytesMut::new();

    while let Some(chunk) = chunks.next().await {
        match chunk {
            Ok(data) => {
                if buf.len() + data.len() > limit {
                    buf.extend_from_slice(&data[..limit.saturating_sub(buf.len())]);
                    return CapturedBody::Malformed {
                        raw: buf.freeze(),
                        error: format!("body exceeds {limit} byte limit"),
                    };
                }
                buf.extend_from_slice(&data);
            }
            Err(e) => {
                return CapturedBody::Malformed {
                    raw: buf.freeze(),
                    error: format!("body stream failed: {e}"),
                };
            }
        }
    }

    CapturedBody::decode(buf.freeze())
}
