//! Error types for the interception server.
//!
//! Usage errors (`listen` twice, `close` before `listen`, anything after
//! `close`) are returned eagerly so a broken harness fails loudly instead
//! of waiting on an observer that will never fire.

use std::net::SocketAddr;
use thiserror::Error;

/// A specialized `Result` type for server lifecycle operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors raised by [`crate::InterceptServer`] lifecycle operations.
#[derive(Debug, Error)]
pub enum ServerError {
    /// `listen` was called on a server that is already listening.
    #[error("server is already listening; create a new instance to bind another port")]
    AlreadyListening,

    /// `close` was called before `listen`.
    #[error("server is not listening; call listen() before close()")]
    NotListening,

    /// The server has been closed and cannot be reused.
    #[error("server has been closed and cannot be reused")]
    Closed,

    /// Binding the listening socket failed.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The bound listener could not report its address.
    #[error("failed to read local address of listener: {0}")]
    LocalAddr(#[source] std::io::Error),
}

impl ServerError {
    /// Create a bind error for the given address.
    pub fn bind(addr: impl ToString, source: std::io::Error) -> Self {
        Self::Bind {
            addr: addr.to_string(),
            source,
        }
    }

    /// Returns true for errors caused by calling the API in the wrong state.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::AlreadyListening | Self::NotListening | Self::Closed
        )
    }
}

/// A non-empty HTTP body that could not be decoded as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed request body ({raw_len} bytes): {message}")]
pub struct MalformedBodyError {
    /// Number of raw bytes received.
    pub raw_len: usize,
    /// Decoder message.
    pub message: String,
}

/// Address used in bind errors when only a host and port are known.
pub(crate) fn display_addr(host: &str, port: u16) -> String {
    match host.parse::<std::net::IpAddr>() {
        Ok(ip) => SocketAddr::new(ip, port).to_string(),
        Err(_) => format!("{host}:{port}"),
    }
}
