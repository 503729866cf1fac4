//! Mock Interception Server Library
//!
//! A single-port test double that accepts plain HTTP requests and WebSocket
//! upgrades, captures each one and hands it to exactly one registered
//! one-shot observer.
//!
//! # Modules
//!
//! - `config`: Configuration management with TOML support
//! - `error`: Lifecycle and body decoding errors
//! - `capture`: Captured event descriptors and body buffering
//! - `observer`: Single-slot observer mailbox
//! - `intercept`: HTTP routing and request capture
//! - `websocket`: WebSocket handshake capture
//! - `server`: Listen / test / close lifecycle

pub mod capture;
pub mod config;
pub mod error;
pub mod intercept;
pub mod observer;
pub mod server;
pub mod websocket;

// Re-export commonly used types for convenience
pub use capture::{CapturedBody, CapturedEvent, HttpCapture, WsCapture};
pub use error::{MalformedBodyError, ServerError, ServerResult};
pub use observer::{Delivery, Observer, ObserverSlot};
pub use server::{InterceptServer, LifecycleState};

// Re-export config types
pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};
