//! Lifecycle of the interception server: `Created → Listening → Closed`.
//!
//! ```rust,ignore
//! use mock_intercept::InterceptServer;
//!
//! let server = InterceptServer::new();
//! let addr = server.listen(0, |addr| println!("ready on {addr}")).await?;
//! let next = server.next_event()?;
//! // ... drive a request against `addr` ...
//! let event = next.await?;
//! server.close().await?;
//! ```

use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::{
    capture::CapturedEvent,
    config::{CaptureConfig, Config, ServerConfig},
    error::{display_addr, ServerError, ServerResult},
    intercept::{build_router, InterceptContext},
    observer::ObserverSlot,
};

/// Externally visible lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Created,
    Listening,
    Closed,
}

struct Running {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

enum Lifecycle {
    Created,
    /// `listen` is awaiting the bind.
    Binding,
    Listening(Running),
    Closed,
}

/// Holds a lifecycle in `Binding` until promoted to `Listening`.
///
/// Dropping it unpromoted puts the lifecycle back to `Created`.
struct BindingGuard<'a> {
    lifecycle: &'a Mutex<Lifecycle>,
    promoted: bool,
}

impl<'a> BindingGuard<'a> {
    fn new(lifecycle: &'a Mutex<Lifecycle>) -> Self {
        Self {
            lifecycle,
            promoted: false,
        }
    }

    fn promote(mut self, running: Running) {
        *self.lifecycle.lock() = Lifecycle::Listening(running);
        self.promoted = true;
    }
}

impl Drop for BindingGuard<'_> {
    fn drop(&mut self) {
        if self.promoted {
            return;
        }
        let mut lifecycle = self.lifecycle.lock();
        if matches!(*lifecycle, Lifecycle::Binding) {
            debug!("listen() did not complete, returning to Created");
            *lifecycle = Lifecycle::Created;
        }
    }
}

struct Inner {
    server: ServerConfig,
    capture: Arc<CaptureConfig>,
    slot: Arc<ObserverSlot>,
    lifecycle: Mutex<Lifecycle>,
}

/// Single-port HTTP and WebSocket interception server.
///
/// Cloning yields another handle to the same server.
#[derive(Clone)]
pub struct InterceptServer {
    inner: Arc<Inner>,
}

impl Default for InterceptServer {
    fn default() -> Self {
        Self::new()
    }
}

impl InterceptServer {
    /// Create a server with default configuration.
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default(), CaptureConfig::default())
    }

    pub fn with_config(server: ServerConfig, capture: CaptureConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                server,
                capture: Arc::new(capture),
                slot: Arc::new(ObserverSlot::new()),
                lifecycle: Mutex::new(Lifecycle::Created),
            }),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::with_config(config.server.clone(), config.capture.clone())
    }

    pub fn state(&self) -> LifecycleState {
        match &*self.inner.lifecycle.lock() {
            Lifecycle::Created | Lifecycle::Binding => LifecycleState::Created,
            Lifecycle::Listening(_) => LifecycleState::Listening,
            Lifecycle::Closed => LifecycleState::Closed,
        }
    }

    /// Bound address while listening.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &*self.inner.lifecycle.lock() {
            Lifecycle::Listening(running) => Some(running.addr),
            _ => None,
        }
    }

    /// Bind the configured host on `port` and start serving.
    ///
    /// Port `0` asks the OS for a free port. `on_ready` runs exactly once,
    /// after the socket is bound and accepting. A failed bind leaves the
    /// server in `Created` so the caller may try another port.
    pub async fn listen<F>(&self, port: u16, on_ready: F) -> ServerResult<SocketAddr>
    where
        F: FnOnce(SocketAddr) + Send,
    {
        {
            let mut lifecycle = self.inner.lifecycle.lock();
            match &*lifecycle {
                Lifecycle::Created => {}
                Lifecycle::Binding | Lifecycle::Listening(_) => {
                    return Err(ServerError::AlreadyListening)
                }
                Lifecycle::Closed => return Err(ServerError::Closed),
            }
            *lifecycle = Lifecycle::Binding;
        }
        // Resets to `Created` on error or if this future is dropped mid-bind.
        let binding = BindingGuard::new(&self.inner.lifecycle);

        let host = self.inner.server.host.as_str();
        let listener = TcpListener::bind((host, port))
            .await
            .map_err(|e| ServerError::bind(display_addr(host, port), e))?;
        let addr = listener.local_addr().map_err(ServerError::LocalAddr)?;

        let router = build_router(InterceptContext {
            slot: Arc::clone(&self.inner.slot),
            capture: Arc::clone(&self.inner.capture),
        });
        let (shutdown, shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    // A dropped sender also means shut down.
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = result {
                error!("Interception server on {} failed: {}", addr, e);
            }
        });

        binding.promote(Running {
            addr,
            shutdown,
            task,
        });
        info!("Interception server listening on http://{}", addr);

        on_ready(addr);
        Ok(addr)
    }

    /// Register `observer` for the next captured event.
    ///
    /// Only future events are captured. A pending observer is replaced and
    /// will never fire.
    pub fn test<F>(&self, observer: F) -> ServerResult<()>
    where
        F: FnOnce(CapturedEvent) + Send + 'static,
    {
        self.ensure_open()?;
        self.inner.slot.register(Box::new(observer));
        Ok(())
    }

    /// Register a channel for the next captured event.
    ///
    /// The receiver resolves with an error if this registration is replaced
    /// or the server is closed first.
    pub fn next_event(&self) -> ServerResult<oneshot::Receiver<CapturedEvent>> {
        self.ensure_open()?;
        let (rx, _) = self.inner.slot.register_channel();
        Ok(rx)
    }

    /// Stop accepting connections, release the socket and drop any pending
    /// observer. In-flight requests may be dropped.
    pub async fn close(&self) -> ServerResult<()> {
        let running = {
            let mut lifecycle = self.inner.lifecycle.lock();
            match std::mem::replace(&mut *lifecycle, Lifecycle::Closed) {
                Lifecycle::Listening(running) => running,
                Lifecycle::Closed => return Err(ServerError::Closed),
                previous => {
                    *lifecycle = previous;
                    return Err(ServerError::NotListening);
                }
            }
        };

        if self.inner.slot.clear() {
            debug!("Pending observer discarded on close");
        }

        let Running {
            addr,
            shutdown,
            mut task,
        } = running;
        // Serve task may already have exited.
        let _ = shutdown.send(());

        let grace = self.inner.server.shutdown_grace();
        if tokio::time::timeout(grace, &mut task).await.is_err() {
            warn!(
                "Connections on {} still open after {:?}, aborting",
                addr, grace
            );
            task.abort();
            let _ = task.await;
        }

        info!("Interception server on {} closed", addr);
        Ok(())
    }

    fn ensure_open(&self) -> ServerResult<()> {
        if matches!(*self.inner.lifecycle.lock(), Lifecycle::Closed) {
            return Err(ServerError::Closed);
        }
        Ok(())
    }
}

impl std::fmt::Debug for InterceptServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptServer")
            .field("state", &self.state())
            .field("local_addr", &self.local_addr())
            .field("slot", &self.inner.slot)
            .finish()
    }
}
