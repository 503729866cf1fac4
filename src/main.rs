use clap::Parser;
use mock_intercept::config::{ConfigLoader, LogFormat};
use mock_intercept::{CapturedEvent, Config, InterceptServer, ServerResult};
use std::path::PathBuf;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    version,
    about = "Single-port HTTP and WebSocket interception server for integration tests.",
    long_about = "Accepts any HTTP request or WebSocket upgrade on one loopback port, acknowledges it, and logs what was captured. Useful for watching which URLs a client under test actually hits."
)]
struct Args {
    /// Port to listen on (0 picks a free port).
    #[arg(short, long)]
    port: Option<u16>,

    /// Host address to bind.
    #[arg(long)]
    host: Option<String>,

    /// Explicit configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set.
    #[arg(long)]
    log_level: Option<String>,
}

// --- Main Application Entry Point ---
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ConfigLoader::load_from(path)?.into_config(),
        None => ConfigLoader::load()?.into_config(),
    };
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(level) = args.log_level {
        config.server.log_level = level;
    }

    init_tracing(&config);

    let server = InterceptServer::from_config(&config);
    let (tx, mut rx) = mpsc::unbounded_channel::<CapturedEvent>();
    arm(&server, tx)?;

    server
        .listen(config.server.port, |addr| {
            info!("Mock interception server ready on http://{}", addr);
        })
        .await?;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            Some(event) = rx.recv() => {
                log_event(&event);
            }
            _ = &mut shutdown => break,
        }
    }

    server.close().await?;
    Ok(())
}

/// Register an observer that forwards the next event and re-registers itself.
fn arm(server: &InterceptServer, tx: mpsc::UnboundedSender<CapturedEvent>) -> ServerResult<()> {
    let next = server.clone();
    server.test(move |event| {
        if tx.send(event).is_ok() {
            // Fails only once the server is closed.
            let _ = arm(&next, tx);
        }
    })
}

fn log_event(event: &CapturedEvent) {
    match event {
        CapturedEvent::Http(http) => match http.body.json() {
            Ok(Some(body)) => info!(method = %http.method, url = %http.url, %body, "HTTP"),
            Ok(None) => info!(method = %http.method, url = %http.url, "HTTP (empty body)"),
            Err(e) => warn!(method = %http.method, url = %http.url, "HTTP with {}", e),
        },
        CapturedEvent::WebSocket(ws) => info!(url = %ws.url, "WebSocket"),
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match config.logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Pretty => builder.pretty().init(),
    }
}

// --- Graceful Shutdown Handler ---
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Signal received, starting graceful shutdown...");
}
