//! library-search: federated search across library catalogs
//!
//! This is the main entry point for the application.

use anyhow::{Context, Result};
use clap::Parser;
use library_search::{
    backends::BackendLoader,
    config,
    metrics::Metrics,
    network::HttpClient,
    web::{create_router, AppState},
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "library-search",
    about = "Federated search across library catalogs, book shops and e-lending portals",
    version,
    after_help = "Environment variables:\n  \
        LIBSEARCH_SETTINGS_PATH      Path to settings.yml\n  \
        LIBSEARCH_DEBUG              Enable debug logging (true/false)\n  \
        LIBSEARCH_PORT               Server port\n  \
        LIBSEARCH_BIND_ADDRESS       Bind address\n  \
        LIBSEARCH_DEADLINE           Overall search deadline in seconds\n  \
        LIBSEARCH_DIAGNOSTICS_DIR    Where failed scrapes are captured (empty disables)\n  \
        LIBSEARCH_HEADLESS           Run the browser headless (true/false)\n  \
        LIBSEARCH_CHROME_EXECUTABLE  Chromium binary to launch\n  \
        LIBSEARCH_<BACKEND>_USERNAME / _PASSWORD  Backend credentials"
)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let settings = match args.config {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("settings file {} does not exist", path.display());
            }
            config::load_from(Some(path))?
        }
        None => config::load()?,
    };

    // Initialize logging; RUST_LOG wins over the configured level
    let default_level = if settings.general.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    info!("Starting library-search v{}", library_search::VERSION);
    info!("Loaded configuration for instance: {}", settings.general.instance_name);

    // Initialize HTTP client
    let client = HttpClient::with_settings(&settings.outgoing)?;

    // Load backends
    let metrics = Arc::new(Metrics::new());
    let registry = BackendLoader::new(&settings, client)
        .with_metrics(metrics.clone())
        .load(&settings);
    let registry = Arc::new(registry);
    if registry.is_empty() {
        warn!("No backends enabled, every search will report unsupported libraries");
    }

    // Bind address
    let addr = SocketAddr::new(
        settings
            .server
            .bind_address
            .parse()
            .with_context(|| format!("invalid bind address {}", settings.server.bind_address))?,
        settings.server.port,
    );

    // Create application state and router
    let state = AppState::new(settings, registry.clone(), metrics);
    let app = create_router(state);

    info!("Starting server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // browser sessions outlive requests; close them before exiting
    info!("Shutting down backends");
    registry.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Cannot listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
