//! depot server binary
//!
//! Loads configuration, refuses to start without an access key, prepares the
//! storage root and serves the HTTP API.
//!
//! ```bash
//! ACCESS_KEY=s3cret depot --storage-root /data --port 8080
//!
//! curl -X PUT "http://localhost:8080/upload?access_key=s3cret" \
//!   -F 'meta={"organization":"acme","project":"widgets","type":"icons"}' \
//!   -F 'file=@logo.png'
//!
//! curl -o logo.png "http://localhost:8080/download?access_key=s3cret&organization=acme&project=widgets&type=icons"
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use depot_artifact::{ArtifactStore, FileSystemArtifactStore};
use depot_core::DepotConfig;
use depot_server::{AppState, create_router};
use depot_telemetry::{flush_telemetry, init_telemetry};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "depot", version, about = "Versioned artifact store")]
struct Args {
    /// Path to a config file (defaults to config.toml in the current directory or a parent)
    #[arg(short, long, env = "DEPOT_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Directory artifacts are stored under
    #[arg(long)]
    storage_root: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut config = DepotConfig::load_from(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(root) = args.storage_root {
        config.storage.root = root;
    }

    init_telemetry(
        &config.observability.service_name,
        config.observability.log_format,
    )
    .context("Failed to initialize telemetry")?;

    // Fatal: an unset secret would otherwise leave downloads unreachable or open
    if let Err(e) = config.access_key() {
        tracing::error!("{}", e);
        return Err(e);
    }

    let store = FileSystemArtifactStore::new(&config.storage.root, config.storage.latest_policy);
    store
        .prepare()
        .await
        .with_context(|| format!("Failed to prepare storage root {:?}", config.storage.root))?;
    let store: Arc<dyn ArtifactStore> = Arc::new(store);

    let state = AppState::from_config(&config, store)?;
    let app = create_router(state);

    let address = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;

    tracing::info!(
        address = %listener.local_addr()?,
        root = %config.storage.root.display(),
        latest_policy = ?config.storage.latest_policy,
        protect_uploads = config.auth.protect_uploads,
        "HTTP Server Running"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    flush_telemetry();
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
