//! block-meta-cache: HTTP front end for the block metadata cache.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use block_meta_cache::cache::new_shared_cache;
use block_meta_cache::config::{Cli, Config};
use block_meta_cache::server::api::{build_router, AppState};
use block_meta_cache::stats::PrometheusSink;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments.
    let cli = Cli::parse();

    // Initialize tracing/logging.
    let filter = if cli.verbose {
        "block_meta_cache=debug,tower_http=debug"
    } else {
        "block_meta_cache=info,tower_http=info"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| filter.into());

    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }

    info!("block-meta-cache v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration.
    let mut config = Config::load(&cli.config)?;
    if let Some(listen) = cli.listen {
        config.server.listen = listen;
    }

    info!(
        enabled = config.cache.enabled,
        capacity_bytes = config.cache.capacity_bytes,
        policy = %config.cache.policy,
        "Configuration loaded"
    );

    let cache = new_shared_cache(config.cache.clone());

    let state = Arc::new(AppState {
        cache,
        metrics: Mutex::new(PrometheusSink::new()?),
        start_time: Instant::now(),
    });

    // Build the HTTP router.
    let app = build_router(state);

    // Start the server.
    let listen_addr = config.server.listen;
    info!(addr = listen_addr, "Starting server");

    let listener = TcpListener::bind(&listen_addr).await?;
    info!("Listening on {listen_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
