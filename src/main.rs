use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

use db_assistant_backend::api;
use db_assistant_backend::config::Config;
use db_assistant_backend::storage::SqliteStorage;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;

    // Initialize logging; RUST_LOG wins over the configured level
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .with_ansi(config.logging.style != "never")
        .init();

    info!("Starting server on {}", config.server_address());
    info!(
        "Tenant pools: max_size {}, connect timeout {}s",
        config.pool.max_size, config.pool.connect_timeout_secs
    );

    // Registry and query history live in one SQLite file
    let storage = Arc::new(
        SqliteStorage::new(&config.database.url)
            .await
            .map_err(|e| {
                error!("Failed to initialize database: {}", e);
                e
            })?,
    );

    let app: Router = api::routes::create_router_with_state(storage, config.clone());

    let addr: SocketAddr = config.server_address().parse()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
