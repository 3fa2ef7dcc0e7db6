pub mod error;
pub mod gateway;
pub mod records;
pub mod routes;
pub mod scheduler;
pub mod services;
pub mod state;
pub mod supabase;
pub mod types;

use std::sync::Arc;

use state::AppState;
use types::Config;

/// Serve the HTTP API until Ctrl-C.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let bind = config.http_bind.clone();
    let state = AppState::new(config)
        .map_err(|e| anyhow::anyhow!("Failed to initialise state: {e}"))?;
    let app = routes::router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    log::info!("smledger listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log::info!("smledger stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
