use tracing::info;

use crate::app::{router, AppState};
use crate::config::AppConfig;
use crate::database::open_store;

pub async fn handle(config: AppConfig, port: Option<u16>) -> anyhow::Result<()> {
    let port = port.unwrap_or(config.server.port);
    info!("Starting School API in {:?} mode", config.environment);

    let store = open_store(&config.store).await?;
    let state = AppState::new(config, store)?;
    if state.users.needs_bootstrap().await? {
        info!("No users yet: the first POST /api/user/createUser becomes super admin");
    }

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("School API listening on http://{}", bind_addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
