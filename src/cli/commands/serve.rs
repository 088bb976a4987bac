use std::sync::Arc;

use tokio::net::TcpListener;

use crate::app;
use crate::config;
use crate::database::DatabaseManager;
use crate::scheduler::Sweeper;

pub async fn handle() -> anyhow::Result<()> {
    let config = config::config();
    tracing::info!("Starting CleanBook API in {:?} mode", config.environment);

    if config.database.run_migrations {
        // Keep serving; /health reports the database as degraded.
        if let Err(e) = DatabaseManager::migrate().await {
            tracing::error!(error = %e, "Database migrations failed");
        }
    }

    let (store, services) = super::services(config)?;
    let sweeper = Arc::new(Sweeper::new(store, services.email.clone()));
    let sweeps = sweeper.spawn(&config.scheduler);

    let app = app::router(Arc::new(services), config);

    let bind_addr = format!("0.0.0.0:{}", config.server.port);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind {}: {}", bind_addr, e))?;
    tracing::info!("CleanBook API listening on http://{}", bind_addr);

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    for sweep in sweeps {
        sweep.abort();
    }
    DatabaseManager::close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
