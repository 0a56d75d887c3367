mod api_doc;
mod app;
mod balancer;
mod config;
mod error;
mod handlers;
mod instance;
mod models;
mod routes;
mod state;
mod storage;
#[cfg(test)]
mod testing;

use anyhow::Context;
use config::Config;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("ytdlp-container-router starting");

    let config = Config::from_env()?;
    config.log_startup();

    let addr = format!("{}:{}", config.service_host, config.service_port);
    let app = app::build_router(app::state_from_config(config));

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Router listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Router shutting down");
}
