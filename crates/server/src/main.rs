mod bootstrap;
mod health;
mod http;

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::Router;

use ticketry_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use ticketry_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Config and logging come up before anything that could emit events.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    let router = Router::new()
        .merge(http::router(http::ApiState {
            service: Arc::clone(&app.service),
            sessions: Arc::clone(&app.sessions),
        }))
        .merge(health::router(app.db_pool.clone(), Arc::clone(&app.service)));

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(
        event_name = "server_started",
        bind_address = %address,
        "booking assistant listening"
    );

    let (shutdown_tx, mut shutdown_rx) = tokio::sync::watch::channel(false);
    let server = tokio::spawn(
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.changed().await;
            })
            .into_future(),
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!(event_name = "server_stopping", "booking assistant stopping");
    let _ = shutdown_tx.send(true);

    // In-flight requests get a bounded drain window before the process exits.
    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    match tokio::time::timeout(grace, server).await {
        Ok(joined) => joined??,
        Err(_) => {
            tracing::warn!(
                event_name = "shutdown_drain_timeout",
                grace_secs = app.config.server.graceful_shutdown_secs,
                "graceful shutdown window elapsed with requests still in flight"
            );
        }
    }

    app.sync_task.abort();
    app.db_pool.close().await;

    Ok(())
}
