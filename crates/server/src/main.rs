mod bootstrap;
mod health;
mod webhook;

use anyhow::Result;
use coco_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use coco_core::config::LogFormat::*;
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
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    // Now bootstrap using the same config we already loaded
    let app = bootstrap::bootstrap_with_config(config).await?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        app.db_pool.clone(),
    )
    .await?;

    let webhook_address =
        format!("{}:{}", app.config.server.bind_address, app.config.server.webhook_port);
    let listener = tokio::net::TcpListener::bind(&webhook_address).await?;

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %webhook_address,
        "coco-server started"
    );

    // In-flight turns drain before the listener closes; the grace period
    // bounds how long startup managers wait on top of that.
    let grace_secs = app.config.server.graceful_shutdown_secs;
    axum::serve(listener, webhook::router(app.orchestrator.clone()))
        .with_graceful_shutdown(wait_for_shutdown(grace_secs))
        .await?;

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "coco-server stopping"
    );

    Ok(())
}

async fn wait_for_shutdown(grace_secs: u64) {
    if tokio::signal::ctrl_c().await.is_err() {
        return;
    }
    tracing::info!(
        event_name = "system.server.shutdown_signal",
        correlation_id = "shutdown",
        grace_secs,
        "shutdown signal received, draining in-flight turns"
    );
}
