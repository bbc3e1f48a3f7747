mod bootstrap;
mod commands;
mod health;
mod routes;

use std::time::Duration;

use anyhow::Result;
use bookclub_core::config::{AppConfig, LoadOptions, SchedulerMode};
use tokio::sync::watch;

fn init_logging(config: &AppConfig) {
    use bookclub_core::config::LogFormat::*;
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
    // Logging needs the config, so load it before bootstrapping.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;
    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_task = match app.config.scheduler.mode {
        SchedulerMode::Interval => {
            let scheduler = app.scheduler.clone();
            Some(tokio::spawn(async move { scheduler.run_interval(shutdown_rx).await }))
        }
        SchedulerMode::External => None,
    };

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        scheduler_mode = ?app.config.scheduler.mode,
        check_interval_secs = app.config.scheduler.check_interval_secs,
        "bookclub-server started"
    );

    let router = routes::router(app.app_state(), app.health_state());
    axum::serve(listener, router).with_graceful_shutdown(wait_for_shutdown()).await?;

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "bookclub-server stopping"
    );
    let _ = shutdown_tx.send(true);
    if let Some(task) = scheduler_task {
        let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
        if tokio::time::timeout(grace, task).await.is_err() {
            tracing::warn!(
                event_name = "system.server.scheduler_abandoned",
                correlation_id = "shutdown",
                "phase scheduler did not stop within the grace period"
            );
        }
    }
    app.db_pool.close().await;

    Ok(())
}

async fn wait_for_shutdown() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(
            event_name = "system.server.signal_error",
            correlation_id = "shutdown",
            error = %error,
            "could not listen for ctrl-c; shutting down"
        );
    }
}
