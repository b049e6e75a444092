//! Chronicle Engine - Main entry point.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chronicle_engine::infrastructure::clock::SystemClock;
use chronicle_engine::infrastructure::config::EngineConfig;
use chronicle_engine::infrastructure::sqlite;
use chronicle_engine::App;

/// Spawns a task that cancels `cancel_token` on SIGTERM/SIGINT
fn setup_shutdown_signal(cancel_token: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
            }
            _ = terminate => {
                tracing::info!("Received SIGTERM, initiating graceful shutdown...");
            }
        }

        cancel_token.cancel();
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chronicle_engine=debug,chronicle_domain=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Chronicle Engine");

    let cancel_token = CancellationToken::new();
    setup_shutdown_signal(cancel_token.clone());

    let config = EngineConfig::from_env()?;

    if let Some(parent) = Path::new(&config.db_path).parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create data directory {}", parent.display()))?;
        }
    }
    let pool = sqlite::connect(&config.db_path)
        .await
        .with_context(|| format!("Failed to open database at {}", config.db_path))?;
    tracing::info!(db_path = %config.db_path, "Database ready");

    let app = App::new(pool.clone(), Arc::new(SystemClock::new()), config.tasks.clone());

    app.clock_service
        .initialize(&config.clock_overrides)
        .await
        .context("Failed to initialize world clock")?;
    if let Some(minutes) = app
        .clock_service
        .fast_forward_on_restart()
        .await
        .context("Failed to fast-forward world clock")?
    {
        tracing::info!(real_minutes = minutes, "Caught up on downtime");
    }

    app.tasks.start().await;

    cancel_token.cancelled().await;
    tracing::info!("Shutting down");

    let tasks = Arc::clone(&app.tasks);
    if tokio::time::timeout(Duration::from_secs(10), async move { tasks.stop().await })
        .await
        .is_err()
    {
        tracing::warn!("Background tasks did not stop within 10 seconds");
    }

    if !app.clock_service.persist_on_shutdown().await {
        tracing::warn!("World clock was not saved; the next start will not fast-forward");
    }

    pool.close().await;
    tracing::info!("Chronicle Engine stopped");
    Ok(())
}
