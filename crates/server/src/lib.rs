pub mod bootstrap;
pub mod health;
pub mod newsroom;
pub mod roundup;
pub mod routes;
pub mod summary;
pub mod tenancy;

#[cfg(test)]
mod testing;

use std::time::Duration;

use anyhow::Result;
use newsbot_core::config::AppConfig;
use tokio::sync::oneshot;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

pub use bootstrap::{bootstrap, bootstrap_with_config, Application, BootstrapError};

/// `RUST_LOG` takes precedence over `logging.level`.
pub fn init_logging(config: &AppConfig) {
    use newsbot_core::config::LogFormat::*;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.trim().to_ascii_lowercase()));

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).json().init();
        }
    }
}

pub async fn serve(app: Application) -> Result<()> {
    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    let router = app.router();

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async {
                let _ = stop_rx.await;
            })
            .await
    });
    info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "newsbot-server listening"
    );

    tokio::signal::ctrl_c().await?;
    info!(event_name = "system.server.stopping", correlation_id = "shutdown", "newsbot-server stopping");
    let _ = stop_tx.send(());

    match tokio::time::timeout(grace, server).await {
        Ok(joined) => joined??,
        Err(_) => warn!(
            event_name = "system.server.shutdown_timeout",
            correlation_id = "shutdown",
            grace_secs = grace.as_secs(),
            "in-flight requests did not finish before the grace period"
        ),
    }

    app.db_pool.close().await;
    Ok(())
}
