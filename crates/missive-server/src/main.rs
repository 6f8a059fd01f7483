mod cleanup;
mod config;

use std::sync::Arc;

use tracing::info;

use missive_api::auth::{AppState, AppStateInner};
use missive_db::{CachedRegistry, Database, Registry, SqlRegistry};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "missive_server=debug,missive_api=debug,missive_db=info,tower_http=debug".into()
            }),
        )
        .init();

    let config = Config::from_env()?;

    // Init database
    let db = Arc::new(Database::open(&config.db_path)?);

    let registry: Arc<dyn Registry> = if config.registry_cache {
        info!("Using cached type registry");
        Arc::new(CachedRegistry::new(SqlRegistry))
    } else {
        Arc::new(SqlRegistry)
    };

    tokio::spawn(cleanup::run_session_sweeper(
        db.clone(),
        config.sessions,
        config.session_sweep_secs,
    ));

    let state: AppState = Arc::new(AppStateInner::new(
        db,
        registry,
        config.sessions,
        config.jwt_secret.clone(),
    ));
    let app = missive_api::app(state);

    info!("Missive server listening on {}", config.addr);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
