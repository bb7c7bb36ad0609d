// ABOUTME: Binary entry point: loads config, runs migrations, serves the OAuth endpoints
// ABOUTME: Runs a periodic expired-grant purge and shuts down gracefully on ctrl-c
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Harbor Platform

use anyhow::{Context, Result};
use harbor_auth::config::ProviderConfig;
use harbor_auth::logging;
use harbor_auth::routes;
use harbor_auth::server::AuthorizationServer;
use harbor_auth::store::sqlite::SqliteStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Interval between expired-grant purge sweeps
const PURGE_INTERVAL_SECS: u64 = 3600;

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_from_env()?;

    let config = ProviderConfig::from_env().context("failed to load configuration")?;
    info!(
        issuer = %config.issuer_url,
        database = %config.database_url,
        "configuration loaded"
    );

    let store = SqliteStore::connect(&config.database_url)
        .await
        .context("failed to connect to database")?;
    store.migrate().await.context("failed to run migrations")?;

    let bind = config.http_bind.clone();
    let server = Arc::new(AuthorizationServer::with_sqlite(config, store));

    tokio::spawn(purge_loop(Arc::clone(&server)));

    let listener = TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    info!(addr = %bind, "authorization server listening");

    axum::serve(listener, routes::router(server))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("shutdown complete");
    Ok(())
}

/// Periodically delete expired codes and refresh tokens
async fn purge_loop(server: Arc<AuthorizationServer>) {
    let mut interval = tokio::time::interval(Duration::from_secs(PURGE_INTERVAL_SECS));
    loop {
        interval.tick().await;
        if let Err(e) = server.purge_expired().await {
            error!(error = %e, "expired-grant purge failed");
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        return;
    }
    info!("shutdown signal received");
}
