// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Vacancy-Tracker API Server
//!
//! Searches hh.ru for Telegram-authenticated users and sends new vacancies
//! through the Telegram bot, interactively and on a periodic schedule.

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vacancy_tracker::{
    config::{Config, StorageBackend},
    db::{FirestoreDb, MemoryDb, Store},
    services::{AuthServiceClient, HhClient},
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Vacancy-Tracker API");

    let db: Arc<dyn Store> = match config.storage_backend {
        StorageBackend::Firestore => Arc::new(FirestoreDb::new(&config.gcp_project_id).await?),
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on restart");
            Arc::new(MemoryDb::new())
        }
    };

    // The auth service also carries the bot notify endpoint.
    let auth = Arc::new(AuthServiceClient::new(
        &config.auth_service_url,
        config.collaborator_timeout,
    )?);
    let search = Arc::new(HhClient::new(
        &config.search_api_url,
        config.collaborator_timeout,
    )?);
    tracing::info!(
        auth = %config.auth_service_url,
        search = %config.search_api_url,
        "Collaborator clients initialized"
    );

    // Build shared state
    let state = Arc::new(AppState::new(
        config.clone(),
        db,
        auth.clone(),
        search,
        auth,
    ));

    let mut scheduler = state
        .scheduler
        .clone()
        .start(config.auto_update_interval, config.token_sweep_interval)
        .await?;

    // Build router
    let app = vacancy_tracker::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Err(e) = scheduler.shutdown().await {
        tracing::warn!(error = %e, "Scheduler shutdown failed");
    }
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("vacancy_tracker=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
