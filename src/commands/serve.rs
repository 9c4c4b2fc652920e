//! Serve command - Starts the HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;

use crate::api::{create_router, AppState};
use crate::cli::args::ServeArgs;
use crate::config::Config;
use crate::errors::{AppError, AppResult};
use crate::infra::{Cache, Database};

/// Execute the serve command
pub async fn execute(args: ServeArgs, config: Config) -> AppResult<()> {
    tracing::info!("Starting server...");

    let db = Arc::new(Database::connect(&config).await?);
    let cache = Arc::new(Cache::connect(&config).await?);

    if config.llm.api_key.is_none() {
        tracing::warn!("GEMINI_API_KEY not set, the assistant will only send its welcome message");
    }
    if !config.smtp.is_configured() {
        tracing::warn!("SMTP_HOST not set, emails will be written to the log");
    }

    let addr = format!(
        "{}:{}",
        args.host.as_deref().unwrap_or(&config.server_host),
        args.port.unwrap_or(config.server_port)
    );
    let app = create_router(AppState::from_config(db, cache, config));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind to {}: {}", addr, e)))?;

    tracing::info!("Server running on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|e| AppError::internal(format!("Server error: {}", e)))?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
