//! Compliance Core - HIPAA Compliance Backend
//!
//! This service manages organization policies and employee attestations,
//! incident reports with breach notification deadlines, training progress
//! and the dashboards that summarize them.

use sqlx::sqlite::SqlitePoolOptions;
use tokio::net::TcpListener;

mod api;
mod auth;
mod config;
mod domain;
mod error;
mod logging;
mod markdown;
mod storage;

use crate::api::build_router;
use crate::auth::JwtManager;
use crate::config::{ComplianceConfig, Config};
use crate::storage::ComplianceRepository;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database repository.
    pub repository: ComplianceRepository,
    /// JWT manager for token operations.
    pub jwt_manager: JwtManager,
    /// Due date and breach notification defaults.
    pub compliance: ComplianceConfig,
    /// Minimum accepted password length.
    pub min_password_length: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file (if present)
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("Note: No .env file loaded ({e})");
    }

    // Logging settings come from the configuration, so load it first.
    let config = Config::load().map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    logging::init(&config.logging);

    tracing::info!("Starting Compliance Core v{}", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        host = %config.server.host,
        port = %config.server.port,
        database = %config.database.url,
        default_due_days = config.compliance.default_due_days,
        breach_notification_days = config.compliance.breach_notification_days,
        "Configuration loaded"
    );

    let pool = SqlitePoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to database");
            anyhow::anyhow!("Database connection error: {}", e)
        })?;

    let repository = ComplianceRepository::new(pool);
    repository.init_schema().await.map_err(|e| {
        tracing::error!(error = %e, "Failed to initialize database schema");
        anyhow::anyhow!("Schema initialization error: {}", e)
    })?;

    tracing::info!("Database connected and schema initialized");

    let jwt_manager = JwtManager::new(
        &config.auth.jwt_secret,
        config.auth.jwt_issuer.clone(),
        config.auth.token_duration_hours,
    );

    let state = AppState {
        repository,
        jwt_manager,
        compliance: config.compliance.clone(),
        min_password_length: config.auth.min_password_length,
    };

    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;

    tracing::info!(address = %addr, "Server listening");
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
