mod auth;
mod config;
mod db;
mod error;
mod extractors;
mod handlers;
mod middleware;
mod models;
mod openapi;
mod repositories;
mod roster;
mod services;
mod startup;

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use handlers::MetricsState;

use config::StorageBackend;
use repositories::InMemoryRosterRepository;
use roster::{MonthKeyResolver, NamedMonthKeys};
use services::Services;

#[derive(Clone)]
pub struct AppState {
    pub services: Services,
    /// Present only for the Postgres backend.
    pub db: Option<sqlx::PgPool>,
    pub config: AppConfig,
    pub metrics: Arc<MetricsState>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables before reading RUST_LOG or LOG_FORMAT
    dotenvy::dotenv().ok();

    // Initialize tracing with conditional JSON/text output
    let use_json = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string()) == "json";

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,duty_roster=debug,tower_http=debug".into());

    if use_json {
        // Structured JSON logging for production
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        // Human-readable for development
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let config = AppConfig::from_env().map_err(|e| {
        tracing::error!("Configuration error: {}", e);
        e
    })?;

    let months: Arc<dyn MonthKeyResolver> = Arc::new(NamedMonthKeys::new(config.roster_locale));

    let (services, db) = match config.storage_backend {
        StorageBackend::Postgres => {
            let database_url = config.database_url.as_deref().ok_or("DATABASE_URL must be set")?;
            let pool = db::create_pool(database_url).await.map_err(|e| {
                tracing::error!("Failed to create database pool: {}", e);
                e
            })?;
            tracing::info!("Database pool created successfully");

            db::run_migrations(&pool).await.map_err(|e| {
                tracing::error!("Failed to run migrations: {}", e);
                e
            })?;
            tracing::info!("Migrations applied");

            let services = Services::postgres(
                pool.clone(),
                months,
                config.roster_write_attempts,
                config.permission_type_cache_ttl,
            );
            (services, Some(pool))
        }
        StorageBackend::Memory => {
            let roster = InMemoryRosterRepository::new();
            let today = chrono::Local::now().date_naive();
            let seeded = startup::seed_blank_months(&roster, months.as_ref(), today, 2).await;
            tracing::warn!(seeded, "Using in-memory storage; nothing survives a restart");
            (Services::in_memory(roster, months, config.roster_write_attempts), None)
        }
    };

    let metrics_state = Arc::new(handlers::setup_metrics_recorder()?);
    tracing::info!("Metrics recorder initialized");

    let bind_addr = config.bind_addr.clone();
    let state = Arc::new(AppState {
        services,
        db,
        config,
        metrics: metrics_state,
    });

    let app = startup::build_router(state);

    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
