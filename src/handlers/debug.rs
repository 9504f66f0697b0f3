use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;
use std::time::SystemTime;

use crate::AppState;

#[derive(Serialize)]
pub struct DebugInfo {
    pub version: String,
    pub git_sha: String,
    pub environment: String,
    pub uptime_seconds: u64,
    pub storage_backend: String,
    pub database_status: String,
    pub database_connections: u32,
    pub roster_write_attempts: u32,
    pub timestamp: u64,
}

static START_TIME: once_cell::sync::Lazy<SystemTime> = once_cell::sync::Lazy::new(SystemTime::now);

/// Handler for the /debug endpoint
pub async fn debug_handler(State(state): State<Arc<AppState>>) -> Json<DebugInfo> {
    let (database_status, database_connections) = match &state.db {
        Some(pool) => {
            let status = match sqlx::query("SELECT 1").fetch_one(pool).await {
                Ok(_) => "connected".to_string(),
                Err(e) => format!("error: {}", e),
            };
            (status, pool.size())
        }
        None => ("not configured".to_string(), 0),
    };

    Json(DebugInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_sha: option_env!("GIT_SHA").unwrap_or("unknown").to_string(),
        environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        uptime_seconds: START_TIME.elapsed().unwrap_or_default().as_secs(),
        storage_backend: state.config.storage_backend.as_str().to_string(),
        database_status,
        database_connections,
        roster_write_attempts: state.config.roster_write_attempts,
        timestamp: SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default(),
    })
}
