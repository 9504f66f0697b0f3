use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::AppState;

/// Whether this instance can serve roster reads and writes.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthReport {
    /// `ok`, or `degraded` when the roster store is unreachable
    pub status: String,
    pub version: String,
    /// `postgres` or `memory`
    pub storage: String,
    /// `up`, `down`, or `not_configured` for in-memory storage
    pub database: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Roster store reachable", body = HealthReport),
        (status = 503, description = "Roster store unreachable", body = HealthReport)
    ),
    tag = "health"
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthReport>) {
    let database = match &state.db {
        Some(pool) => match sqlx::query("SELECT 1").execute(pool).await {
            Ok(_) => "up",
            Err(e) => {
                tracing::error!(error = %e, "Health check could not reach the roster database");
                "down"
            }
        },
        None => "not_configured",
    };

    let (code, status) = if database == "down" {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    } else {
        (StatusCode::OK, "ok")
    };

    let report = HealthReport {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        storage: state.config.storage_backend.as_str().to_string(),
        database: database.to_string(),
    };
    (code, Json(report))
}
