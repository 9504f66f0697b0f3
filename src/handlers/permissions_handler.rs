use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::{
    extractors::AuthenticatedUser,
    models::{CreatePermissionInput, DecidePermissionInput, PermissionMutationResponse, PermissionRequest},
    AppResult, AppState,
};

/// POST /api/permissions
#[utoipa::path(
    post,
    path = "/api/permissions",
    request_body = CreatePermissionInput,
    responses(
        (status = 201, description = "Request filed; projected at once when the type needs no approval", body = PermissionMutationResponse),
        (status = 400, description = "Invalid date range"),
        (status = 422, description = "Unknown permission type")
    ),
    tag = "permissions",
    security(("cookie_auth" = []))
)]
pub async fn create_permission(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
    Json(input): Json<CreatePermissionInput>,
) -> AppResult<(StatusCode, Json<PermissionMutationResponse>)> {
    let response = state.services.leave.submit(&auth.viewer, input).await.map_err(|e| {
        tracing::warn!(error = %e, agent_id = auth.viewer.agent_id, "Permission request refused");
        e
    })?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /api/permissions/mine
#[utoipa::path(
    get,
    path = "/api/permissions/mine",
    responses(
        (status = 200, description = "The caller's permission requests", body = Vec<PermissionRequest>)
    ),
    tag = "permissions",
    security(("cookie_auth" = []))
)]
pub async fn get_mine(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
) -> AppResult<Json<Vec<PermissionRequest>>> {
    Ok(Json(state.services.leave.mine(&auth.viewer).await?))
}

/// GET /api/permissions/pending
#[utoipa::path(
    get,
    path = "/api/permissions/pending",
    responses(
        (status = 200, description = "All requests awaiting a decision", body = Vec<PermissionRequest>),
        (status = 403, description = "Manager role required")
    ),
    tag = "permissions",
    security(("cookie_auth" = []))
)]
pub async fn get_pending(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
) -> AppResult<Json<Vec<PermissionRequest>>> {
    let requests = state.services.leave.pending(&auth.viewer).await?;
    tracing::debug!(count = requests.len(), "Fetched pending permission requests");
    Ok(Json(requests))
}

/// POST /api/permissions/{id}/decision
#[utoipa::path(
    post,
    path = "/api/permissions/{id}/decision",
    params(("id" = i32, Path, description = "Permission request id")),
    request_body = DecidePermissionInput,
    responses(
        (status = 200, description = "Decision recorded; approvals carry the projection report", body = PermissionMutationResponse),
        (status = 403, description = "Manager role required"),
        (status = 404, description = "Unknown request"),
        (status = 409, description = "Request already decided")
    ),
    tag = "permissions",
    security(("cookie_auth" = []))
)]
pub async fn decide_permission(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
    Path(id): Path<i32>,
    Json(input): Json<DecidePermissionInput>,
) -> AppResult<Json<PermissionMutationResponse>> {
    let response = state.services.leave.decide(&auth.viewer, id, input.decision).await?;
    Ok(Json(response))
}
