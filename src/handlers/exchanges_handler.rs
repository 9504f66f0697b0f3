use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::{
    extractors::AuthenticatedUser,
    models::{
        CreateExchangeInput, ExchangeDecisionResponse, ExchangePreview, ExchangePreviewQuery, ExchangeRequest,
        RespondToExchangeInput,
    },
    roster::parse_iso_date,
    AppResult, AppState,
};

/// GET /api/exchanges/preview
#[utoipa::path(
    get,
    path = "/api/exchanges/preview",
    params(ExchangePreviewQuery),
    responses(
        (status = 200, description = "Current shift types on both sides", body = ExchangePreview),
        (status = 400, description = "Malformed date"),
        (status = 404, description = "No roster covers one of the dates")
    ),
    tag = "exchanges",
    security(("cookie_auth" = []))
)]
pub async fn get_preview(
    State(state): State<Arc<AppState>>,
    _auth: AuthenticatedUser,
    Query(query): Query<ExchangePreviewQuery>,
) -> AppResult<Json<ExchangePreview>> {
    let requester_date = parse_iso_date(&query.requester_date)?;
    let target_date = parse_iso_date(&query.target_date)?;
    let preview = state
        .services
        .exchanges
        .preview(query.requester_agent_id, requester_date, query.target_agent_id, target_date)
        .await?;
    Ok(Json(preview))
}

/// POST /api/exchanges
#[utoipa::path(
    post,
    path = "/api/exchanges",
    request_body = CreateExchangeInput,
    responses(
        (status = 201, description = "Proposal created", body = ExchangeRequest),
        (status = 403, description = "Proposing on behalf of another agent requires the manager role"),
        (status = 422, description = "Nothing to exchange on one of the dates")
    ),
    tag = "exchanges",
    security(("cookie_auth" = []))
)]
pub async fn create_exchange(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
    Json(input): Json<CreateExchangeInput>,
) -> AppResult<(StatusCode, Json<ExchangeRequest>)> {
    let created = state.services.exchanges.submit(&auth.viewer, input).await.map_err(|e| {
        tracing::warn!(error = %e, agent_id = auth.viewer.agent_id, "Exchange proposal refused");
        e
    })?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/exchanges/incoming
#[utoipa::path(
    get,
    path = "/api/exchanges/incoming",
    responses(
        (status = 200, description = "Proposals addressed to the caller", body = Vec<ExchangeRequest>)
    ),
    tag = "exchanges",
    security(("cookie_auth" = []))
)]
pub async fn get_incoming(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
) -> AppResult<Json<Vec<ExchangeRequest>>> {
    let requests = state.services.exchanges.incoming(&auth.viewer).await?;
    tracing::debug!(agent_id = auth.viewer.agent_id, count = requests.len(), "Fetched incoming exchanges");
    Ok(Json(requests))
}

/// GET /api/exchanges/mine
#[utoipa::path(
    get,
    path = "/api/exchanges/mine",
    responses(
        (status = 200, description = "Proposals created by the caller", body = Vec<ExchangeRequest>)
    ),
    tag = "exchanges",
    security(("cookie_auth" = []))
)]
pub async fn get_mine(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
) -> AppResult<Json<Vec<ExchangeRequest>>> {
    let requests = state.services.exchanges.mine(&auth.viewer).await?;
    Ok(Json(requests))
}

/// GET /api/exchanges/unacknowledged
#[utoipa::path(
    get,
    path = "/api/exchanges/unacknowledged",
    responses(
        (status = 200, description = "Approved exchanges awaiting manager acknowledgement", body = Vec<ExchangeRequest>),
        (status = 403, description = "Manager role required")
    ),
    tag = "exchanges",
    security(("cookie_auth" = []))
)]
pub async fn get_unacknowledged(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
) -> AppResult<Json<Vec<ExchangeRequest>>> {
    let requests = state.services.exchanges.unacknowledged(&auth.viewer).await?;
    Ok(Json(requests))
}

/// POST /api/exchanges/{id}/respond
#[utoipa::path(
    post,
    path = "/api/exchanges/{id}/respond",
    params(("id" = i32, Path, description = "Exchange request id")),
    request_body = RespondToExchangeInput,
    responses(
        (status = 200, description = "Proposal resolved", body = ExchangeDecisionResponse),
        (status = 403, description = "Only the target agent or a manager may answer"),
        (status = 404, description = "Unknown request"),
        (status = 409, description = "Stale proposal, already resolved, or swap applied only partially")
    ),
    tag = "exchanges",
    security(("cookie_auth" = []))
)]
pub async fn respond_to_exchange(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
    Path(id): Path<i32>,
    Json(input): Json<RespondToExchangeInput>,
) -> AppResult<Json<ExchangeDecisionResponse>> {
    let response = state
        .services
        .exchanges
        .respond(&auth.viewer, id, input.decision)
        .await?;
    Ok(Json(response))
}

/// POST /api/exchanges/{id}/acknowledge
#[utoipa::path(
    post,
    path = "/api/exchanges/{id}/acknowledge",
    params(("id" = i32, Path, description = "Exchange request id")),
    responses(
        (status = 200, description = "Exchange acknowledged", body = ExchangeRequest),
        (status = 403, description = "Manager role required"),
        (status = 409, description = "Request is not approved")
    ),
    tag = "exchanges",
    security(("cookie_auth" = []))
)]
pub async fn acknowledge_exchange(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<ExchangeRequest>> {
    let request = state.services.exchanges.acknowledge(&auth.viewer, id).await?;
    Ok(Json(request))
}
