use axum::{extract::State, Json};
use std::sync::Arc;

use crate::{extractors::AuthenticatedUser, models::PendingActionCount, AppResult, AppState};

/// GET /api/pending-count
#[utoipa::path(
    get,
    path = "/api/pending-count",
    responses(
        (status = 200, description = "Items waiting on the caller", body = PendingActionCount)
    ),
    tag = "pending",
    security(("cookie_auth" = []))
)]
pub async fn get_pending_count(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
) -> AppResult<Json<PendingActionCount>> {
    let count = state.services.pending.count(&auth.viewer).await?;
    Ok(Json(PendingActionCount { count }))
}
