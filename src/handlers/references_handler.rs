use axum::{extract::State, Json};
use std::sync::Arc;

use crate::{extractors::AuthenticatedUser, models::PermissionType, AppResult, AppState};

/// GET /api/permission-types
#[utoipa::path(
    get,
    path = "/api/permission-types",
    responses(
        (status = 200, description = "Kinds of leave and the roster symbol each one stamps", body = Vec<PermissionType>)
    ),
    tag = "references",
    security(("cookie_auth" = []))
)]
pub async fn get_permission_types(
    State(state): State<Arc<AppState>>,
    _auth: AuthenticatedUser,
) -> AppResult<Json<Vec<PermissionType>>> {
    let types = state.services.leave.types().await?;
    Ok(Json(types))
}
