use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::{AppError, AppState};

pub const DEBUG_KEY_HEADER: &str = "X-Debug-Key";

/// Guards the operator-only `/debug` route with the shared `DEBUG_KEY`.
pub async fn require_debug_key(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let provided = request
        .headers()
        .get(DEBUG_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    let Some(provided) = provided else {
        tracing::warn!(uri = %request.uri(), "Debug request without a debug key");
        return Err(AppError::Unauthorized(format!("{} header required", DEBUG_KEY_HEADER)));
    };

    if bool::from(state.config.debug_key.as_bytes().ct_eq(provided.as_bytes())) {
        Ok(next.run(request).await)
    } else {
        tracing::warn!(uri = %request.uri(), "Debug request with a wrong debug key");
        Err(AppError::Unauthorized("Debug key does not match".to_string()))
    }
}
