use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use std::future::Future;
use std::sync::Arc;

use crate::{auth, models::Viewer, AppError, AppState};

/// Extracts the session token from either the __session cookie (frontend) or the Authorization header
fn extract_token_from_request(parts: &Parts) -> Option<String> {
    if let Some(cookie_header) = parts.headers.get(header::COOKIE) {
        if let Ok(cookie_str) = cookie_header.to_str() {
            for cookie in cookie_str.split(';') {
                if let Some(value) = cookie.trim().strip_prefix("__session=") {
                    return Some(value.to_string());
                }
            }
        }
    }

    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser {
    pub viewer: Viewer,
}

impl FromRequestParts<Arc<AppState>> for AuthenticatedUser {
    type Rejection = AppError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        let token = extract_token_from_request(parts);
        let state = state.clone();

        async move {
            let token = token.ok_or_else(|| {
                AppError::Unauthorized("Missing authentication: no __session cookie or Authorization header".to_string())
            })?;

            let claims = auth::validate_jwt(&token, &state.config.jwt_secret, &state.config.jwt_issuer).map_err(|e| {
                tracing::debug!(error = %e, "Rejected session token");
                AppError::Unauthorized(e)
            })?;

            let viewer = claims.viewer().map_err(AppError::Unauthorized)?;
            tracing::debug!(agent_id = viewer.agent_id, role = ?viewer.role, "Authenticated");
            Ok(AuthenticatedUser { viewer })
        }
    }
}
