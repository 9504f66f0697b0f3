use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::repositories::RepositoryError;
use crate::roster::RosterError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Roster(#[from] RosterError),
}

impl From<RepositoryError> for AppError {
    fn from(e: RepositoryError) -> Self {
        AppError::Roster(RosterError::Storage(e))
    }
}

fn roster_status(e: &RosterError) -> (StatusCode, &'static str) {
    match e {
        RosterError::RosterMissing { .. } => (StatusCode::NOT_FOUND, "roster_missing"),
        RosterError::DayMissing { .. } => (StatusCode::NOT_FOUND, "day_missing"),
        RosterError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        RosterError::SlotNotFound { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "slot_not_found"),
        RosterError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation"),
        RosterError::StaleProposal(_) => (StatusCode::CONFLICT, "stale_proposal"),
        RosterError::Conflict { .. } => (StatusCode::CONFLICT, "conflict"),
        RosterError::InvalidTransition { .. } => (StatusCode::CONFLICT, "invalid_transition"),
        RosterError::SwapIncomplete(_) => (StatusCode::CONFLICT, "swap_incomplete"),
        RosterError::InvalidDateRange(_) => (StatusCode::BAD_REQUEST, "invalid_date_range"),
        RosterError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
        RosterError::Storage(RepositoryError::NotFound(_)) => (StatusCode::NOT_FOUND, "not_found"),
        RosterError::Storage(RepositoryError::Conflict(_)) => (StatusCode::CONFLICT, "conflict"),
        RosterError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage"),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            AppError::Roster(RosterError::SwapIncomplete(report)) => {
                let body = Json(json!({
                    "error": "Swap applied only partially; the request is still proposed and can be approved again",
                    "kind": "swap_incomplete",
                    "swap": report,
                }));
                return (StatusCode::CONFLICT, body).into_response();
            }
            AppError::Roster(e) => {
                let (status, kind) = roster_status(&e);
                if status == StatusCode::INTERNAL_SERVER_ERROR {
                    tracing::error!(error = %e, "Storage failure");
                }
                (status, kind, e.to_string())
            }
        };

        let body = Json(json!({
            "error": message,
            "kind": kind,
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
