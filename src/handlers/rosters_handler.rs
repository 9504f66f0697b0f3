use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;

use crate::{
    extractors::{require_manager, AuthenticatedUser},
    models::{DayQuery, DaySchedule, MonthKey, OverwriteSlotInput, RangeOverrideInput, RosterView, SlotWriteResponse},
    roster::{parse_iso_date, RangeOverrideReport},
    AppError, AppResult, AppState,
};

/// GET /api/rosters/{monthKey}
#[utoipa::path(
    get,
    path = "/api/rosters/{monthKey}",
    params(("monthKey" = String, Path, description = "Month key, e.g. julio-2025")),
    responses(
        (status = 200, description = "Roster record with its current version", body = RosterView),
        (status = 404, description = "No roster for that month")
    ),
    tag = "rosters",
    security(("cookie_auth" = []))
)]
pub async fn get_roster(
    State(state): State<Arc<AppState>>,
    _auth: AuthenticatedUser,
    Path(month_key): Path<String>,
) -> AppResult<Json<RosterView>> {
    let month_key = MonthKey::new(month_key);
    let snapshot = state
        .services
        .engine
        .load_month(&month_key)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Roster {}", month_key)))?;

    tracing::debug!(month_key = %month_key, version = snapshot.version, "Fetched roster");
    Ok(Json(RosterView {
        month_key: snapshot.record.month_key,
        version: snapshot.version,
        weeks: snapshot.record.weeks,
    }))
}

/// GET /api/rosters/day?date=
#[utoipa::path(
    get,
    path = "/api/rosters/day",
    params(DayQuery),
    responses(
        (status = 200, description = "Assignments for one date", body = DaySchedule),
        (status = 400, description = "Malformed date"),
        (status = 404, description = "No roster covers the date")
    ),
    tag = "rosters",
    security(("cookie_auth" = []))
)]
pub async fn get_day(
    State(state): State<Arc<AppState>>,
    _auth: AuthenticatedUser,
    Query(query): Query<DayQuery>,
) -> AppResult<Json<DaySchedule>> {
    let date = parse_iso_date(&query.date)?;
    let day = state.services.engine.read_day(date).await?;
    Ok(Json(day))
}

/// PUT /api/rosters/slots
#[utoipa::path(
    put,
    path = "/api/rosters/slots",
    request_body = OverwriteSlotInput,
    responses(
        (status = 200, description = "Slot written, or left alone when unchanged", body = SlotWriteResponse),
        (status = 403, description = "Manager role required"),
        (status = 404, description = "No roster covers the date"),
        (status = 409, description = "Roster kept changing underneath the write")
    ),
    tag = "rosters",
    security(("cookie_auth" = []))
)]
pub async fn put_slot(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
    Json(input): Json<OverwriteSlotInput>,
) -> AppResult<Json<SlotWriteResponse>> {
    require_manager(&auth.viewer, "edit the roster")?;

    let outcome = state
        .services
        .engine
        .overwrite_slot(input.date, input.agent_id, &input.change)
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, agent_id = input.agent_id, date = %input.date, "Slot overwrite failed");
            e
        })?;

    tracing::info!(
        manager = auth.viewer.agent_id,
        agent_id = input.agent_id,
        date = %input.date,
        ?outcome,
        "Slot overwritten by manager"
    );
    Ok(Json(SlotWriteResponse { outcome }))
}

/// POST /api/rosters/overrides
#[utoipa::path(
    post,
    path = "/api/rosters/overrides",
    request_body = RangeOverrideInput,
    responses(
        (status = 200, description = "Per-date report of the override", body = RangeOverrideReport),
        (status = 400, description = "Invalid date range"),
        (status = 403, description = "Manager role required")
    ),
    tag = "rosters",
    security(("cookie_auth" = []))
)]
pub async fn post_override(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
    Json(input): Json<RangeOverrideInput>,
) -> AppResult<Json<RangeOverrideReport>> {
    require_manager(&auth.viewer, "edit the roster")?;

    let start = parse_iso_date(&input.start_date)?;
    let end = parse_iso_date(&input.end_date)?;
    let report = state
        .services
        .engine
        .apply_range_override(input.agent_id, start, end, &input.change)
        .await?;

    Ok(Json(report))
}
