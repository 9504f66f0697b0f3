use axum::{
    body::Body,
    http::{header, HeaderValue, Method, Request},
    middleware,
    routing::{get, post, put},
    Json, Router,
};
use chrono::{Datelike, Months, NaiveDate};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::{
    handlers,
    middleware::{metrics_middleware, request_id_middleware, require_debug_key, REQUEST_ID_HEADER},
    models::RosterRecord,
    openapi::ApiDoc,
    repositories::InMemoryRosterRepository,
    roster::MonthKeyResolver,
    AppState,
};

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_static("http://localhost:3000"))
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .expose_headers([REQUEST_ID_HEADER.clone()])
        .allow_credentials(true);

    // Roster routes; the literal routes win over the month key capture
    let roster_routes = Router::new()
        .route("/day", get(handlers::rosters_handler::get_day))
        .route("/slots", put(handlers::rosters_handler::put_slot))
        .route("/overrides", post(handlers::rosters_handler::post_override))
        .route("/{monthKey}", get(handlers::rosters_handler::get_roster));

    // Exchange routes
    let exchange_routes = Router::new()
        .route("/", post(handlers::exchanges_handler::create_exchange))
        .route("/preview", get(handlers::exchanges_handler::get_preview))
        .route("/incoming", get(handlers::exchanges_handler::get_incoming))
        .route("/mine", get(handlers::exchanges_handler::get_mine))
        .route("/unacknowledged", get(handlers::exchanges_handler::get_unacknowledged))
        .route("/{id}/respond", post(handlers::exchanges_handler::respond_to_exchange))
        .route("/{id}/acknowledge", post(handlers::exchanges_handler::acknowledge_exchange));

    // Permission routes
    let permission_routes = Router::new()
        .route("/", post(handlers::permissions_handler::create_permission))
        .route("/mine", get(handlers::permissions_handler::get_mine))
        .route("/pending", get(handlers::permissions_handler::get_pending))
        .route("/{id}/decision", post(handlers::permissions_handler::decide_permission));

    let debug_routes = Router::new()
        .route("/debug", get(handlers::debug_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_debug_key));

    let trace = TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
        tracing::info_span!(
            "http_request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = tracing::field::Empty,
        )
    });

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api/rosters", roster_routes)
        .nest("/api/exchanges", exchange_routes)
        .nest("/api/permissions", permission_routes)
        .route("/api/permission-types", get(handlers::references_handler::get_permission_types))
        .route("/api/pending-count", get(handlers::pending_handler::get_pending_count))
        .merge(debug_routes)
        .route_layer(middleware::from_fn(metrics_middleware))
        .route("/metrics", get(handlers::metrics_handler))
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(trace)
        .layer(cors)
        .with_state(state)
}

/// Stores an empty calendar grid for `count` consecutive months starting at `from`'s month.
/// Months that already have a record are left alone.
pub async fn seed_blank_months(
    roster: &InMemoryRosterRepository,
    months: &dyn MonthKeyResolver,
    from: NaiveDate,
    count: u32,
) -> usize {
    let mut seeded = 0;
    for offset in 0..count {
        let Some(first) = from.with_day(1).and_then(|d| d.checked_add_months(Months::new(offset))) else {
            continue;
        };
        let month_key = months.month_key(first);
        if roster.contains(&month_key).await {
            continue;
        }
        if let Some(record) = RosterRecord::blank(month_key.clone(), first.year(), first.month()) {
            roster.insert(record).await;
            tracing::debug!(month_key = %month_key, "Seeded blank roster");
            seeded += 1;
        }
    }
    seeded
}
