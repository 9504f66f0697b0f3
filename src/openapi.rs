use utoipa::openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::Modify;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Duty Roster API",
        version = "0.1.0",
        description = "Monthly duty rosters, shift exchanges and leave projection for a police unit"
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server"),
    ),
    paths(
        // Health
        crate::handlers::health::health_check,

        // Rosters
        crate::handlers::rosters_handler::get_roster,
        crate::handlers::rosters_handler::get_day,
        crate::handlers::rosters_handler::put_slot,
        crate::handlers::rosters_handler::post_override,

        // Exchanges
        crate::handlers::exchanges_handler::get_preview,
        crate::handlers::exchanges_handler::create_exchange,
        crate::handlers::exchanges_handler::get_incoming,
        crate::handlers::exchanges_handler::get_mine,
        crate::handlers::exchanges_handler::get_unacknowledged,
        crate::handlers::exchanges_handler::respond_to_exchange,
        crate::handlers::exchanges_handler::acknowledge_exchange,

        // Permissions
        crate::handlers::permissions_handler::create_permission,
        crate::handlers::permissions_handler::get_mine,
        crate::handlers::permissions_handler::get_pending,
        crate::handlers::permissions_handler::decide_permission,

        // References
        crate::handlers::references_handler::get_permission_types,

        // Pending
        crate::handlers::pending_handler::get_pending_count,
    ),
    components(
        schemas(
            // Core models
            crate::models::RosterRecord,
            crate::models::Week,
            crate::models::DaySchedule,
            crate::models::ShiftAssignment,
            crate::models::ShiftChange,
            crate::models::ExchangeRequest,
            crate::models::ExchangeStatus,
            crate::models::PermissionRequest,
            crate::models::PermissionStatus,
            crate::models::PermissionType,
            crate::models::Decision,
            crate::models::ViewerRole,

            // Engine reports
            crate::roster::SlotOutcome,
            crate::roster::FailedDate,
            crate::roster::FailureReason,
            crate::roster::RangeOverrideReport,
            crate::roster::SideOutcome,
            crate::roster::SwapReport,

            // Input and response models
            crate::models::RosterView,
            crate::models::OverwriteSlotInput,
            crate::models::RangeOverrideInput,
            crate::models::SlotWriteResponse,
            crate::models::CreateExchangeInput,
            crate::models::RespondToExchangeInput,
            crate::models::ExchangePreview,
            crate::models::ExchangeDecisionResponse,
            crate::models::CreatePermissionInput,
            crate::models::DecidePermissionInput,
            crate::models::PermissionMutationResponse,
            crate::models::PendingActionCount,
            crate::handlers::health::HealthReport,
        )
    ),
    tags(
        (name = "health", description = "Liveness and roster store reachability"),
        (name = "rosters", description = "Monthly roster reads and manager edits"),
        (name = "exchanges", description = "Shift exchanges between agents"),
        (name = "permissions", description = "Leave requests and their projection onto the roster"),
        (name = "references", description = "Reference data"),
        (name = "pending", description = "Pending-action badge"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "cookie_auth",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new("__session"))),
            );
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).bearer_format("JWT").build()),
            );
        }
    }
}
