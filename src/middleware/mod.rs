pub mod metrics;
pub mod request_id;
pub mod secret_auth;

pub use metrics::metrics_middleware;
pub use request_id::{request_id_middleware, REQUEST_ID_HEADER};
pub use secret_auth::require_debug_key;
