pub mod debug;
pub mod exchanges_handler;
pub mod health;
pub mod metrics;
pub mod pending_handler;
pub mod permissions_handler;
pub mod references_handler;
pub mod rosters_handler;

pub use debug::debug_handler;
pub use health::health_check;
pub use metrics::{metrics_handler, setup_metrics_recorder, MetricsState};
