use crate::models::Viewer;
use crate::{AppError, AppResult};

/// Fails with 403 unless the viewer is a manager.
pub fn require_manager(viewer: &Viewer, action: &str) -> AppResult<()> {
    if viewer.is_manager() {
        return Ok(());
    }
    tracing::warn!(agent_id = viewer.agent_id, action, "Manager-only action refused");
    Err(AppError::Forbidden(format!("Only managers can {}", action)))
}
