use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::roster::AgentId;
use super::{Decision, PermissionRequest};
use crate::roster::RangeOverrideReport;

/// Input for requesting leave. Dates are ISO `yyyy-mm-dd`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreatePermissionInput {
    /// Defaults to the authenticated agent; only managers may file for someone else
    pub agent_id: Option<AgentId>,
    pub type_id: i32,
    pub start_date: String,
    pub end_date: String,
    #[serde(default)]
    pub attachments: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DecidePermissionInput {
    pub decision: Decision,
}

/// Response for permission mutations; `projection` is present whenever the roster was touched
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PermissionMutationResponse {
    pub request: PermissionRequest,
    pub projection: Option<RangeOverrideReport>,
}
