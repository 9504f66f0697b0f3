use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::roster::AgentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ViewerRole {
    Manager,
    Agent,
}

/// Who is calling into the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewer {
    pub agent_id: AgentId,
    pub role: ViewerRole,
}

impl Viewer {
    pub fn agent(agent_id: AgentId) -> Self {
        Self { agent_id, role: ViewerRole::Agent }
    }

    pub fn manager(agent_id: AgentId) -> Self {
        Self { agent_id, role: ViewerRole::Manager }
    }

    pub fn is_manager(&self) -> bool {
        self.role == ViewerRole::Manager
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PendingActionCount {
    pub count: u64,
}
