use serde::{Deserialize, Serialize};

use crate::models::{AgentId, Viewer, ViewerRole};

/// Claims of a session token issued by the identity service.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionClaims {
    pub sub: String,  // agent id, as a string
    pub role: ViewerRole,
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
}

impl SessionClaims {
    pub fn viewer(&self) -> Result<Viewer, String> {
        let agent_id: AgentId = self
            .sub
            .parse()
            .map_err(|_| format!("Subject '{}' is not an agent id", self.sub))?;
        Ok(Viewer {
            agent_id,
            role: self.role,
        })
    }
}
