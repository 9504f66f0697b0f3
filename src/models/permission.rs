use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

use super::roster::{AgentId, ShiftChange};
use super::Decision;

/// Kind of leave an agent can request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PermissionType {
    pub id: i32,
    pub name: String,
    /// Stamped on the roster for every day of an approved request
    pub initial_roster_symbol: ShiftChange,
    pub requires_approval: bool,
    pub category: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PermissionStatus {
    Pending,
    Approved,
    Rejected,
}

impl PermissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionStatus::Pending => "PENDING",
            PermissionStatus::Approved => "APPROVED",
            PermissionStatus::Rejected => "REJECTED",
        }
    }

    pub fn after(&self, decision: Decision) -> Option<PermissionStatus> {
        match (self, decision) {
            (PermissionStatus::Pending, Decision::Approve) => Some(PermissionStatus::Approved),
            (PermissionStatus::Pending, Decision::Reject) => Some(PermissionStatus::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for PermissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(PermissionStatus::Pending),
            "APPROVED" => Ok(PermissionStatus::Approved),
            "REJECTED" => Ok(PermissionStatus::Rejected),
            other => Err(format!("Unknown permission status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PermissionRequest {
    pub id: i32,
    pub agent_id: AgentId,
    pub type_id: i32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: PermissionStatus,
    pub attachments: Vec<String>,
    pub decided_by: Option<AgentId>,
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPermissionRequest {
    pub agent_id: AgentId,
    pub type_id: i32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: PermissionStatus,
    pub attachments: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PermissionFilter {
    pub agent_id: Option<AgentId>,
    pub status: Option<PermissionStatus>,
}

impl PermissionFilter {
    pub fn matches(&self, request: &PermissionRequest) -> bool {
        self.agent_id.map_or(true, |id| request.agent_id == id)
            && self.status.map_or(true, |s| request.status == s)
    }
}
