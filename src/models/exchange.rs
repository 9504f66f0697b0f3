use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

use super::roster::{AgentId, ShiftType};
use super::Decision;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExchangeStatus {
    Proposed,
    /// Claimed by an approver; roster writes may be in flight.
    Approving,
    ApprovedBoth,
    Rejected,
}

impl ExchangeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeStatus::Proposed => "PROPOSED",
            ExchangeStatus::Approving => "APPROVING",
            ExchangeStatus::ApprovedBoth => "APPROVED_BOTH",
            ExchangeStatus::Rejected => "REJECTED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ExchangeStatus::ApprovedBoth | ExchangeStatus::Rejected)
    }

    /// Status reached by applying `decision`, or `None` when the transition is not allowed.
    pub fn after(&self, decision: Decision) -> Option<ExchangeStatus> {
        match (self, decision) {
            (ExchangeStatus::Proposed | ExchangeStatus::Approving, Decision::Approve) => {
                Some(ExchangeStatus::ApprovedBoth)
            }
            (ExchangeStatus::Proposed, Decision::Reject) => Some(ExchangeStatus::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for ExchangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExchangeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PROPOSED" => Ok(ExchangeStatus::Proposed),
            "APPROVING" => Ok(ExchangeStatus::Approving),
            "APPROVED_BOTH" => Ok(ExchangeStatus::ApprovedBoth),
            "REJECTED" => Ok(ExchangeStatus::Rejected),
            other => Err(format!("Unknown exchange status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ExchangeRequest {
    pub id: i32,
    pub requester_agent_id: AgentId,
    pub requester_shift_date: NaiveDate,
    pub requester_shift_type: ShiftType,
    pub target_agent_id: AgentId,
    pub target_shift_date: NaiveDate,
    pub target_shift_type: ShiftType,
    pub requester_comments: Option<String>,
    pub status: ExchangeStatus,
    /// Set once the requester's slot has been handed to the target.
    pub requester_side_applied: bool,
    /// Set once the target's slot has been handed to the requester.
    pub target_side_applied: bool,
    pub admin_notified: bool,
    pub resolved_by: Option<AgentId>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ExchangeRequest {
    pub fn side_applied(&self, side: ExchangeSide) -> bool {
        match side {
            ExchangeSide::Requester => self.requester_side_applied,
            ExchangeSide::Target => self.target_side_applied,
        }
    }

    pub fn any_side_applied(&self) -> bool {
        self.requester_side_applied || self.target_side_applied
    }

    pub fn swap_plan(&self) -> SwapPlan {
        SwapPlan {
            requester_side: SwapSide {
                date: self.requester_shift_date,
                mover: self.requester_agent_id,
                receiver: self.target_agent_id,
                shift_type: self.requester_shift_type.clone(),
                applied: self.requester_side_applied,
            },
            target_side: SwapSide {
                date: self.target_shift_date,
                mover: self.target_agent_id,
                receiver: self.requester_agent_id,
                shift_type: self.target_shift_type.clone(),
                applied: self.target_side_applied,
            },
        }
    }
}

/// Fields of a proposal before it is stored.
#[derive(Debug, Clone)]
pub struct NewExchangeRequest {
    pub requester_agent_id: AgentId,
    pub requester_shift_date: NaiveDate,
    pub requester_shift_type: ShiftType,
    pub target_agent_id: AgentId,
    pub target_shift_date: NaiveDate,
    pub target_shift_type: ShiftType,
    pub requester_comments: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ExchangeFilter {
    pub requester_agent_id: Option<AgentId>,
    pub target_agent_id: Option<AgentId>,
    pub status: Option<ExchangeStatus>,
    pub admin_notified: Option<bool>,
}

impl ExchangeFilter {
    pub fn matches(&self, request: &ExchangeRequest) -> bool {
        self.requester_agent_id.map_or(true, |id| request.requester_agent_id == id)
            && self.target_agent_id.map_or(true, |id| request.target_agent_id == id)
            && self.status.map_or(true, |s| request.status == s)
            && self.admin_notified.map_or(true, |n| request.admin_notified == n)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeSide {
    Requester,
    Target,
}

impl ExchangeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeSide::Requester => "requester",
            ExchangeSide::Target => "target",
        }
    }
}

/// One half of a swap: on `date`, the slot of `mover` (holding `shift_type`
/// when the proposal was made) passes to `receiver`. `applied` is the stored
/// record that this half already landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapSide {
    pub date: NaiveDate,
    pub mover: AgentId,
    pub receiver: AgentId,
    pub shift_type: ShiftType,
    pub applied: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapPlan {
    pub requester_side: SwapSide,
    pub target_side: SwapSide,
}
