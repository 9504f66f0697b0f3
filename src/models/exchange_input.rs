use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::roster::{AgentId, ShiftType};
use super::{Decision, ExchangeRequest};
use crate::roster::SwapReport;

/// Input for proposing a shift exchange
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateExchangeInput {
    /// Defaults to the authenticated agent; only managers may propose on behalf of someone else
    pub requester_agent_id: Option<AgentId>,
    pub requester_date: NaiveDate,
    pub target_agent_id: AgentId,
    pub target_date: NaiveDate,
    pub comments: Option<String>,
}

/// Input for the target agent (or a manager) answering a proposal
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RespondToExchangeInput {
    pub decision: Decision,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ExchangePreviewQuery {
    #[serde(rename = "requesterAgentId")]
    pub requester_agent_id: AgentId,
    #[serde(rename = "requesterDate")]
    pub requester_date: String,
    #[serde(rename = "targetAgentId")]
    pub target_agent_id: AgentId,
    #[serde(rename = "targetDate")]
    pub target_date: String,
}

/// Current roster state of both sides of a would-be exchange
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ExchangePreview {
    pub requester_shift_type: Option<ShiftType>,
    pub target_shift_type: Option<ShiftType>,
}

/// Response after answering a proposal
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ExchangeDecisionResponse {
    pub request: ExchangeRequest,
    pub swap: Option<SwapReport>,
}
