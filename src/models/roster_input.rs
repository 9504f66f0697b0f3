use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::roster::{AgentId, MonthKey, ShiftChange, Week};
use crate::roster::SlotOutcome;

/// Input for overwriting one agent's slot on one day
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OverwriteSlotInput {
    pub agent_id: AgentId,
    pub date: NaiveDate,
    pub change: ShiftChange,
}

/// Input for stamping a change over an inclusive date range
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RangeOverrideInput {
    pub agent_id: AgentId,
    pub start_date: String,
    pub end_date: String,
    pub change: ShiftChange,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RosterView {
    pub month_key: MonthKey,
    pub version: i64,
    pub weeks: Vec<Week>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct DayQuery {
    /// ISO date, `yyyy-mm-dd`
    pub date: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SlotWriteResponse {
    pub outcome: SlotOutcome,
}
