use chrono::NaiveDate;
use serde::Serialize;
use utoipa::ToSchema;

use super::engine::SwapReport;
use crate::models::{AgentId, MonthKey};
use crate::repositories::RepositoryError;

#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    #[error("No roster {month_key} exists for {date}")]
    RosterMissing { month_key: MonthKey, date: NaiveDate },

    #[error("Roster {month_key} has no day {date}")]
    DayMissing { month_key: MonthKey, date: NaiveDate },

    #[error("Agent {agent_id} has no shift on {date}")]
    SlotNotFound { agent_id: AgentId, date: NaiveDate },

    #[error("Proposal no longer matches the roster: {0}")]
    StaleProposal(String),

    #[error("Invalid date range: {0}")]
    InvalidDateRange(String),

    #[error("Roster {month_key} kept changing, gave up after {attempts} attempts")]
    Conflict { month_key: MonthKey, attempts: u32 },

    #[error("Cannot {action} a request that is {status}")]
    InvalidTransition { status: String, action: &'static str },

    #[error("Swap applied only partially")]
    SwapIncomplete(Box<SwapReport>),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    Storage(#[from] RepositoryError),
}

/// Why one date of a range operation, or one side of a swap, was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    RosterMissing,
    DayMissing,
    SlotNotFound,
    StaleProposal,
    Conflict,
    Storage,
}

impl From<&RosterError> for FailureReason {
    fn from(error: &RosterError) -> Self {
        match error {
            RosterError::RosterMissing { .. } => FailureReason::RosterMissing,
            RosterError::DayMissing { .. } => FailureReason::DayMissing,
            RosterError::SlotNotFound { .. } => FailureReason::SlotNotFound,
            RosterError::StaleProposal(_) => FailureReason::StaleProposal,
            RosterError::Conflict { .. } => FailureReason::Conflict,
            _ => FailureReason::Storage,
        }
    }
}
