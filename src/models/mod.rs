pub mod exchange;
pub mod exchange_input;
pub mod permission;
pub mod permission_input;
pub mod roster;
pub mod roster_input;
pub mod viewer;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub use exchange::{ExchangeFilter, ExchangeRequest, ExchangeSide, ExchangeStatus, NewExchangeRequest, SwapPlan, SwapSide};
pub use exchange_input::{CreateExchangeInput, ExchangeDecisionResponse, ExchangePreview, ExchangePreviewQuery, RespondToExchangeInput};
pub use permission::{NewPermissionRequest, PermissionFilter, PermissionRequest, PermissionStatus, PermissionType};
pub use permission_input::{CreatePermissionInput, DecidePermissionInput, PermissionMutationResponse};
pub use roster::{
    symbols, AgentId, DayPosition, DaySchedule, FieldWrite, MonthKey, RosterRecord, RosterSnapshot, ShiftAssignment,
    ShiftChange, ShiftType, SlotKey, SlotLocation, SlotPath, SlotWrite, Week,
};
pub use roster_input::{DayQuery, OverwriteSlotInput, RangeOverrideInput, RosterView, SlotWriteResponse};
pub use viewer::{PendingActionCount, Viewer, ViewerRole};

/// Answer to an exchange proposal or a permission request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn verb(&self) -> &'static str {
        match self {
            Decision::Approve => "approve",
            Decision::Reject => "reject",
        }
    }
}
