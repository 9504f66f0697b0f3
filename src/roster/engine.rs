use chrono::NaiveDate;
use metrics::counter;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use super::{date_range, FailureReason, MonthKeyResolver, RosterError};
use crate::models::{
    AgentId, DaySchedule, FieldWrite, MonthKey, RosterSnapshot, ShiftAssignment, ShiftChange, SlotLocation, SlotPath,
    SwapPlan, SwapSide,
};
use crate::repositories::{RepositoryError, RosterRepository};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SlotOutcome {
    Created,
    Updated,
    /// The slot already held the requested symbol.
    Unchanged,
    /// `ShiftChange::NoChange`; nothing was read or written.
    Skipped,
}

impl SlotOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            SlotOutcome::Created => "created",
            SlotOutcome::Updated => "updated",
            SlotOutcome::Unchanged => "unchanged",
            SlotOutcome::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct FailedDate {
    pub date: NaiveDate,
    pub reason: FailureReason,
    pub detail: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct RangeOverrideReport {
    pub dates_applied: Vec<NaiveDate>,
    pub dates_failed: Vec<FailedDate>,
    pub skipped: bool,
}

impl RangeOverrideReport {
    pub fn is_complete(&self) -> bool {
        self.dates_failed.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SideOutcome {
    Swapped,
    /// The side had already been swapped by an earlier attempt.
    AlreadySwapped,
    Failed { reason: FailureReason, detail: String },
}

impl SideOutcome {
    pub fn succeeded(&self) -> bool {
        !matches!(self, SideOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SwapReport {
    pub requester_side: SideOutcome,
    pub target_side: SideOutcome,
}

impl SwapReport {
    pub fn is_complete(&self) -> bool {
        self.requester_side.succeeded() && self.target_side.succeeded()
    }
}

/// What a read-decide step wants done with the snapshot it was given.
enum Plan<T> {
    Done(T),
    Write(Vec<FieldWrite>, T),
}

/// Locates and rewrites duty slots. Every write re-reads the month record,
/// decides against that snapshot and commits with the snapshot's version.
#[derive(Clone)]
pub struct MutationEngine {
    roster: Arc<dyn RosterRepository>,
    months: Arc<dyn MonthKeyResolver>,
    write_attempts: u32,
}

impl MutationEngine {
    pub fn new(roster: Arc<dyn RosterRepository>, months: Arc<dyn MonthKeyResolver>, write_attempts: u32) -> Self {
        Self {
            roster,
            months,
            write_attempts: write_attempts.max(1),
        }
    }

    pub fn month_key(&self, date: NaiveDate) -> MonthKey {
        self.months.month_key(date)
    }

    pub async fn load_month(&self, month_key: &MonthKey) -> Result<Option<RosterSnapshot>, RosterError> {
        Ok(self.roster.get(month_key).await?)
    }

    async fn load_for(&self, month_key: &MonthKey, date: NaiveDate) -> Result<RosterSnapshot, RosterError> {
        self.roster
            .get(month_key)
            .await?
            .ok_or_else(|| RosterError::RosterMissing {
                month_key: month_key.clone(),
                date,
            })
    }

    pub async fn read_day(&self, date: NaiveDate) -> Result<DaySchedule, RosterError> {
        let month_key = self.month_key(date);
        let snapshot = self.load_for(&month_key, date).await?;
        snapshot
            .day(date)
            .cloned()
            .ok_or(RosterError::DayMissing { month_key, date })
    }

    /// Current assignment of `agent_id` on `date`, `None` when the agent is off the roster that day.
    pub async fn read_slot(&self, date: NaiveDate, agent_id: AgentId) -> Result<Option<ShiftAssignment>, RosterError> {
        let month_key = self.month_key(date);
        let snapshot = self.load_for(&month_key, date).await?;
        match snapshot.locate_slot(date, agent_id) {
            SlotLocation::Found { assignment, .. } => Ok(Some(assignment)),
            SlotLocation::Vacant { .. } => Ok(None),
            SlotLocation::DayMissing => Err(RosterError::DayMissing { month_key, date }),
        }
    }

    /// Sets the symbol of `agent_id` on `date`, creating the slot if the agent has none.
    pub async fn overwrite_slot(
        &self,
        date: NaiveDate,
        agent_id: AgentId,
        change: &ShiftChange,
    ) -> Result<SlotOutcome, RosterError> {
        let Some(symbol) = change.symbol() else {
            return Ok(SlotOutcome::Skipped);
        };

        let month_key = self.month_key(date);
        let outcome = self
            .write_with_retry(&month_key, date, |snapshot| {
                let plan = match snapshot.locate_slot(date, agent_id) {
                    SlotLocation::DayMissing => {
                        return Err(RosterError::DayMissing {
                            month_key: month_key.clone(),
                            date,
                        })
                    }
                    SlotLocation::Found { assignment, .. } if &assignment.shift_type == symbol => {
                        Plan::Done(SlotOutcome::Unchanged)
                    }
                    SlotLocation::Found { path, .. } => {
                        Plan::Write(vec![FieldWrite::shift_type(path, symbol.clone())], SlotOutcome::Updated)
                    }
                    SlotLocation::Vacant { day, key } => Plan::Write(
                        vec![FieldWrite::assignment(
                            SlotPath::new(day, key),
                            ShiftAssignment::new(agent_id, symbol.clone()),
                        )],
                        SlotOutcome::Created,
                    ),
                };
                Ok(plan)
            })
            .await?;

        counter!("roster_slot_writes_total", "outcome" => outcome.as_str()).increment(1);
        tracing::debug!(agent_id, %date, month_key = %month_key, outcome = outcome.as_str(), "Slot overwritten");
        Ok(outcome)
    }

    /// Applies `change` to every date in `[start, end]`. The range is validated
    /// before anything is written; after that each date succeeds or fails on its own.
    pub async fn apply_range_override(
        &self,
        agent_id: AgentId,
        start: NaiveDate,
        end: NaiveDate,
        change: &ShiftChange,
    ) -> Result<RangeOverrideReport, RosterError> {
        let dates = date_range(start, end)?;

        if matches!(change, ShiftChange::NoChange) {
            return Ok(RangeOverrideReport {
                skipped: true,
                ..Default::default()
            });
        }

        let mut report = RangeOverrideReport::default();
        for date in dates {
            match self.overwrite_slot(date, agent_id, change).await {
                Ok(_) => report.dates_applied.push(date),
                Err(e) => {
                    tracing::warn!(error = %e, agent_id, %date, "Range override skipped a date");
                    report.dates_failed.push(FailedDate {
                        date,
                        reason: FailureReason::from(&e),
                        detail: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            agent_id,
            %start,
            %end,
            applied = report.dates_applied.len(),
            failed = report.dates_failed.len(),
            "Range override finished"
        );
        Ok(report)
    }

    /// Read-only check that every side not yet applied is still as proposed.
    pub async fn validate_swap(&self, plan: &SwapPlan) -> Result<(), RosterError> {
        for side in [&plan.requester_side, &plan.target_side] {
            if side.applied {
                continue;
            }
            let month_key = self.month_key(side.date);
            let snapshot = self.load_for(&month_key, side.date).await?;
            check_unswapped(&snapshot, side)?;
        }
        Ok(())
    }

    /// Trades who works each side's date. Sides are written independently and
    /// a failed side does not undo the other. A side marked `applied` is
    /// reported `AlreadySwapped` without touching the roster.
    pub async fn apply_exchange_swap(&self, plan: &SwapPlan) -> SwapReport {
        if plan.requester_side.date == plan.target_side.date {
            // Both slots live on one day, so a single write trades them.
            let outcome = self.swap_side(&plan.requester_side, Some(&plan.target_side)).await;
            return SwapReport {
                requester_side: outcome.clone(),
                target_side: outcome,
            };
        }

        let requester_side = self.swap_side(&plan.requester_side, None).await;
        let target_side = self.swap_side(&plan.target_side, None).await;
        SwapReport {
            requester_side,
            target_side,
        }
    }

    async fn swap_side(&self, side: &SwapSide, same_day: Option<&SwapSide>) -> SideOutcome {
        if side.applied || same_day.map_or(false, |other| other.applied) {
            return SideOutcome::AlreadySwapped;
        }

        let month_key = self.month_key(side.date);
        let result = self
            .write_with_retry(&month_key, side.date, |snapshot| {
                check_unswapped(snapshot, side)?;
                if let Some(other) = same_day {
                    check_unswapped(snapshot, other)?;
                }
                Ok(Plan::Write(swap_writes(snapshot, side)?, SideOutcome::Swapped))
            })
            .await;

        match result {
            Ok(outcome) => {
                tracing::info!(
                    date = %side.date,
                    mover = side.mover,
                    receiver = side.receiver,
                    ?outcome,
                    "Swap side applied"
                );
                outcome
            }
            Err(e) => {
                tracing::error!(error = %e, date = %side.date, mover = side.mover, "Swap side failed");
                SideOutcome::Failed {
                    reason: FailureReason::from(&e),
                    detail: e.to_string(),
                }
            }
        }
    }

    /// Read, decide, compare-and-swap. A version conflict starts over from a
    /// fresh read, at most `write_attempts` times.
    async fn write_with_retry<T, F>(&self, month_key: &MonthKey, date: NaiveDate, decide: F) -> Result<T, RosterError>
    where
        F: Fn(&RosterSnapshot) -> Result<Plan<T>, RosterError>,
    {
        for attempt in 1..=self.write_attempts {
            let snapshot = self.load_for(month_key, date).await?;
            let (writes, result) = match decide(&snapshot)? {
                Plan::Done(result) => return Ok(result),
                Plan::Write(writes, result) => (writes, result),
            };

            match self.roster.merge_write(month_key, snapshot.version, &writes).await {
                Ok(_) => return Ok(result),
                Err(RepositoryError::Conflict(_)) => {
                    counter!("roster_write_conflicts_total").increment(1);
                    tracing::warn!(month_key = %month_key, %date, attempt, "Roster version conflict, retrying");
                }
                Err(RepositoryError::NotFound(_)) => {
                    return Err(RosterError::RosterMissing {
                        month_key: month_key.clone(),
                        date,
                    })
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(RosterError::Conflict {
            month_key: month_key.clone(),
            attempts: self.write_attempts,
        })
    }
}

/// The mover must still hold the proposed type. Whoever holds it now is
/// irrelevant: only the stored side flag says a swap already happened.
fn check_unswapped(snapshot: &RosterSnapshot, side: &SwapSide) -> Result<(), RosterError> {
    let Some(day) = snapshot.day(side.date) else {
        return Err(RosterError::StaleProposal(format!(
            "{} is no longer in roster {}",
            side.date,
            snapshot.month_key()
        )));
    };

    let holds = day
        .slot_of(side.mover)
        .map_or(false, |(_, assignment)| assignment.shift_type == side.shift_type);

    if holds {
        Ok(())
    } else {
        Err(RosterError::StaleProposal(format!(
            "agent {} no longer holds {} on {}",
            side.mover, side.shift_type, side.date
        )))
    }
}

/// Hands the mover's slot to the receiver and, if the receiver also works
/// that day, the receiver's slot to the mover. Keys and symbols stay put.
fn swap_writes(snapshot: &RosterSnapshot, side: &SwapSide) -> Result<Vec<FieldWrite>, RosterError> {
    let mover_path = snapshot
        .locate_slot(side.date, side.mover)
        .path()
        .cloned()
        .ok_or(RosterError::SlotNotFound {
            agent_id: side.mover,
            date: side.date,
        })?;

    let mut writes = vec![FieldWrite::agent_id(mover_path, side.receiver)];
    if let Some(receiver_path) = snapshot.locate_slot(side.date, side.receiver).path().cloned() {
        writes.push(FieldWrite::agent_id(receiver_path, side.mover));
    }
    Ok(writes)
}
