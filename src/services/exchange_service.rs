use chrono::NaiveDate;
use metrics::counter;
use std::sync::Arc;

use crate::models::{
    AgentId, CreateExchangeInput, Decision, ExchangeDecisionResponse, ExchangeFilter, ExchangePreview, ExchangeRequest,
    ExchangeSide, ExchangeStatus, NewExchangeRequest, Viewer,
};
use crate::repositories::ExchangeRepository;
use crate::roster::{FailureReason, MutationEngine, RosterError, SideOutcome, SwapReport};

/// Two-party shift exchange proposals and their effect on the roster.
#[derive(Clone)]
pub struct ExchangeService {
    engine: MutationEngine,
    exchanges: Arc<dyn ExchangeRepository>,
}

impl ExchangeService {
    pub fn new(engine: MutationEngine, exchanges: Arc<dyn ExchangeRepository>) -> Self {
        Self { engine, exchanges }
    }

    /// Current shift types of both sides; `None` where the agent is not rostered.
    pub async fn preview(
        &self,
        requester_agent_id: AgentId,
        requester_date: NaiveDate,
        target_agent_id: AgentId,
        target_date: NaiveDate,
    ) -> Result<ExchangePreview, RosterError> {
        let requester = self.engine.read_slot(requester_date, requester_agent_id).await?;
        let target = self.engine.read_slot(target_date, target_agent_id).await?;
        Ok(ExchangePreview {
            requester_shift_type: requester.map(|a| a.shift_type),
            target_shift_type: target.map(|a| a.shift_type),
        })
    }

    pub async fn submit(&self, viewer: &Viewer, input: CreateExchangeInput) -> Result<ExchangeRequest, RosterError> {
        let requester_agent_id = input.requester_agent_id.unwrap_or(viewer.agent_id);
        if requester_agent_id != viewer.agent_id && !viewer.is_manager() {
            return Err(RosterError::Forbidden(
                "Only managers can propose exchanges for another agent".to_string(),
            ));
        }
        if requester_agent_id == input.target_agent_id {
            return Err(RosterError::Validation("An agent cannot exchange shifts with themselves".to_string()));
        }

        let requester_slot = self
            .engine
            .read_slot(input.requester_date, requester_agent_id)
            .await?
            .ok_or(RosterError::SlotNotFound {
                agent_id: requester_agent_id,
                date: input.requester_date,
            })?;
        let target_slot = self
            .engine
            .read_slot(input.target_date, input.target_agent_id)
            .await?
            .ok_or(RosterError::SlotNotFound {
                agent_id: input.target_agent_id,
                date: input.target_date,
            })?;

        if input.requester_date == input.target_date && requester_slot.shift_type == target_slot.shift_type {
            return Err(RosterError::Validation(format!(
                "Both agents already work {} on {}",
                requester_slot.shift_type, input.requester_date
            )));
        }

        let created = self
            .exchanges
            .insert(NewExchangeRequest {
                requester_agent_id,
                requester_shift_date: input.requester_date,
                requester_shift_type: requester_slot.shift_type,
                target_agent_id: input.target_agent_id,
                target_shift_date: input.target_date,
                target_shift_type: target_slot.shift_type,
                requester_comments: input.comments.filter(|c| !c.trim().is_empty()),
            })
            .await?;

        counter!("exchange_transitions_total", "to" => ExchangeStatus::Proposed.as_str()).increment(1);
        tracing::info!(
            request_id = created.id,
            requester = created.requester_agent_id,
            target = created.target_agent_id,
            "Exchange proposed"
        );
        Ok(created)
    }

    /// Approve or reject a proposal. Only the target agent or a manager may answer.
    pub async fn respond(
        &self,
        viewer: &Viewer,
        id: i32,
        decision: Decision,
    ) -> Result<ExchangeDecisionResponse, RosterError> {
        let request = self.find(id).await?;
        if !viewer.is_manager() && viewer.agent_id != request.target_agent_id {
            return Err(RosterError::Forbidden(
                "Only the target agent or a manager can answer this proposal".to_string(),
            ));
        }

        let Some(next) = request.status.after(decision) else {
            return Err(RosterError::InvalidTransition {
                status: request.status.to_string(),
                action: decision.verb(),
            });
        };

        if decision == Decision::Approve {
            return self.approve(viewer, request).await;
        }

        let rejected = self
            .exchanges
            .transition(id, ExchangeStatus::Proposed, next, viewer.agent_id)
            .await?;
        let rejected = self.settled(id, rejected, decision).await?;

        counter!("exchange_transitions_total", "to" => next.as_str()).increment(1);
        tracing::info!(request_id = id, status = %next, decided_by = viewer.agent_id, "Exchange resolved");
        Ok(ExchangeDecisionResponse {
            request: rejected,
            swap: None,
        })
    }

    /// Claims the request as `Approving` before any roster write, so a late
    /// rejection cannot land on a swapped roster. Each side that lands is
    /// recorded; an approval that stopped part-way is finished by approving again.
    async fn approve(&self, viewer: &Viewer, request: ExchangeRequest) -> Result<ExchangeDecisionResponse, RosterError> {
        let id = request.id;
        let fresh_claim = request.status == ExchangeStatus::Proposed;

        let claimed = if fresh_claim {
            self.engine.validate_swap(&request.swap_plan()).await.map_err(|e| {
                tracing::warn!(error = %e, request_id = id, "Exchange approval refused");
                e
            })?;
            let claimed = self
                .exchanges
                .transition(id, ExchangeStatus::Proposed, ExchangeStatus::Approving, viewer.agent_id)
                .await?;
            self.settled(id, claimed, Decision::Approve).await?
        } else if request.any_side_applied() {
            tracing::info!(request_id = id, "Resuming partly applied exchange");
            request
        } else {
            // Another approval holds the claim and has not landed anything yet.
            return Err(RosterError::InvalidTransition {
                status: request.status.to_string(),
                action: Decision::Approve.verb(),
            });
        };

        let report = self.engine.apply_exchange_swap(&claimed.swap_plan()).await;

        let mut current = claimed;
        for (side, outcome) in [
            (ExchangeSide::Requester, &report.requester_side),
            (ExchangeSide::Target, &report.target_side),
        ] {
            if *outcome == SideOutcome::Swapped {
                let marked = self.exchanges.mark_side_applied(id, side).await?;
                current = self.settled(id, marked, Decision::Approve).await?;
            }
        }

        if !report.is_complete() {
            if fresh_claim && !current.any_side_applied() && self.exchanges.release_claim(id).await?.is_some() {
                tracing::warn!(request_id = id, ?report, "Exchange swap wrote nothing, request back to proposed");
                return Err(unapplied_swap_error(report));
            }
            tracing::warn!(request_id = id, ?report, "Exchange swap incomplete, request stays approving");
            return Err(RosterError::SwapIncomplete(Box::new(report)));
        }

        let approved = self
            .exchanges
            .transition(id, ExchangeStatus::Approving, ExchangeStatus::ApprovedBoth, viewer.agent_id)
            .await?;
        let approved = self.settled(id, approved, Decision::Approve).await?;

        counter!("exchange_transitions_total", "to" => ExchangeStatus::ApprovedBoth.as_str()).increment(1);
        tracing::info!(request_id = id, status = %approved.status, decided_by = viewer.agent_id, "Exchange resolved");
        Ok(ExchangeDecisionResponse {
            request: approved,
            swap: Some(report),
        })
    }

    /// Unwraps a conditional update. `None` means someone else moved the
    /// request first; report the status it has now.
    async fn settled(
        &self,
        id: i32,
        updated: Option<ExchangeRequest>,
        decision: Decision,
    ) -> Result<ExchangeRequest, RosterError> {
        match updated {
            Some(request) => Ok(request),
            None => {
                let current = self.find(id).await?;
                Err(RosterError::InvalidTransition {
                    status: current.status.to_string(),
                    action: decision.verb(),
                })
            }
        }
    }

    /// Manager sign-off on an approved exchange. Repeating it changes nothing.
    pub async fn acknowledge(&self, viewer: &Viewer, id: i32) -> Result<ExchangeRequest, RosterError> {
        if !viewer.is_manager() {
            return Err(RosterError::Forbidden("Only managers can acknowledge exchanges".to_string()));
        }

        match self.exchanges.mark_admin_notified(id).await? {
            Some(request) => {
                tracing::info!(request_id = id, manager = viewer.agent_id, "Exchange acknowledged");
                Ok(request)
            }
            None => {
                let current = self.find(id).await?;
                Err(RosterError::InvalidTransition {
                    status: current.status.to_string(),
                    action: "acknowledge",
                })
            }
        }
    }

    pub async fn incoming(&self, viewer: &Viewer) -> Result<Vec<ExchangeRequest>, RosterError> {
        let filter = ExchangeFilter {
            target_agent_id: Some(viewer.agent_id),
            ..Default::default()
        };
        Ok(self.exchanges.list(&filter).await?)
    }

    pub async fn mine(&self, viewer: &Viewer) -> Result<Vec<ExchangeRequest>, RosterError> {
        let filter = ExchangeFilter {
            requester_agent_id: Some(viewer.agent_id),
            ..Default::default()
        };
        Ok(self.exchanges.list(&filter).await?)
    }

    pub async fn unacknowledged(&self, viewer: &Viewer) -> Result<Vec<ExchangeRequest>, RosterError> {
        if !viewer.is_manager() {
            return Err(RosterError::Forbidden("Only managers can view the acknowledgement queue".to_string()));
        }
        Ok(self.exchanges.list(&unacknowledged_filter()).await?)
    }

    async fn find(&self, id: i32) -> Result<ExchangeRequest, RosterError> {
        self.exchanges
            .find_by_id(id)
            .await?
            .ok_or_else(|| RosterError::NotFound(format!("Exchange request {}", id)))
    }
}

/// A swap that landed nothing is reported as stale when either side was.
fn unapplied_swap_error(report: SwapReport) -> RosterError {
    for outcome in [&report.requester_side, &report.target_side] {
        if let SideOutcome::Failed {
            reason: FailureReason::StaleProposal,
            detail,
        } = outcome
        {
            return RosterError::StaleProposal(detail.clone());
        }
    }
    RosterError::SwapIncomplete(Box::new(report))
}

pub(crate) fn unacknowledged_filter() -> ExchangeFilter {
    ExchangeFilter {
        status: Some(ExchangeStatus::ApprovedBoth),
        admin_notified: Some(false),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        FieldWrite, MonthKey, RosterRecord, RosterSnapshot, ShiftAssignment, ShiftChange, ShiftType, SlotKey,
    };
    use crate::repositories::{
        InMemoryExchangeRepository, InMemoryPermissionRepository, InMemoryRosterRepository, RepositoryError,
        RosterRepository,
    };
    use crate::roster::NamedMonthKeys;
    use crate::services::PendingActionCounter;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
    use std::sync::{Mutex, OnceLock};

    const A: AgentId = 1;
    const B: AgentId = 2;

    fn st(symbol: &str) -> ShiftType {
        ShiftType::new(symbol).unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    struct Fixture {
        service: ExchangeService,
        engine: MutationEngine,
        roster: Arc<dyn RosterRepository>,
        exchanges: InMemoryExchangeRepository,
    }

    /// A = M on 2025-07-10, B = T on 2025-07-12.
    fn july() -> RosterRecord {
        let mut record = RosterRecord::blank(MonthKey::new("julio-2025"), 2025, 7).unwrap();
        record.weeks[1].days[3]
            .shifts
            .insert(SlotKey::new("1720000000001"), ShiftAssignment::new(A, st("M")));
        record.weeks[1].days[5]
            .shifts
            .insert(SlotKey::new("1720000000002"), ShiftAssignment::new(B, st("T")));
        record
    }

    async fn fixture_with(roster: Arc<dyn RosterRepository>) -> Fixture {
        let engine = MutationEngine::new(roster.clone(), Arc::new(NamedMonthKeys::default()), 3);
        let exchanges = InMemoryExchangeRepository::new();
        let service = ExchangeService::new(engine.clone(), Arc::new(exchanges.clone()));
        Fixture {
            service,
            engine,
            roster,
            exchanges,
        }
    }

    async fn fixture() -> Fixture {
        let roster = InMemoryRosterRepository::new();
        roster.insert(july()).await;
        fixture_with(Arc::new(roster)).await
    }

    fn proposal() -> CreateExchangeInput {
        CreateExchangeInput {
            requester_agent_id: None,
            requester_date: date("2025-07-10"),
            target_agent_id: B,
            target_date: date("2025-07-12"),
            comments: Some("family event".to_string()),
        }
    }

    #[tokio::test]
    async fn test_submit_snapshots_both_shift_types() {
        let f = fixture().await;
        let created = f.service.submit(&Viewer::agent(A), proposal()).await.unwrap();
        assert_eq!(created.status, ExchangeStatus::Proposed);
        assert_eq!(created.requester_shift_type, st("M"));
        assert_eq!(created.target_shift_type, st("T"));
        assert!(!created.admin_notified);
    }

    #[tokio::test]
    async fn test_submit_rejects_self_exchange_and_missing_slot() {
        let f = fixture().await;
        let mut own = proposal();
        own.target_agent_id = A;
        assert!(matches!(
            f.service.submit(&Viewer::agent(A), own).await,
            Err(RosterError::Validation(_))
        ));

        let mut off_day = proposal();
        off_day.target_date = date("2025-07-13");
        assert!(matches!(
            f.service.submit(&Viewer::agent(A), off_day).await,
            Err(RosterError::SlotNotFound { agent_id: B, .. })
        ));
    }

    #[tokio::test]
    async fn test_agent_cannot_submit_for_someone_else() {
        let f = fixture().await;
        let mut input = proposal();
        input.requester_agent_id = Some(A);
        assert!(matches!(
            f.service.submit(&Viewer::agent(7), input.clone()).await,
            Err(RosterError::Forbidden(_))
        ));
        assert!(f.service.submit(&Viewer::manager(99), input).await.is_ok());
    }

    #[tokio::test]
    async fn test_approve_swaps_roster_and_resolves() {
        let f = fixture().await;
        let created = f.service.submit(&Viewer::agent(A), proposal()).await.unwrap();

        let response = f
            .service
            .respond(&Viewer::agent(B), created.id, Decision::Approve)
            .await
            .unwrap();
        assert_eq!(response.request.status, ExchangeStatus::ApprovedBoth);
        assert_eq!(response.request.resolved_by, Some(B));
        assert!(!response.request.admin_notified);
        let swap = response.swap.unwrap();
        assert_eq!(swap.requester_side, SideOutcome::Swapped);
        assert_eq!(swap.target_side, SideOutcome::Swapped);

        assert_eq!(
            f.engine.read_slot(date("2025-07-10"), B).await.unwrap(),
            Some(ShiftAssignment::new(B, st("M")))
        );
        assert_eq!(
            f.engine.read_slot(date("2025-07-12"), A).await.unwrap(),
            Some(ShiftAssignment::new(A, st("T")))
        );
        assert_eq!(f.engine.read_slot(date("2025-07-10"), A).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_only_target_or_manager_can_respond() {
        let f = fixture().await;
        let created = f.service.submit(&Viewer::agent(A), proposal()).await.unwrap();
        assert!(matches!(
            f.service.respond(&Viewer::agent(A), created.id, Decision::Approve).await,
            Err(RosterError::Forbidden(_))
        ));
        let rejected = f
            .service
            .respond(&Viewer::manager(99), created.id, Decision::Reject)
            .await
            .unwrap();
        assert_eq!(rejected.request.status, ExchangeStatus::Rejected);
        assert!(rejected.swap.is_none());
    }

    #[tokio::test]
    async fn test_reject_leaves_roster_alone_and_is_terminal() {
        let f = fixture().await;
        let created = f.service.submit(&Viewer::agent(A), proposal()).await.unwrap();
        f.service
            .respond(&Viewer::agent(B), created.id, Decision::Reject)
            .await
            .unwrap();

        let snapshot = f.roster.get(&MonthKey::new("julio-2025")).await.unwrap().unwrap();
        assert_eq!(snapshot.version, 0);

        let err = f
            .service
            .respond(&Viewer::agent(B), created.id, Decision::Approve)
            .await
            .unwrap_err();
        assert!(matches!(err, RosterError::InvalidTransition { action: "approve", .. }));
    }

    #[tokio::test]
    async fn test_stale_proposal_keeps_request_proposed() {
        let f = fixture().await;
        let created = f.service.submit(&Viewer::agent(A), proposal()).await.unwrap();
        f.engine
            .overwrite_slot(date("2025-07-10"), A, &ShiftChange::Assign(st("N")))
            .await
            .unwrap();

        let err = f
            .service
            .respond(&Viewer::agent(B), created.id, Decision::Approve)
            .await
            .unwrap_err();
        assert!(matches!(err, RosterError::StaleProposal(_)));
        let mine = f.service.mine(&Viewer::agent(A)).await.unwrap();
        assert_eq!(mine[0].status, ExchangeStatus::Proposed);
        assert_eq!(
            f.engine.read_slot(date("2025-07-12"), B).await.unwrap(),
            Some(ShiftAssignment::new(B, st("T")))
        );
    }

    /// Refuses every write to one month while `broken` is set.
    struct BrokenMonth {
        inner: InMemoryRosterRepository,
        month_key: MonthKey,
        broken: AtomicBool,
    }

    #[async_trait]
    impl RosterRepository for BrokenMonth {
        async fn get(&self, month_key: &MonthKey) -> Result<Option<RosterSnapshot>, RepositoryError> {
            self.inner.get(month_key).await
        }

        async fn merge_write(
            &self,
            month_key: &MonthKey,
            expected_version: i64,
            writes: &[FieldWrite],
        ) -> Result<i64, RepositoryError> {
            if *month_key == self.month_key && self.broken.load(Ordering::SeqCst) {
                return Err(RepositoryError::InvalidPath("disk full".to_string()));
            }
            self.inner.merge_write(month_key, expected_version, writes).await
        }
    }

    #[tokio::test]
    async fn test_incomplete_swap_keeps_claim_and_retry_completes() {
        let inner = InMemoryRosterRepository::new();
        inner.insert(july()).await;
        let mut august = RosterRecord::blank(MonthKey::new("agosto-2025"), 2025, 8).unwrap();
        // 2025-08-04 is the Monday of the second week.
        august.weeks[1].days[0]
            .shifts
            .insert(SlotKey::for_agent(B), ShiftAssignment::new(B, st("N")));
        inner.insert(august).await;
        let roster = Arc::new(BrokenMonth {
            inner,
            month_key: MonthKey::new("agosto-2025"),
            broken: AtomicBool::new(true),
        });
        let f = fixture_with(roster.clone()).await;

        let mut input = proposal();
        input.target_date = date("2025-08-04");
        let created = f.service.submit(&Viewer::agent(A), input).await.unwrap();

        let err = f
            .service
            .respond(&Viewer::agent(B), created.id, Decision::Approve)
            .await
            .unwrap_err();
        let RosterError::SwapIncomplete(report) = err else {
            panic!("expected SwapIncomplete, got {:?}", err);
        };
        assert_eq!(report.requester_side, SideOutcome::Swapped);
        assert!(matches!(report.target_side, SideOutcome::Failed { .. }));
        let mine = f.service.mine(&Viewer::agent(A)).await.unwrap();
        assert_eq!(mine[0].status, ExchangeStatus::Approving);
        assert!(mine[0].requester_side_applied);
        assert!(!mine[0].target_side_applied);

        // Half the swap is in the roster, so it can no longer be turned down.
        assert!(matches!(
            f.service.respond(&Viewer::agent(B), created.id, Decision::Reject).await,
            Err(RosterError::InvalidTransition { action: "reject", .. })
        ));

        roster.broken.store(false, Ordering::SeqCst);
        let response = f
            .service
            .respond(&Viewer::agent(B), created.id, Decision::Approve)
            .await
            .unwrap();
        let swap = response.swap.unwrap();
        assert_eq!(swap.requester_side, SideOutcome::AlreadySwapped);
        assert_eq!(swap.target_side, SideOutcome::Swapped);
        assert_eq!(response.request.status, ExchangeStatus::ApprovedBoth);
        assert!(response.request.target_side_applied);
        assert_eq!(
            f.engine.read_slot(date("2025-08-04"), A).await.unwrap(),
            Some(ShiftAssignment::new(A, st("N")))
        );
    }

    #[tokio::test]
    async fn test_swap_that_wrote_nothing_releases_claim() {
        let inner = InMemoryRosterRepository::new();
        inner.insert(july()).await;
        let roster = Arc::new(BrokenMonth {
            inner,
            month_key: MonthKey::new("julio-2025"),
            broken: AtomicBool::new(true),
        });
        let f = fixture_with(roster.clone()).await;
        let created = f.service.submit(&Viewer::agent(A), proposal()).await.unwrap();

        let err = f
            .service
            .respond(&Viewer::agent(B), created.id, Decision::Approve)
            .await
            .unwrap_err();
        assert!(matches!(err, RosterError::SwapIncomplete(_)));
        let stored = f.exchanges.find_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ExchangeStatus::Proposed);
        assert!(!stored.any_side_applied());
        assert_eq!(stored.resolved_by, None);

        let rejected = f
            .service
            .respond(&Viewer::agent(B), created.id, Decision::Reject)
            .await
            .unwrap();
        assert_eq!(rejected.request.status, ExchangeStatus::Rejected);
    }

    #[tokio::test]
    async fn test_receiver_holding_type_from_another_edit_is_stale() {
        let f = fixture().await;
        let created = f.service.submit(&Viewer::agent(A), proposal()).await.unwrap();
        // A manager sends A on leave and gives B the morning instead.
        f.engine
            .overwrite_slot(date("2025-07-10"), A, &ShiftChange::Assign(st("V")))
            .await
            .unwrap();
        f.engine
            .overwrite_slot(date("2025-07-10"), B, &ShiftChange::Assign(st("M")))
            .await
            .unwrap();
        let before = f.roster.get(&MonthKey::new("julio-2025")).await.unwrap().unwrap();

        let err = f
            .service
            .respond(&Viewer::agent(B), created.id, Decision::Approve)
            .await
            .unwrap_err();
        assert!(matches!(err, RosterError::StaleProposal(_)));

        let after = f.roster.get(&MonthKey::new("julio-2025")).await.unwrap().unwrap();
        assert_eq!(after.version, before.version);
        assert_eq!(after.record, before.record);
        let stored = f.exchanges.find_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ExchangeStatus::Proposed);
        assert!(!stored.any_side_applied());
    }

    #[derive(Clone, Copy)]
    enum Interrupt {
        FirstRead,
        FirstWrite,
    }

    /// Has the target reject request `request_id` while the approval is
    /// reading or writing the roster.
    struct RejectsMidApproval {
        inner: InMemoryRosterRepository,
        interrupt: Interrupt,
        service: OnceLock<ExchangeService>,
        request_id: AtomicI32,
        fired: AtomicBool,
        rejection: Mutex<Option<Result<ExchangeDecisionResponse, RosterError>>>,
    }

    impl RejectsMidApproval {
        async fn reject_once(&self) {
            if self.fired.swap(true, Ordering::SeqCst) {
                return;
            }
            let Some(service) = self.service.get() else { return };
            let id = self.request_id.load(Ordering::SeqCst);
            let result = service.respond(&Viewer::agent(B), id, Decision::Reject).await;
            *self.rejection.lock().unwrap() = Some(result);
        }
    }

    #[async_trait]
    impl RosterRepository for RejectsMidApproval {
        async fn get(&self, month_key: &MonthKey) -> Result<Option<RosterSnapshot>, RepositoryError> {
            if matches!(self.interrupt, Interrupt::FirstRead) {
                self.reject_once().await;
            }
            self.inner.get(month_key).await
        }

        async fn merge_write(
            &self,
            month_key: &MonthKey,
            expected_version: i64,
            writes: &[FieldWrite],
        ) -> Result<i64, RepositoryError> {
            if matches!(self.interrupt, Interrupt::FirstWrite) {
                self.reject_once().await;
            }
            self.inner.merge_write(month_key, expected_version, writes).await
        }
    }

    async fn racing_fixture(interrupt: Interrupt) -> (Fixture, Arc<RejectsMidApproval>, i32) {
        let inner = InMemoryRosterRepository::new();
        inner.insert(july()).await;
        let roster = Arc::new(RejectsMidApproval {
            inner,
            interrupt,
            service: OnceLock::new(),
            request_id: AtomicI32::new(0),
            fired: AtomicBool::new(false),
            rejection: Mutex::new(None),
        });
        let f = fixture_with(roster.clone()).await;
        let created = f.service.submit(&Viewer::agent(A), proposal()).await.unwrap();
        roster.request_id.store(created.id, Ordering::SeqCst);
        // Submitting read the roster; arm the interrupt for the approval only.
        roster.fired.store(false, Ordering::SeqCst);
        let _ = roster.service.set(f.service.clone());
        (f, roster, created.id)
    }

    #[tokio::test]
    async fn test_rejection_during_swap_write_loses_to_claimed_approval() {
        let (f, roster, id) = racing_fixture(Interrupt::FirstWrite).await;

        let response = f
            .service
            .respond(&Viewer::manager(99), id, Decision::Approve)
            .await
            .unwrap();
        assert_eq!(response.request.status, ExchangeStatus::ApprovedBoth);
        assert_eq!(response.request.resolved_by, Some(99));

        let rejection = roster.rejection.lock().unwrap().take().unwrap();
        match rejection {
            Err(RosterError::InvalidTransition { status, action }) => {
                assert_eq!(status, "APPROVING");
                assert_eq!(action, "reject");
            }
            other => panic!("expected the rejection to lose, got {:?}", other),
        }

        assert_eq!(
            f.engine.read_slot(date("2025-07-10"), B).await.unwrap(),
            Some(ShiftAssignment::new(B, st("M")))
        );
        assert_eq!(
            f.engine.read_slot(date("2025-07-12"), A).await.unwrap(),
            Some(ShiftAssignment::new(A, st("T")))
        );
    }

    #[tokio::test]
    async fn test_rejection_before_claim_stops_approval_without_writes() {
        let (f, roster, id) = racing_fixture(Interrupt::FirstRead).await;

        let err = f
            .service
            .respond(&Viewer::manager(99), id, Decision::Approve)
            .await
            .unwrap_err();
        match err {
            RosterError::InvalidTransition { status, action } => {
                assert_eq!(status, "REJECTED");
                assert_eq!(action, "approve");
            }
            other => panic!("expected InvalidTransition, got {:?}", other),
        }
        let rejection = roster.rejection.lock().unwrap().take().unwrap().unwrap();
        assert_eq!(rejection.request.status, ExchangeStatus::Rejected);

        let snapshot = f.roster.get(&MonthKey::new("julio-2025")).await.unwrap().unwrap();
        assert_eq!(snapshot.version, 0);
        assert_eq!(snapshot.record, july());
    }

    #[tokio::test]
    async fn test_pending_count_drops_by_one_when_target_answers() {
        let f = fixture().await;
        let counter = PendingActionCounter::new(
            Arc::new(f.exchanges.clone()),
            Arc::new(InMemoryPermissionRepository::new()),
        );
        let target = Viewer::agent(B);
        let manager = Viewer::manager(99);

        let approved = f.service.submit(&Viewer::agent(A), proposal()).await.unwrap();
        let rejected = f.service.submit(&Viewer::agent(A), proposal()).await.unwrap();
        assert_eq!(counter.count(&target).await.unwrap(), 2);
        assert_eq!(counter.count(&manager).await.unwrap(), 0);

        f.service.respond(&target, rejected.id, Decision::Reject).await.unwrap();
        assert_eq!(counter.count(&target).await.unwrap(), 1);

        f.service.respond(&target, approved.id, Decision::Approve).await.unwrap();
        assert_eq!(counter.count(&target).await.unwrap(), 0);
        // The approved exchange now waits on a manager instead.
        assert_eq!(counter.count(&manager).await.unwrap(), 1);

        f.service.acknowledge(&manager, approved.id).await.unwrap();
        assert_eq!(counter.count(&manager).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_acknowledge_only_after_approval() {
        let f = fixture().await;
        let created = f.service.submit(&Viewer::agent(A), proposal()).await.unwrap();
        let manager = Viewer::manager(99);

        assert!(matches!(
            f.service.acknowledge(&manager, created.id).await,
            Err(RosterError::InvalidTransition { action: "acknowledge", .. })
        ));

        f.service
            .respond(&Viewer::agent(B), created.id, Decision::Approve)
            .await
            .unwrap();
        assert_eq!(f.service.unacknowledged(&manager).await.unwrap().len(), 1);

        assert!(matches!(
            f.service.acknowledge(&Viewer::agent(B), created.id).await,
            Err(RosterError::Forbidden(_))
        ));
        let acked = f.service.acknowledge(&manager, created.id).await.unwrap();
        assert!(acked.admin_notified);
        let again = f.service.acknowledge(&manager, created.id).await.unwrap();
        assert!(again.admin_notified);
        assert!(f.service.unacknowledged(&manager).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_incoming_and_mine() {
        let f = fixture().await;
        f.service.submit(&Viewer::agent(A), proposal()).await.unwrap();
        assert_eq!(f.service.incoming(&Viewer::agent(B)).await.unwrap().len(), 1);
        assert!(f.service.incoming(&Viewer::agent(A)).await.unwrap().is_empty());
        assert_eq!(f.service.mine(&Viewer::agent(A)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_preview_reports_current_types() {
        let f = fixture().await;
        let preview = f
            .service
            .preview(A, date("2025-07-10"), B, date("2025-07-13"))
            .await
            .unwrap();
        assert_eq!(preview.requester_shift_type, Some(st("M")));
        assert_eq!(preview.target_shift_type, None);
    }
}
