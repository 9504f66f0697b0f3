use metrics::counter;
use std::sync::Arc;

use crate::models::{
    CreatePermissionInput, Decision, NewPermissionRequest, PermissionFilter, PermissionMutationResponse,
    PermissionRequest, PermissionStatus, PermissionType, Viewer,
};
use crate::repositories::{PermissionRepository, PermissionTypeLookup};
use crate::roster::{date_range, parse_iso_date, MutationEngine, RangeOverrideReport, RosterError};

/// Leave requests and their projection onto the roster.
#[derive(Clone)]
pub struct LeaveService {
    engine: MutationEngine,
    permissions: Arc<dyn PermissionRepository>,
    types: Arc<dyn PermissionTypeLookup>,
}

impl LeaveService {
    pub fn new(
        engine: MutationEngine,
        permissions: Arc<dyn PermissionRepository>,
        types: Arc<dyn PermissionTypeLookup>,
    ) -> Self {
        Self {
            engine,
            permissions,
            types,
        }
    }

    pub async fn submit(
        &self,
        viewer: &Viewer,
        input: CreatePermissionInput,
    ) -> Result<PermissionMutationResponse, RosterError> {
        let agent_id = input.agent_id.unwrap_or(viewer.agent_id);
        if agent_id != viewer.agent_id && !viewer.is_manager() {
            return Err(RosterError::Forbidden(
                "Only managers can request leave for another agent".to_string(),
            ));
        }

        let start_date = parse_iso_date(&input.start_date)?;
        let end_date = parse_iso_date(&input.end_date)?;
        date_range(start_date, end_date)?;

        let permission_type = self
            .types
            .find(input.type_id)
            .await?
            .ok_or_else(|| RosterError::Validation(format!("Unknown permission type {}", input.type_id)))?;

        let status = if permission_type.requires_approval {
            PermissionStatus::Pending
        } else {
            PermissionStatus::Approved
        };

        let request = self
            .permissions
            .insert(NewPermissionRequest {
                agent_id,
                type_id: permission_type.id,
                start_date,
                end_date,
                status,
                attachments: input.attachments,
            })
            .await?;

        tracing::info!(
            request_id = request.id,
            agent_id,
            type_id = permission_type.id,
            status = %request.status,
            "Permission request submitted"
        );

        let projection = if status == PermissionStatus::Approved {
            counter!("permission_decisions_total", "decision" => "auto_approved").increment(1);
            Some(self.project(&request, &permission_type).await?)
        } else {
            None
        };

        Ok(PermissionMutationResponse { request, projection })
    }

    /// Manager decision. Approving an already approved request re-runs the
    /// projection, which fills in dates that failed earlier.
    pub async fn decide(
        &self,
        viewer: &Viewer,
        id: i32,
        decision: Decision,
    ) -> Result<PermissionMutationResponse, RosterError> {
        if !viewer.is_manager() {
            return Err(RosterError::Forbidden("Only managers can decide permission requests".to_string()));
        }

        let request = self.find(id).await?;

        if request.status == PermissionStatus::Approved && decision == Decision::Approve {
            let permission_type = self.type_of(&request).await?;
            let projection = self.project(&request, &permission_type).await?;
            tracing::info!(request_id = id, "Permission projection re-applied");
            return Ok(PermissionMutationResponse {
                request,
                projection: Some(projection),
            });
        }

        let Some(next) = request.status.after(decision) else {
            return Err(RosterError::InvalidTransition {
                status: request.status.to_string(),
                action: decision.verb(),
            });
        };

        let Some(updated) = self
            .permissions
            .transition(id, PermissionStatus::Pending, next, viewer.agent_id)
            .await?
        else {
            let current = self.find(id).await?;
            return Err(RosterError::InvalidTransition {
                status: current.status.to_string(),
                action: decision.verb(),
            });
        };

        counter!("permission_decisions_total", "decision" => decision.verb()).increment(1);
        tracing::info!(request_id = id, status = %next, decided_by = viewer.agent_id, "Permission request decided");

        let projection = match next {
            PermissionStatus::Approved => {
                let permission_type = self.type_of(&updated).await?;
                Some(self.project(&updated, &permission_type).await?)
            }
            _ => None,
        };

        Ok(PermissionMutationResponse {
            request: updated,
            projection,
        })
    }

    pub async fn mine(&self, viewer: &Viewer) -> Result<Vec<PermissionRequest>, RosterError> {
        let filter = PermissionFilter {
            agent_id: Some(viewer.agent_id),
            ..Default::default()
        };
        Ok(self.permissions.list(&filter).await?)
    }

    pub async fn pending(&self, viewer: &Viewer) -> Result<Vec<PermissionRequest>, RosterError> {
        if !viewer.is_manager() {
            return Err(RosterError::Forbidden("Only managers can view pending permissions".to_string()));
        }
        Ok(self.permissions.list(&pending_filter()).await?)
    }

    pub async fn types(&self) -> Result<Vec<PermissionType>, RosterError> {
        Ok(self.types.list_all().await?)
    }

    async fn project(
        &self,
        request: &PermissionRequest,
        permission_type: &PermissionType,
    ) -> Result<RangeOverrideReport, RosterError> {
        let report = self
            .engine
            .apply_range_override(
                request.agent_id,
                request.start_date,
                request.end_date,
                &permission_type.initial_roster_symbol,
            )
            .await?;

        if !report.is_complete() {
            tracing::warn!(
                request_id = request.id,
                failed = report.dates_failed.len(),
                "Permission projected only partially"
            );
        }
        Ok(report)
    }

    async fn type_of(&self, request: &PermissionRequest) -> Result<PermissionType, RosterError> {
        self.types
            .find(request.type_id)
            .await?
            .ok_or_else(|| RosterError::NotFound(format!("Permission type {}", request.type_id)))
    }

    async fn find(&self, id: i32) -> Result<PermissionRequest, RosterError> {
        self.permissions
            .find_by_id(id)
            .await?
            .ok_or_else(|| RosterError::NotFound(format!("Permission request {}", id)))
    }
}

pub(crate) fn pending_filter() -> PermissionFilter {
    PermissionFilter {
        status: Some(PermissionStatus::Pending),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MonthKey, RosterRecord, ShiftAssignment, ShiftType};
    use crate::repositories::{
        InMemoryPermissionRepository, InMemoryPermissionTypes, InMemoryRosterRepository, RosterRepository,
    };
    use crate::repositories::InMemoryExchangeRepository;
    use crate::roster::{FailureReason, NamedMonthKeys};
    use crate::services::PendingActionCounter;
    use chrono::NaiveDate;

    const VACATION: i32 = 1;
    const SICK_LEAVE: i32 = 3;
    const TRAINING: i32 = 4;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    struct Fixture {
        service: LeaveService,
        engine: MutationEngine,
        roster: Arc<InMemoryRosterRepository>,
        permissions: InMemoryPermissionRepository,
    }

    async fn fixture() -> Fixture {
        let roster = Arc::new(InMemoryRosterRepository::new());
        roster
            .insert(RosterRecord::blank(MonthKey::new("julio-2025"), 2025, 7).unwrap())
            .await;
        let engine = MutationEngine::new(roster.clone(), Arc::new(NamedMonthKeys::default()), 3);
        let permissions = InMemoryPermissionRepository::new();
        let service = LeaveService::new(
            engine.clone(),
            Arc::new(permissions.clone()),
            Arc::new(InMemoryPermissionTypes::standard()),
        );
        Fixture {
            service,
            engine,
            roster,
            permissions,
        }
    }

    fn leave(type_id: i32, start: &str, end: &str) -> CreatePermissionInput {
        CreatePermissionInput {
            agent_id: None,
            type_id,
            start_date: start.to_string(),
            end_date: end.to_string(),
            attachments: vec![],
        }
    }

    #[tokio::test]
    async fn test_submit_pending_does_not_touch_roster() {
        let f = fixture().await;
        let response = f
            .service
            .submit(&Viewer::agent(42), leave(VACATION, "2025-07-14", "2025-07-18"))
            .await
            .unwrap();
        assert_eq!(response.request.status, PermissionStatus::Pending);
        assert!(response.projection.is_none());
        assert_eq!(f.engine.read_slot(date("2025-07-14"), 42).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_approval_stamps_every_date() {
        let f = fixture().await;
        let created = f
            .service
            .submit(&Viewer::agent(42), leave(VACATION, "2025-07-14", "2025-07-18"))
            .await
            .unwrap();

        let response = f
            .service
            .decide(&Viewer::manager(1), created.request.id, Decision::Approve)
            .await
            .unwrap();
        assert_eq!(response.request.status, PermissionStatus::Approved);
        assert_eq!(response.request.decided_by, Some(1));
        let projection = response.projection.unwrap();
        assert_eq!(projection.dates_applied.len(), 5);
        assert!(projection.is_complete());

        let vacation = ShiftType::new("V").unwrap();
        for day in date("2025-07-14").iter_days().take(5) {
            assert_eq!(
                f.engine.read_slot(day, 42).await.unwrap(),
                Some(ShiftAssignment::new(42, vacation.clone()))
            );
        }
    }

    #[tokio::test]
    async fn test_reject_performs_no_mutation() {
        let f = fixture().await;
        let created = f
            .service
            .submit(&Viewer::agent(42), leave(VACATION, "2025-07-14", "2025-07-15"))
            .await
            .unwrap();
        let response = f
            .service
            .decide(&Viewer::manager(1), created.request.id, Decision::Reject)
            .await
            .unwrap();
        assert_eq!(response.request.status, PermissionStatus::Rejected);
        assert!(response.projection.is_none());
        let snapshot = f.roster.get(&MonthKey::new("julio-2025")).await.unwrap().unwrap();
        assert_eq!(snapshot.version, 0);

        let err = f
            .service
            .decide(&Viewer::manager(1), created.request.id, Decision::Approve)
            .await
            .unwrap_err();
        assert!(matches!(err, RosterError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_type_without_approval_is_projected_on_submit() {
        let f = fixture().await;
        let response = f
            .service
            .submit(&Viewer::agent(42), leave(SICK_LEAVE, "2025-07-21", "2025-07-22"))
            .await
            .unwrap();
        assert_eq!(response.request.status, PermissionStatus::Approved);
        assert_eq!(response.projection.unwrap().dates_applied.len(), 2);
        let slot = f.engine.read_slot(date("2025-07-21"), 42).await.unwrap().unwrap();
        assert_eq!(slot.shift_type.as_str(), "B");
    }

    #[tokio::test]
    async fn test_no_change_type_is_skipped() {
        let f = fixture().await;
        let created = f
            .service
            .submit(&Viewer::agent(42), leave(TRAINING, "2025-07-21", "2025-07-22"))
            .await
            .unwrap();
        let response = f
            .service
            .decide(&Viewer::manager(1), created.request.id, Decision::Approve)
            .await
            .unwrap();
        assert!(response.projection.unwrap().skipped);
        let snapshot = f.roster.get(&MonthKey::new("julio-2025")).await.unwrap().unwrap();
        assert_eq!(snapshot.version, 0);
    }

    #[tokio::test]
    async fn test_reapproval_fills_in_missing_month() {
        let f = fixture().await;
        let created = f
            .service
            .submit(&Viewer::agent(42), leave(VACATION, "2025-07-31", "2025-08-01"))
            .await
            .unwrap();
        let first = f
            .service
            .decide(&Viewer::manager(1), created.request.id, Decision::Approve)
            .await
            .unwrap()
            .projection
            .unwrap();
        assert_eq!(first.dates_applied, vec![date("2025-07-31")]);
        assert_eq!(first.dates_failed[0].reason, FailureReason::RosterMissing);

        f.roster
            .insert(RosterRecord::blank(MonthKey::new("agosto-2025"), 2025, 8).unwrap())
            .await;
        let second = f
            .service
            .decide(&Viewer::manager(1), created.request.id, Decision::Approve)
            .await
            .unwrap();
        assert_eq!(second.request.status, PermissionStatus::Approved);
        let projection = second.projection.unwrap();
        assert!(projection.is_complete());
        assert_eq!(projection.dates_applied.len(), 2);
    }

    #[tokio::test]
    async fn test_submit_validation() {
        let f = fixture().await;
        let viewer = Viewer::agent(42);
        assert!(matches!(
            f.service.submit(&viewer, leave(VACATION, "2025-07-18", "2025-07-14")).await,
            Err(RosterError::InvalidDateRange(_))
        ));
        assert!(matches!(
            f.service.submit(&viewer, leave(VACATION, "14/07/2025", "2025-07-18")).await,
            Err(RosterError::InvalidDateRange(_))
        ));
        assert!(matches!(
            f.service.submit(&viewer, leave(99, "2025-07-14", "2025-07-18")).await,
            Err(RosterError::Validation(_))
        ));
        let mut for_other = leave(VACATION, "2025-07-14", "2025-07-18");
        for_other.agent_id = Some(7);
        assert!(matches!(
            f.service.submit(&viewer, for_other).await,
            Err(RosterError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_only_managers_decide_and_list_pending() {
        let f = fixture().await;
        let created = f
            .service
            .submit(&Viewer::agent(42), leave(VACATION, "2025-07-14", "2025-07-14"))
            .await
            .unwrap();
        assert!(matches!(
            f.service.decide(&Viewer::agent(42), created.request.id, Decision::Approve).await,
            Err(RosterError::Forbidden(_))
        ));
        assert!(matches!(
            f.service.pending(&Viewer::agent(42)).await,
            Err(RosterError::Forbidden(_))
        ));
        assert_eq!(f.service.pending(&Viewer::manager(1)).await.unwrap().len(), 1);
        assert_eq!(f.service.mine(&Viewer::agent(42)).await.unwrap().len(), 1);
        assert!(f.service.mine(&Viewer::agent(43)).await.unwrap().is_empty());
        assert_eq!(f.service.types().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_pending_count_drops_by_one_per_decision() {
        let f = fixture().await;
        let counter = PendingActionCounter::new(
            Arc::new(InMemoryExchangeRepository::new()),
            Arc::new(f.permissions.clone()),
        );
        let manager = Viewer::manager(1);

        let first = f
            .service
            .submit(&Viewer::agent(42), leave(VACATION, "2025-07-14", "2025-07-15"))
            .await
            .unwrap();
        let second = f
            .service
            .submit(&Viewer::agent(43), leave(TRAINING, "2025-07-21", "2025-07-21"))
            .await
            .unwrap();
        assert_eq!(counter.count(&manager).await.unwrap(), 2);

        f.service.decide(&manager, first.request.id, Decision::Approve).await.unwrap();
        assert_eq!(counter.count(&manager).await.unwrap(), 1);

        f.service.decide(&manager, second.request.id, Decision::Reject).await.unwrap();
        assert_eq!(counter.count(&manager).await.unwrap(), 0);

        // A decided request cannot be decided again, so the count stays put.
        assert!(f.service.decide(&manager, first.request.id, Decision::Reject).await.is_err());
        assert_eq!(counter.count(&manager).await.unwrap(), 0);
    }
}
