use std::sync::Arc;

use super::exchange_service::unacknowledged_filter;
use super::leave_service::pending_filter;
use crate::models::{ExchangeFilter, ExchangeStatus, Viewer};
use crate::repositories::{ExchangeRepository, PermissionRepository};
use crate::roster::RosterError;

/// Counts the items waiting on a viewer. Computed on every call.
#[derive(Clone)]
pub struct PendingActionCounter {
    exchanges: Arc<dyn ExchangeRepository>,
    permissions: Arc<dyn PermissionRepository>,
}

impl PendingActionCounter {
    pub fn new(exchanges: Arc<dyn ExchangeRepository>, permissions: Arc<dyn PermissionRepository>) -> Self {
        Self { exchanges, permissions }
    }

    /// Managers: pending permission requests plus approved exchanges nobody acknowledged.
    /// Agents: proposals addressed to them.
    pub async fn count(&self, viewer: &Viewer) -> Result<u64, RosterError> {
        if viewer.is_manager() {
            let permissions = self.permissions.count(&pending_filter()).await?;
            let exchanges = self.exchanges.count(&unacknowledged_filter()).await?;
            Ok(permissions + exchanges)
        } else {
            let filter = ExchangeFilter {
                target_agent_id: Some(viewer.agent_id),
                status: Some(ExchangeStatus::Proposed),
                ..Default::default()
            };
            Ok(self.exchanges.count(&filter).await?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Decision, NewExchangeRequest, NewPermissionRequest, PermissionStatus, ShiftType};
    use crate::repositories::{InMemoryExchangeRepository, InMemoryPermissionRepository};
    use chrono::NaiveDate;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, day).unwrap()
    }

    fn proposal(requester: i32, target: i32) -> NewExchangeRequest {
        NewExchangeRequest {
            requester_agent_id: requester,
            requester_shift_date: date(10),
            requester_shift_type: ShiftType::new("M").unwrap(),
            target_agent_id: target,
            target_shift_date: date(12),
            target_shift_type: ShiftType::new("T").unwrap(),
            requester_comments: None,
        }
    }

    fn leave(agent_id: i32) -> NewPermissionRequest {
        NewPermissionRequest {
            agent_id,
            type_id: 1,
            start_date: date(14),
            end_date: date(18),
            status: PermissionStatus::Pending,
            attachments: vec![],
        }
    }

    #[tokio::test]
    async fn test_empty_counts_are_zero() {
        let counter = PendingActionCounter::new(
            Arc::new(InMemoryExchangeRepository::new()),
            Arc::new(InMemoryPermissionRepository::new()),
        );
        assert_eq!(counter.count(&Viewer::agent(1)).await.unwrap(), 0);
        assert_eq!(counter.count(&Viewer::manager(9)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_agent_count_drops_by_one_after_answer() {
        let exchanges = Arc::new(InMemoryExchangeRepository::new());
        let counter = PendingActionCounter::new(exchanges.clone(), Arc::new(InMemoryPermissionRepository::new()));

        let first = exchanges.insert(proposal(1, 2)).await.unwrap();
        exchanges.insert(proposal(3, 2)).await.unwrap();
        exchanges.insert(proposal(2, 1)).await.unwrap();
        assert_eq!(counter.count(&Viewer::agent(2)).await.unwrap(), 2);
        assert_eq!(counter.count(&Viewer::agent(1)).await.unwrap(), 1);

        let to = ExchangeStatus::Proposed.after(Decision::Reject).unwrap();
        exchanges
            .transition(first.id, ExchangeStatus::Proposed, to, 2)
            .await
            .unwrap();
        assert_eq!(counter.count(&Viewer::agent(2)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_manager_count_covers_permissions_and_acknowledgements() {
        let exchanges = Arc::new(InMemoryExchangeRepository::new());
        let permissions = Arc::new(InMemoryPermissionRepository::new());
        let counter = PendingActionCounter::new(exchanges.clone(), permissions.clone());
        let manager = Viewer::manager(9);

        let leave_request = permissions.insert(leave(5)).await.unwrap();
        permissions.insert(leave(6)).await.unwrap();
        let exchange = exchanges.insert(proposal(1, 2)).await.unwrap();
        // A proposal still awaiting the target is not the manager's business.
        assert_eq!(counter.count(&manager).await.unwrap(), 2);

        exchanges
            .transition(exchange.id, ExchangeStatus::Proposed, ExchangeStatus::ApprovedBoth, 2)
            .await
            .unwrap();
        assert_eq!(counter.count(&manager).await.unwrap(), 3);

        exchanges.mark_admin_notified(exchange.id).await.unwrap();
        assert_eq!(counter.count(&manager).await.unwrap(), 2);

        permissions
            .transition(leave_request.id, PermissionStatus::Pending, PermissionStatus::Approved, 9)
            .await
            .unwrap();
        assert_eq!(counter.count(&manager).await.unwrap(), 1);
    }
}
