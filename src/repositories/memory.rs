use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{ExchangeRepository, PermissionRepository, PermissionTypeLookup, RepositoryError, RosterRepository};
use crate::models::{
    symbols, AgentId, ExchangeFilter, ExchangeRequest, ExchangeSide, ExchangeStatus, FieldWrite, MonthKey, NewExchangeRequest,
    NewPermissionRequest, PermissionFilter, PermissionRequest, PermissionStatus, PermissionType, RosterRecord,
    RosterSnapshot, ShiftChange, ShiftType,
};

#[derive(Clone, Default)]
pub struct InMemoryRosterRepository {
    records: Arc<RwLock<HashMap<MonthKey, (RosterRecord, i64)>>>,
}

impl InMemoryRosterRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `record` at version 0, replacing any record with the same key.
    pub async fn insert(&self, record: RosterRecord) {
        let mut records = self.records.write().await;
        records.insert(record.month_key.clone(), (record, 0));
    }

    pub async fn contains(&self, month_key: &MonthKey) -> bool {
        self.records.read().await.contains_key(month_key)
    }
}

#[async_trait]
impl RosterRepository for InMemoryRosterRepository {
    async fn get(&self, month_key: &MonthKey) -> Result<Option<RosterSnapshot>, RepositoryError> {
        let records = self.records.read().await;
        Ok(records
            .get(month_key)
            .map(|(record, version)| RosterSnapshot::new(record.clone(), *version)))
    }

    async fn merge_write(
        &self,
        month_key: &MonthKey,
        expected_version: i64,
        writes: &[FieldWrite],
    ) -> Result<i64, RepositoryError> {
        if writes.is_empty() {
            return Err(RepositoryError::InvalidPath("empty write batch".to_string()));
        }

        let mut records = self.records.write().await;
        let (record, version) = records
            .get_mut(month_key)
            .ok_or_else(|| RepositoryError::NotFound(format!("Roster {}", month_key)))?;

        if *version != expected_version {
            return Err(RepositoryError::Conflict(month_key.to_string()));
        }

        // Apply to a copy so a bad path leaves the stored record untouched.
        let mut updated = record.clone();
        for write in writes {
            updated.apply(write).map_err(RepositoryError::InvalidPath)?;
        }
        *record = updated;
        *version += 1;
        Ok(*version)
    }
}

struct Table<T> {
    next_id: i32,
    rows: BTreeMap<i32, T>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self { next_id: 1, rows: BTreeMap::new() }
    }
}

#[derive(Clone, Default)]
pub struct InMemoryExchangeRepository {
    table: Arc<RwLock<Table<ExchangeRequest>>>,
}

impl InMemoryExchangeRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExchangeRepository for InMemoryExchangeRepository {
    async fn insert(&self, request: NewExchangeRequest) -> Result<ExchangeRequest, RepositoryError> {
        let mut table = self.table.write().await;
        let id = table.next_id;
        table.next_id += 1;
        let now = Utc::now();
        let stored = ExchangeRequest {
            id,
            requester_agent_id: request.requester_agent_id,
            requester_shift_date: request.requester_shift_date,
            requester_shift_type: request.requester_shift_type,
            target_agent_id: request.target_agent_id,
            target_shift_date: request.target_shift_date,
            target_shift_type: request.target_shift_type,
            requester_comments: request.requester_comments,
            status: ExchangeStatus::Proposed,
            requester_side_applied: false,
            target_side_applied: false,
            admin_notified: false,
            resolved_by: None,
            resolved_at: None,
            created_at: now,
            updated_at: now,
        };
        table.rows.insert(id, stored.clone());
        Ok(stored)
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<ExchangeRequest>, RepositoryError> {
        let table = self.table.read().await;
        Ok(table.rows.get(&id).cloned())
    }

    async fn transition(
        &self,
        id: i32,
        from: ExchangeStatus,
        to: ExchangeStatus,
        resolved_by: AgentId,
    ) -> Result<Option<ExchangeRequest>, RepositoryError> {
        let mut table = self.table.write().await;
        match table.rows.get_mut(&id) {
            Some(request) if request.status == from => {
                let now = Utc::now();
                request.status = to;
                if to.is_terminal() {
                    request.resolved_by = Some(resolved_by);
                    request.resolved_at = Some(now);
                }
                request.updated_at = now;
                Ok(Some(request.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn mark_side_applied(
        &self,
        id: i32,
        side: ExchangeSide,
    ) -> Result<Option<ExchangeRequest>, RepositoryError> {
        let mut table = self.table.write().await;
        match table.rows.get_mut(&id) {
            Some(request) if request.status == ExchangeStatus::Approving => {
                match side {
                    ExchangeSide::Requester => request.requester_side_applied = true,
                    ExchangeSide::Target => request.target_side_applied = true,
                }
                request.updated_at = Utc::now();
                Ok(Some(request.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn release_claim(&self, id: i32) -> Result<Option<ExchangeRequest>, RepositoryError> {
        let mut table = self.table.write().await;
        match table.rows.get_mut(&id) {
            Some(request) if request.status == ExchangeStatus::Approving && !request.any_side_applied() => {
                request.status = ExchangeStatus::Proposed;
                request.updated_at = Utc::now();
                Ok(Some(request.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn mark_admin_notified(&self, id: i32) -> Result<Option<ExchangeRequest>, RepositoryError> {
        let mut table = self.table.write().await;
        match table.rows.get_mut(&id) {
            Some(request) if request.status == ExchangeStatus::ApprovedBoth => {
                if !request.admin_notified {
                    request.admin_notified = true;
                    request.updated_at = Utc::now();
                }
                Ok(Some(request.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn list(&self, filter: &ExchangeFilter) -> Result<Vec<ExchangeRequest>, RepositoryError> {
        let table = self.table.read().await;
        // Newest first, like the SQL implementation.
        Ok(table.rows.values().rev().filter(|r| filter.matches(r)).cloned().collect())
    }

    async fn count(&self, filter: &ExchangeFilter) -> Result<u64, RepositoryError> {
        let table = self.table.read().await;
        Ok(table.rows.values().filter(|r| filter.matches(r)).count() as u64)
    }
}

#[derive(Clone, Default)]
pub struct InMemoryPermissionRepository {
    table: Arc<RwLock<Table<PermissionRequest>>>,
}

impl InMemoryPermissionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PermissionRepository for InMemoryPermissionRepository {
    async fn insert(&self, request: NewPermissionRequest) -> Result<PermissionRequest, RepositoryError> {
        let mut table = self.table.write().await;
        let id = table.next_id;
        table.next_id += 1;
        let now = Utc::now();
        let stored = PermissionRequest {
            id,
            agent_id: request.agent_id,
            type_id: request.type_id,
            start_date: request.start_date,
            end_date: request.end_date,
            status: request.status,
            attachments: request.attachments,
            decided_by: None,
            decided_at: None,
            created_at: now,
            updated_at: now,
        };
        table.rows.insert(id, stored.clone());
        Ok(stored)
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<PermissionRequest>, RepositoryError> {
        let table = self.table.read().await;
        Ok(table.rows.get(&id).cloned())
    }

    async fn transition(
        &self,
        id: i32,
        from: PermissionStatus,
        to: PermissionStatus,
        decided_by: AgentId,
    ) -> Result<Option<PermissionRequest>, RepositoryError> {
        let mut table = self.table.write().await;
        match table.rows.get_mut(&id) {
            Some(request) if request.status == from => {
                let now = Utc::now();
                request.status = to;
                request.decided_by = Some(decided_by);
                request.decided_at = Some(now);
                request.updated_at = now;
                Ok(Some(request.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn list(&self, filter: &PermissionFilter) -> Result<Vec<PermissionRequest>, RepositoryError> {
        let table = self.table.read().await;
        Ok(table.rows.values().rev().filter(|r| filter.matches(r)).cloned().collect())
    }

    async fn count(&self, filter: &PermissionFilter) -> Result<u64, RepositoryError> {
        let table = self.table.read().await;
        Ok(table.rows.values().filter(|r| filter.matches(r)).count() as u64)
    }
}

#[derive(Clone, Default)]
pub struct InMemoryPermissionTypes {
    types: Arc<BTreeMap<i32, PermissionType>>,
}

impl InMemoryPermissionTypes {
    pub fn new(types: impl IntoIterator<Item = PermissionType>) -> Self {
        Self {
            types: Arc::new(types.into_iter().map(|t| (t.id, t)).collect()),
        }
    }

    /// The catalogue seeded by the initial migration.
    pub fn standard() -> Self {
        let symbol = |s: &str| ShiftType::new(s).map(ShiftChange::Assign).unwrap_or(ShiftChange::NoChange);
        Self::new([
            PermissionType {
                id: 1,
                name: "Vacaciones".to_string(),
                initial_roster_symbol: symbol(symbols::VACATION),
                requires_approval: true,
                category: "vacation".to_string(),
            },
            PermissionType {
                id: 2,
                name: "Asuntos propios".to_string(),
                initial_roster_symbol: symbol(symbols::PERMISSION),
                requires_approval: true,
                category: "personal".to_string(),
            },
            PermissionType {
                id: 3,
                name: "Baja médica".to_string(),
                initial_roster_symbol: symbol(symbols::SICK_LEAVE),
                requires_approval: false,
                category: "medical".to_string(),
            },
            PermissionType {
                id: 4,
                name: "Formación".to_string(),
                initial_roster_symbol: ShiftChange::NoChange,
                requires_approval: true,
                category: "training".to_string(),
            },
        ])
    }
}

#[async_trait]
impl PermissionTypeLookup for InMemoryPermissionTypes {
    async fn find(&self, id: i32) -> Result<Option<PermissionType>, RepositoryError> {
        Ok(self.types.get(&id).cloned())
    }

    async fn list_all(&self) -> Result<Vec<PermissionType>, RepositoryError> {
        Ok(self.types.values().cloned().collect())
    }
}
