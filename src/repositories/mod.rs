//! Persistence contracts for the roster core and their implementations.
//!
//! | Trait | Postgres | In-memory |
//! |-------|----------|-----------|
//! | `RosterRepository` | `PgRosterRepository` | `InMemoryRosterRepository` |
//! | `ExchangeRepository` | `PgExchangeRepository` | `InMemoryExchangeRepository` |
//! | `PermissionRepository` | `PgPermissionRepository` | `InMemoryPermissionRepository` |
//! | `PermissionTypeLookup` | `PgPermissionTypes` | `InMemoryPermissionTypes` |
//!
//! The backend is chosen at startup from `STORAGE_BACKEND`.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::models::{
    AgentId, ExchangeFilter, ExchangeRequest, ExchangeSide, ExchangeStatus, FieldWrite, MonthKey, NewExchangeRequest,
    NewPermissionRequest, PermissionFilter, PermissionRequest, PermissionStatus, PermissionType, RosterSnapshot,
};

pub use memory::{InMemoryExchangeRepository, InMemoryPermissionRepository, InMemoryPermissionTypes, InMemoryRosterRepository};
pub use postgres::{PgExchangeRepository, PgPermissionRepository, PgPermissionTypes, PgRosterRepository};

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("{0} not found")]
    NotFound(String),

    /// The stored version no longer matches the one the caller read.
    #[error("Version conflict on {0}")]
    Conflict(String),

    #[error("Invalid field path: {0}")]
    InvalidPath(String),

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("{0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Serialization(#[from] serde_json::Error),
}

/// One roster document per calendar month.
#[async_trait]
pub trait RosterRepository: Send + Sync {
    async fn get(&self, month_key: &MonthKey) -> Result<Option<RosterSnapshot>, RepositoryError>;

    /// Applies `writes` atomically if the stored version still equals
    /// `expected_version`, and returns the new version. Only the addressed
    /// fields change.
    async fn merge_write(
        &self,
        month_key: &MonthKey,
        expected_version: i64,
        writes: &[FieldWrite],
    ) -> Result<i64, RepositoryError>;
}

#[async_trait]
pub trait ExchangeRepository: Send + Sync {
    async fn insert(&self, request: NewExchangeRequest) -> Result<ExchangeRequest, RepositoryError>;

    async fn find_by_id(&self, id: i32) -> Result<Option<ExchangeRequest>, RepositoryError>;

    /// Moves the request from `from` to `to`. Returns `None` when the request
    /// is no longer in `from` (someone else got there first). `resolved_by`
    /// is only recorded when `to` is terminal.
    async fn transition(
        &self,
        id: i32,
        from: ExchangeStatus,
        to: ExchangeStatus,
        resolved_by: AgentId,
    ) -> Result<Option<ExchangeRequest>, RepositoryError>;

    /// Records that one half of the swap landed. `None` unless the request is `Approving`.
    async fn mark_side_applied(
        &self,
        id: i32,
        side: ExchangeSide,
    ) -> Result<Option<ExchangeRequest>, RepositoryError>;

    /// Hands an `Approving` request back to `Proposed`, only while neither side has landed.
    async fn release_claim(&self, id: i32) -> Result<Option<ExchangeRequest>, RepositoryError>;

    /// Sets `admin_notified` on an `ApprovedBoth` request. `None` if it is not in that status.
    async fn mark_admin_notified(&self, id: i32) -> Result<Option<ExchangeRequest>, RepositoryError>;

    async fn list(&self, filter: &ExchangeFilter) -> Result<Vec<ExchangeRequest>, RepositoryError>;

    async fn count(&self, filter: &ExchangeFilter) -> Result<u64, RepositoryError>;
}

#[async_trait]
pub trait PermissionRepository: Send + Sync {
    async fn insert(&self, request: NewPermissionRequest) -> Result<PermissionRequest, RepositoryError>;

    async fn find_by_id(&self, id: i32) -> Result<Option<PermissionRequest>, RepositoryError>;

    async fn transition(
        &self,
        id: i32,
        from: PermissionStatus,
        to: PermissionStatus,
        decided_by: AgentId,
    ) -> Result<Option<PermissionRequest>, RepositoryError>;

    async fn list(&self, filter: &PermissionFilter) -> Result<Vec<PermissionRequest>, RepositoryError>;

    async fn count(&self, filter: &PermissionFilter) -> Result<u64, RepositoryError>;
}

#[async_trait]
pub trait PermissionTypeLookup: Send + Sync {
    async fn find(&self, id: i32) -> Result<Option<PermissionType>, RepositoryError>;

    async fn list_all(&self) -> Result<Vec<PermissionType>, RepositoryError>;
}
