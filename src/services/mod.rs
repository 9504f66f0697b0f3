pub mod exchange_service;
pub mod leave_service;
pub mod pending_service;

use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

pub use exchange_service::ExchangeService;
pub use leave_service::LeaveService;
pub use pending_service::PendingActionCounter;

use crate::repositories::{
    ExchangeRepository, InMemoryExchangeRepository, InMemoryPermissionRepository, InMemoryPermissionTypes,
    InMemoryRosterRepository, PermissionRepository, PermissionTypeLookup, PgExchangeRepository,
    PgPermissionRepository, PgPermissionTypes, PgRosterRepository, RosterRepository,
};
use crate::roster::{MonthKeyResolver, MutationEngine};

/// Everything the handlers call, wired to one storage backend.
#[derive(Clone)]
pub struct Services {
    pub engine: MutationEngine,
    pub exchanges: ExchangeService,
    pub leave: LeaveService,
    pub pending: PendingActionCounter,
}

impl Services {
    pub fn new(
        roster: Arc<dyn RosterRepository>,
        exchanges: Arc<dyn ExchangeRepository>,
        permissions: Arc<dyn PermissionRepository>,
        types: Arc<dyn PermissionTypeLookup>,
        months: Arc<dyn MonthKeyResolver>,
        write_attempts: u32,
    ) -> Self {
        let engine = MutationEngine::new(roster, months, write_attempts);
        Self {
            exchanges: ExchangeService::new(engine.clone(), exchanges.clone()),
            leave: LeaveService::new(engine.clone(), permissions.clone(), types),
            pending: PendingActionCounter::new(exchanges, permissions),
            engine,
        }
    }

    pub fn postgres(
        pool: PgPool,
        months: Arc<dyn MonthKeyResolver>,
        write_attempts: u32,
        type_cache_ttl: Duration,
    ) -> Self {
        Self::new(
            Arc::new(PgRosterRepository::new(pool.clone())),
            Arc::new(PgExchangeRepository::new(pool.clone())),
            Arc::new(PgPermissionRepository::new(pool.clone())),
            Arc::new(PgPermissionTypes::new(pool, type_cache_ttl)),
            months,
            write_attempts,
        )
    }

    /// In-process storage holding the given roster repository and the standard permission types.
    pub fn in_memory(roster: InMemoryRosterRepository, months: Arc<dyn MonthKeyResolver>, write_attempts: u32) -> Self {
        Self::new(
            Arc::new(roster),
            Arc::new(InMemoryExchangeRepository::new()),
            Arc::new(InMemoryPermissionRepository::new()),
            Arc::new(InMemoryPermissionTypes::standard()),
            months,
            write_attempts,
        )
    }
}
