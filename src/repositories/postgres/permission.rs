use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use moka::future::Cache;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use std::time::Duration;

use crate::models::{
    AgentId, NewPermissionRequest, PermissionFilter, PermissionRequest, PermissionStatus, PermissionType, ShiftChange,
    ShiftType,
};
use crate::repositories::{PermissionRepository, PermissionTypeLookup, RepositoryError};

#[derive(Clone)]
pub struct PgPermissionRepository {
    pool: PgPool,
}

impl PgPermissionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const PERMISSION_COLUMNS: &str = r#"
    id,
    agent_id,
    type_id,
    start_date,
    end_date,
    status,
    attachments,
    decided_by,
    decided_at,
    created_at,
    updated_at
"#;

#[derive(Debug, FromRow)]
struct PermissionRow {
    id: i32,
    agent_id: i32,
    type_id: i32,
    start_date: NaiveDate,
    end_date: NaiveDate,
    status: String,
    attachments: Vec<String>,
    decided_by: Option<i32>,
    decided_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn row_to_permission_request(row: PermissionRow) -> Result<PermissionRequest, RepositoryError> {
    let status = row
        .status
        .parse()
        .map_err(|e: String| RepositoryError::Corrupt(format!("PermissionRequests {}: {}", row.id, e)))?;
    Ok(PermissionRequest {
        id: row.id,
        agent_id: row.agent_id,
        type_id: row.type_id,
        start_date: row.start_date,
        end_date: row.end_date,
        status,
        attachments: row.attachments,
        decided_by: row.decided_by,
        decided_at: row.decided_at,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &PermissionFilter) {
    qb.push(" WHERE 1=1");
    if let Some(agent_id) = filter.agent_id {
        qb.push(" AND agent_id = ").push_bind(agent_id);
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
}

#[async_trait]
impl PermissionRepository for PgPermissionRepository {
    async fn insert(&self, request: NewPermissionRequest) -> Result<PermissionRequest, RepositoryError> {
        let sql = format!(
            r#"
            INSERT INTO "PermissionRequests" (agent_id, type_id, start_date, end_date, status, attachments)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            PERMISSION_COLUMNS
        );

        let row = sqlx::query_as::<_, PermissionRow>(&sql)
            .bind(request.agent_id)
            .bind(request.type_id)
            .bind(request.start_date)
            .bind(request.end_date)
            .bind(request.status.as_str())
            .bind(&request.attachments)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, agent_id = request.agent_id, "Failed to insert permission request");
                e
            })?;

        row_to_permission_request(row)
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<PermissionRequest>, RepositoryError> {
        let sql = format!(r#"SELECT {} FROM "PermissionRequests" WHERE id = $1"#, PERMISSION_COLUMNS);
        let row = sqlx::query_as::<_, PermissionRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_permission_request).transpose()
    }

    async fn transition(
        &self,
        id: i32,
        from: PermissionStatus,
        to: PermissionStatus,
        decided_by: AgentId,
    ) -> Result<Option<PermissionRequest>, RepositoryError> {
        let sql = format!(
            r#"
            UPDATE "PermissionRequests"
            SET status = $1, decided_by = $2, decided_at = NOW(), updated_at = NOW()
            WHERE id = $3 AND status = $4
            RETURNING {}
            "#,
            PERMISSION_COLUMNS
        );

        let row = sqlx::query_as::<_, PermissionRow>(&sql)
            .bind(to.as_str())
            .bind(decided_by)
            .bind(id)
            .bind(from.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, request_id = id, from = %from, to = %to, "Permission transition failed");
                e
            })?;
        row.map(row_to_permission_request).transpose()
    }

    async fn list(&self, filter: &PermissionFilter) -> Result<Vec<PermissionRequest>, RepositoryError> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(r#"SELECT {} FROM "PermissionRequests""#, PERMISSION_COLUMNS));
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC, id DESC");

        let rows = qb.build_query_as::<PermissionRow>().fetch_all(&self.pool).await?;
        tracing::debug!(count = rows.len(), "Fetched permission requests");
        rows.into_iter().map(row_to_permission_request).collect()
    }

    async fn count(&self, filter: &PermissionFilter) -> Result<u64, RepositoryError> {
        let mut qb = QueryBuilder::<Postgres>::new(r#"SELECT COUNT(*) FROM "PermissionRequests""#);
        push_filter(&mut qb, filter);
        let count: i64 = qb.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

/// Permission types read from `"PermissionTypes"`, cached per id.
#[derive(Clone)]
pub struct PgPermissionTypes {
    pool: PgPool,
    cache: Cache<i32, PermissionType>,
}

impl PgPermissionTypes {
    pub fn new(pool: PgPool, ttl: Duration) -> Self {
        let cache = Cache::builder().time_to_live(ttl).max_capacity(256).build();
        Self { pool, cache }
    }
}

#[derive(Debug, FromRow)]
struct PermissionTypeRow {
    id: i32,
    name: String,
    initial_roster_symbol: Option<String>,
    requires_approval: bool,
    category: String,
}

fn row_to_permission_type(row: PermissionTypeRow) -> Result<PermissionType, RepositoryError> {
    // NULL symbol means the type never touches the roster.
    let initial_roster_symbol = match row.initial_roster_symbol {
        Some(symbol) => ShiftChange::Assign(
            ShiftType::new(symbol).map_err(|e| RepositoryError::Corrupt(format!("PermissionTypes {}: {}", row.id, e)))?,
        ),
        None => ShiftChange::NoChange,
    };
    Ok(PermissionType {
        id: row.id,
        name: row.name,
        initial_roster_symbol,
        requires_approval: row.requires_approval,
        category: row.category,
    })
}

#[async_trait]
impl PermissionTypeLookup for PgPermissionTypes {
    async fn find(&self, id: i32) -> Result<Option<PermissionType>, RepositoryError> {
        if let Some(cached) = self.cache.get(&id).await {
            return Ok(Some(cached));
        }

        let row = sqlx::query_as::<_, PermissionTypeRow>(
            r#"
            SELECT id, name, initial_roster_symbol, requires_approval, category
            FROM "PermissionTypes"
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let permission_type = row_to_permission_type(row)?;
                self.cache.insert(id, permission_type.clone()).await;
                Ok(Some(permission_type))
            }
            None => Ok(None),
        }
    }

    async fn list_all(&self) -> Result<Vec<PermissionType>, RepositoryError> {
        let rows = sqlx::query_as::<_, PermissionTypeRow>(
            r#"
            SELECT id, name, initial_roster_symbol, requires_approval, category
            FROM "PermissionTypes"
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_permission_type).collect()
    }
}
