use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};

use crate::models::{AgentId, ExchangeFilter, ExchangeRequest, ExchangeSide, ExchangeStatus, NewExchangeRequest, ShiftType};
use crate::repositories::{ExchangeRepository, RepositoryError};

#[derive(Clone)]
pub struct PgExchangeRepository {
    pool: PgPool,
}

impl PgExchangeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const EXCHANGE_COLUMNS: &str = r#"
    id,
    requester_agent_id,
    requester_shift_date,
    requester_shift_type,
    target_agent_id,
    target_shift_date,
    target_shift_type,
    requester_comments,
    status,
    requester_side_applied,
    target_side_applied,
    admin_notified,
    resolved_by,
    resolved_at,
    created_at,
    updated_at
"#;

#[derive(Debug, FromRow)]
struct ExchangeRow {
    id: i32,
    requester_agent_id: i32,
    requester_shift_date: NaiveDate,
    requester_shift_type: String,
    target_agent_id: i32,
    target_shift_date: NaiveDate,
    target_shift_type: String,
    requester_comments: Option<String>,
    status: String,
    requester_side_applied: bool,
    target_side_applied: bool,
    admin_notified: bool,
    resolved_by: Option<i32>,
    resolved_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn row_to_exchange_request(row: ExchangeRow) -> Result<ExchangeRequest, RepositoryError> {
    let id = row.id;
    let corrupt = move |e: String| RepositoryError::Corrupt(format!("ShiftExchanges {}: {}", id, e));
    Ok(ExchangeRequest {
        id: row.id,
        requester_agent_id: row.requester_agent_id,
        requester_shift_date: row.requester_shift_date,
        requester_shift_type: ShiftType::new(row.requester_shift_type).map_err(|e| corrupt(e.to_string()))?,
        target_agent_id: row.target_agent_id,
        target_shift_date: row.target_shift_date,
        target_shift_type: ShiftType::new(row.target_shift_type).map_err(|e| corrupt(e.to_string()))?,
        requester_comments: row.requester_comments,
        status: row.status.parse().map_err(corrupt)?,
        requester_side_applied: row.requester_side_applied,
        target_side_applied: row.target_side_applied,
        admin_notified: row.admin_notified,
        resolved_by: row.resolved_by,
        resolved_at: row.resolved_at,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &ExchangeFilter) {
    qb.push(" WHERE 1=1");
    if let Some(requester) = filter.requester_agent_id {
        qb.push(" AND requester_agent_id = ").push_bind(requester);
    }
    if let Some(target) = filter.target_agent_id {
        qb.push(" AND target_agent_id = ").push_bind(target);
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(notified) = filter.admin_notified {
        qb.push(" AND admin_notified = ").push_bind(notified);
    }
}

#[async_trait]
impl ExchangeRepository for PgExchangeRepository {
    async fn insert(&self, request: NewExchangeRequest) -> Result<ExchangeRequest, RepositoryError> {
        let sql = format!(
            r#"
            INSERT INTO "ShiftExchanges" (
                requester_agent_id, requester_shift_date, requester_shift_type,
                target_agent_id, target_shift_date, target_shift_type,
                requester_comments, status, admin_notified
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, false)
            RETURNING {}
            "#,
            EXCHANGE_COLUMNS
        );

        let row = sqlx::query_as::<_, ExchangeRow>(&sql)
            .bind(request.requester_agent_id)
            .bind(request.requester_shift_date)
            .bind(request.requester_shift_type.as_str())
            .bind(request.target_agent_id)
            .bind(request.target_shift_date)
            .bind(request.target_shift_type.as_str())
            .bind(&request.requester_comments)
            .bind(ExchangeStatus::Proposed.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, requester = request.requester_agent_id, "Failed to insert exchange request");
                e
            })?;

        row_to_exchange_request(row)
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<ExchangeRequest>, RepositoryError> {
        let sql = format!(r#"SELECT {} FROM "ShiftExchanges" WHERE id = $1"#, EXCHANGE_COLUMNS);
        let row = sqlx::query_as::<_, ExchangeRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_exchange_request).transpose()
    }

    async fn transition(
        &self,
        id: i32,
        from: ExchangeStatus,
        to: ExchangeStatus,
        resolved_by: AgentId,
    ) -> Result<Option<ExchangeRequest>, RepositoryError> {
        let sql = format!(
            r#"
            UPDATE "ShiftExchanges"
            SET status = $1,
                resolved_by = CASE WHEN $5 THEN $2 ELSE resolved_by END,
                resolved_at = CASE WHEN $5 THEN NOW() ELSE resolved_at END,
                updated_at = NOW()
            WHERE id = $3 AND status = $4
            RETURNING {}
            "#,
            EXCHANGE_COLUMNS
        );

        let row = sqlx::query_as::<_, ExchangeRow>(&sql)
            .bind(to.as_str())
            .bind(resolved_by)
            .bind(id)
            .bind(from.as_str())
            .bind(to.is_terminal())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, request_id = id, from = %from, to = %to, "Exchange transition failed");
                e
            })?;
        row.map(row_to_exchange_request).transpose()
    }

    async fn mark_side_applied(
        &self,
        id: i32,
        side: ExchangeSide,
    ) -> Result<Option<ExchangeRequest>, RepositoryError> {
        let column = match side {
            ExchangeSide::Requester => "requester_side_applied",
            ExchangeSide::Target => "target_side_applied",
        };
        let sql = format!(
            r#"
            UPDATE "ShiftExchanges"
            SET {} = true, updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING {}
            "#,
            column, EXCHANGE_COLUMNS
        );

        let row = sqlx::query_as::<_, ExchangeRow>(&sql)
            .bind(id)
            .bind(ExchangeStatus::Approving.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, request_id = id, side = side.as_str(), "Failed to record swap side");
                e
            })?;
        row.map(row_to_exchange_request).transpose()
    }

    async fn release_claim(&self, id: i32) -> Result<Option<ExchangeRequest>, RepositoryError> {
        let sql = format!(
            r#"
            UPDATE "ShiftExchanges"
            SET status = $2, updated_at = NOW()
            WHERE id = $1 AND status = $3
              AND NOT requester_side_applied AND NOT target_side_applied
            RETURNING {}
            "#,
            EXCHANGE_COLUMNS
        );

        let row = sqlx::query_as::<_, ExchangeRow>(&sql)
            .bind(id)
            .bind(ExchangeStatus::Proposed.as_str())
            .bind(ExchangeStatus::Approving.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_exchange_request).transpose()
    }

    async fn mark_admin_notified(&self, id: i32) -> Result<Option<ExchangeRequest>, RepositoryError> {
        let sql = format!(
            r#"
            UPDATE "ShiftExchanges"
            SET admin_notified = true,
                updated_at = CASE WHEN admin_notified THEN updated_at ELSE NOW() END
            WHERE id = $1 AND status = $2
            RETURNING {}
            "#,
            EXCHANGE_COLUMNS
        );

        let row = sqlx::query_as::<_, ExchangeRow>(&sql)
            .bind(id)
            .bind(ExchangeStatus::ApprovedBoth.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_exchange_request).transpose()
    }

    async fn list(&self, filter: &ExchangeFilter) -> Result<Vec<ExchangeRequest>, RepositoryError> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(r#"SELECT {} FROM "ShiftExchanges""#, EXCHANGE_COLUMNS));
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC, id DESC");

        let rows = qb
            .build_query_as::<ExchangeRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, ?filter, "Failed to list exchange requests");
                e
            })?;

        tracing::debug!(count = rows.len(), "Fetched exchange requests");
        rows.into_iter().map(row_to_exchange_request).collect()
    }

    async fn count(&self, filter: &ExchangeFilter) -> Result<u64, RepositoryError> {
        let mut qb = QueryBuilder::<Postgres>::new(r#"SELECT COUNT(*) FROM "ShiftExchanges""#);
        push_filter(&mut qb, filter);
        let count: i64 = qb.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}
