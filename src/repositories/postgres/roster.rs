use async_trait::async_trait;
use sqlx::{types::Json, FromRow, PgPool};

use crate::models::{FieldWrite, MonthKey, RosterRecord, RosterSnapshot, Week};
use crate::repositories::{RepositoryError, RosterRepository};

/// Roster documents stored as JSONB in `"Rosters"`, one row per month.
#[derive(Clone)]
pub struct PgRosterRepository {
    pool: PgPool,
}

impl PgRosterRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct RosterRow {
    month_key: String,
    version: i64,
    weeks: Json<Vec<Week>>,
}

/// Distinct `shifts` objects touched by a batch, in first-seen order.
fn shifts_paths(writes: &[FieldWrite]) -> Vec<Vec<String>> {
    let mut paths: Vec<Vec<String>> = Vec::new();
    for write in writes {
        let path = write.shifts_path();
        if !paths.contains(&path) {
            paths.push(path);
        }
    }
    paths
}

/// `jsonb_set` nested once per write, so the whole batch is one UPDATE.
///
/// `jsonb_set` only creates the last path element, so a day stored without a
/// `shifts` object would swallow the write. Each touched day gets an empty
/// object first (`$3..`), then the leaf writes follow as path/value pairs.
fn merge_expression(shifts_count: usize, write_count: usize) -> String {
    let ensured = (0..shifts_count).fold("weeks".to_string(), |expr, i| {
        let path_param = 3 + i;
        format!(
            "jsonb_set({}, ${p}::text[], COALESCE(weeks #> ${p}::text[], '{{}}'::jsonb), true)",
            expr,
            p = path_param
        )
    });

    let first_leaf = 3 + shifts_count;
    (0..write_count).fold(ensured, |expr, i| {
        let path_param = first_leaf + i * 2;
        format!("jsonb_set({}, ${}::text[], ${}::jsonb, true)", expr, path_param, path_param + 1)
    })
}

#[async_trait]
impl RosterRepository for PgRosterRepository {
    async fn get(&self, month_key: &MonthKey) -> Result<Option<RosterSnapshot>, RepositoryError> {
        let row = sqlx::query_as::<_, RosterRow>(
            r#"SELECT month_key, version, weeks FROM "Rosters" WHERE month_key = $1"#,
        )
        .bind(month_key.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, month_key = %month_key, "Failed to fetch roster");
            e
        })?;

        Ok(row.map(|row| {
            let record = RosterRecord {
                month_key: MonthKey::new(row.month_key),
                weeks: row.weeks.0,
            };
            RosterSnapshot::new(record, row.version)
        }))
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

        let shifts = shifts_paths(writes);
        let sql = format!(
            r#"
            UPDATE "Rosters"
            SET weeks = {}, version = version + 1, updated_at = NOW()
            WHERE month_key = $1 AND version = $2
            RETURNING version
            "#,
            merge_expression(shifts.len(), writes.len())
        );

        let mut query = sqlx::query_scalar::<_, i64>(&sql)
            .bind(month_key.as_str())
            .bind(expected_version);
        for path in shifts {
            query = query.bind(path);
        }
        for write in writes {
            query = query.bind(write.json_path()).bind(Json(write.json_value()));
        }

        let new_version = query.fetch_optional(&self.pool).await.map_err(|e| {
            tracing::error!(error = %e, month_key = %month_key, "Roster merge write failed");
            e
        })?;

        if let Some(version) = new_version {
            return Ok(version);
        }

        // Nothing updated: either the month is gone or someone wrote first.
        let exists: bool = sqlx::query_scalar(r#"SELECT EXISTS(SELECT 1 FROM "Rosters" WHERE month_key = $1)"#)
            .bind(month_key.as_str())
            .fetch_one(&self.pool)
            .await?;

        if exists {
            Err(RepositoryError::Conflict(month_key.to_string()))
        } else {
            Err(RepositoryError::NotFound(format!("Roster {}", month_key)))
        }
    }
}
