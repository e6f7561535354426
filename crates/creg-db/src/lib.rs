//! creg-db
//!
//! PostgreSQL persistence for submissions.
//!
//! [`PgSubmissionStore`] implements the runtime's [`SubmissionStore`]. Status
//! changes are a single conditional `update ... where status = any($2)`, so
//! two workers racing for the same stage cannot both win.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use creg_runtime::{StoreError, SubmissionStore};
use creg_schemas::{
    Decision, FinalOutcome, ReviewRecord, Submission, SubmissionId, SubmissionStatus,
};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::debug;

pub const ENV_DB_URL: &str = "CREG_DATABASE_URL";

const PG_UNIQUE_VIOLATION: &str = "23505";

/// Connect to Postgres using CREG_DATABASE_URL.
pub async fn connect_from_env() -> Result<PgPool> {
    let url =
        std::env::var(ENV_DB_URL).with_context(|| format!("missing env var {ENV_DB_URL}"))?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await
        .context("failed to connect to Postgres")?;

    Ok(pool)
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_submissions_table: bool,
}

/// Connectivity and schema presence.
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    let (exists,): (bool,) = sqlx::query_as::<_, (bool,)>(
        r#"
        select exists (
            select 1
            from information_schema.tables
            where table_schema='public' and table_name='submissions'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus {
        ok: one == 1,
        has_submissions_table: exists,
    })
}

/// Submission count per status, ordered by status text.
pub async fn count_by_status(pool: &PgPool) -> Result<Vec<(String, i64)>> {
    let rows = sqlx::query_as::<_, (String, i64)>(
        r#"
        select status, count(*)::bigint
        from submissions
        group by status
        order by status
        "#,
    )
    .fetch_all(pool)
    .await
    .context("count_by_status failed")?;
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PgSubmissionStore {
    pool: PgPool,
}

impl PgSubmissionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Replace one top-level key of the stored document.
    async fn set_body_key(&self, id: SubmissionId, key: &str, value: Value) -> Result<(), StoreError> {
        let res = sqlx::query(
            r#"
            update submissions
               set body = jsonb_set(body, array[$2::text], $3, true),
                   updated_at_utc = now()
             where id = $1
            "#,
        )
        .bind(id)
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }
}

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn to_json<T: serde::Serialize>(v: &T) -> Result<Value, StoreError> {
    serde_json::to_value(v).map_err(|e| StoreError::Backend(format!("encode: {e}")))
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .and_then(|d| d.code())
        .map(|c| c == PG_UNIQUE_VIOLATION)
        .unwrap_or(false)
}

/// Decode a row. Column values win over the copies inside `body`.
fn row_to_submission(row: &sqlx::postgres::PgRow) -> Result<Submission, StoreError> {
    let body: Value = row.try_get("body").map_err(backend)?;
    let mut s: Submission = serde_json::from_value(body)
        .map_err(|e| StoreError::Backend(format!("decode submission body: {e}")))?;

    let status: String = row.try_get("status").map_err(backend)?;
    s.status = SubmissionStatus::parse(&status)
        .ok_or_else(|| StoreError::Backend(format!("unknown status in db: {status}")))?;
    s.updated_at_utc = row.try_get("updated_at_utc").map_err(backend)?;
    s.updated_by = row.try_get("updated_by").map_err(backend)?;
    Ok(s)
}

#[async_trait]
impl SubmissionStore for PgSubmissionStore {
    async fn create(&self, submission: &Submission) -> Result<(), StoreError> {
        let body = to_json(submission)?;
        sqlx::query(
            r#"
            insert into submissions (
              id, status, submitter_key, body, created_at_utc, updated_at_utc, created_by, updated_by
            ) values (
              $1, $2, $3, $4, $5, $6, $7, $8
            )
            "#,
        )
        .bind(submission.id)
        .bind(submission.status.as_str())
        .bind(submission.submitter.key())
        .bind(body)
        .bind(submission.created_at_utc)
        .bind(submission.updated_at_utc)
        .bind(&submission.created_by)
        .bind(&submission.updated_by)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::AlreadyExists(submission.id)
            } else {
                backend(e)
            }
        })?;
        Ok(())
    }

    async fn get(&self, id: SubmissionId) -> Result<Option<Submission>, StoreError> {
        let row = sqlx::query(
            r#"
            select status, body, updated_at_utc, updated_by
              from submissions
             where id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.as_ref().map(row_to_submission).transpose()
    }

    async fn compare_and_set_status(
        &self,
        id: SubmissionId,
        from: &[SubmissionStatus],
        to: SubmissionStatus,
        actor: &str,
    ) -> Result<bool, StoreError> {
        let from: Vec<String> = from.iter().map(|s| s.as_str().to_string()).collect();
        let res = sqlx::query(
            r#"
            update submissions
               set status = $3,
                   body = jsonb_set(body, '{status}', to_jsonb($3::text)),
                   updated_at_utc = now(),
                   updated_by = $4
             where id = $1
               and status = any($2)
            "#,
        )
        .bind(id)
        .bind(&from)
        .bind(to.as_str())
        .bind(actor)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if res.rows_affected() == 1 {
            debug!(submission_id = %id, to = %to, actor, "status moved");
            return Ok(true);
        }

        // Distinguish "lost the race" from "no such submission".
        let (exists,): (bool,) =
            sqlx::query_as::<_, (bool,)>("select exists (select 1 from submissions where id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await
                .map_err(backend)?;
        if exists {
            Ok(false)
        } else {
            Err(StoreError::NotFound(id))
        }
    }

    async fn record_decision(&self, id: SubmissionId, decision: &Decision) -> Result<(), StoreError> {
        self.set_body_key(id, "decision", to_json(decision)?).await
    }

    async fn record_review(&self, id: SubmissionId, review: &ReviewRecord) -> Result<(), StoreError> {
        self.set_body_key(id, "review", to_json(review)?).await?;
        sqlx::query("update submissions set updated_by = $2 where id = $1")
            .bind(id)
            .bind(&review.reviewer)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn record_client_number(
        &self,
        id: SubmissionId,
        client_number: &str,
    ) -> Result<(), StoreError> {
        self.set_body_key(id, "clientNumber", Value::String(client_number.to_string()))
            .await
    }

    async fn record_outcome(&self, id: SubmissionId, outcome: FinalOutcome) -> Result<(), StoreError> {
        self.set_body_key(id, "outcome", to_json(&outcome)?).await
    }

    async fn list_created_since(
        &self,
        submitter_key: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>, StoreError> {
        let rows = sqlx::query_as::<_, (DateTime<Utc>,)>(
            r#"
            select created_at_utc
              from submissions
             where submitter_key = $1
               and created_at_utc >= $2
             order by created_at_utc
            "#,
        )
        .bind(submitter_key)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        Ok(rows.into_iter().map(|(t,)| t).collect())
    }
}
