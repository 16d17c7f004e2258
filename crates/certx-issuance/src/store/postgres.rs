//! PostgreSQL submission store.
//!
//! The full record is stored as `JSONB`; raw upload bytes are kept out of
//! the JSON in the `raw_content` `BYTEA` column and rehydrated on read.
//! `owner_id`, `original_hash`, `published_hash` and `state` are copied out
//! of the record for filtering and for the partial unique indexes that
//! enforce one VALID submission per hash.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use uuid::Uuid;

use certx_core::SubmissionId;
use certx_state::{Submission, SubmissionState};

use super::{StoreError, SubmissionFilter, SubmissionStore};

const PRIMARY_KEY: &str = "submissions_pkey";

/// Connect to PostgreSQL and apply the embedded migrations.
pub async fn connect(url: &str) -> Result<PgPool, StoreError> {
    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(url)
        .await?;
    tracing::info!("Connected to PostgreSQL");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(sqlx::Error::from)?;
    tracing::info!("Database migrations applied");

    Ok(pool)
}

/// Submission store backed by the `submissions` table.
#[derive(Debug, Clone)]
pub struct PgSubmissionStore {
    pool: PgPool,
}

impl PgSubmissionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool, shared with the audit sink.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl SubmissionStore for PgSubmissionStore {
    async fn insert(&self, submission: &Submission) -> Result<(), StoreError> {
        let record = serde_json::to_value(submission)?;
        let raw = submission.raw().map(|r| r.bytes.as_slice());

        sqlx::query(
            "INSERT INTO submissions (id, owner_id, original_hash, published_hash, state,
             record, raw_content, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(submission.id.0)
        .bind(submission.owner.as_str())
        .bind(submission.original_hash.as_str())
        .bind(submission.published_hash().map(|h| h.as_str()))
        .bind(submission.state().as_str())
        .bind(&record)
        .bind(raw)
        .bind(submission.created_at)
        .bind(submission.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(e, submission.id))?;

        Ok(())
    }

    async fn get(&self, id: SubmissionId) -> Result<Option<Submission>, StoreError> {
        let row = sqlx::query_as::<_, SubmissionRow>(
            "SELECT id, state, record, raw_content FROM submissions WHERE id = $1",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(SubmissionRow::into_record).transpose()
    }

    async fn find(&self, filter: &SubmissionFilter) -> Result<Vec<Submission>, StoreError> {
        let limit = filter.limit.map(|l| i64::try_from(l).unwrap_or(i64::MAX));
        let rows = sqlx::query_as::<_, SubmissionRow>(
            "SELECT id, state, record, raw_content FROM submissions
             WHERE ($1::text IS NULL OR original_hash = $1)
               AND ($2::text IS NULL OR published_hash = $2)
               AND ($3::text IS NULL OR owner_id = $3)
               AND ($4::text IS NULL OR state = $4)
             ORDER BY created_at DESC
             LIMIT $5",
        )
        .bind(filter.original_hash.as_ref().map(|h| h.as_str()))
        .bind(filter.published_hash.as_ref().map(|h| h.as_str()))
        .bind(filter.owner.as_ref().map(|o| o.as_str()))
        .bind(filter.state.map(|s| s.as_str()))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(SubmissionRow::into_record).collect()
    }

    async fn replace_if_state(
        &self,
        submission: &Submission,
        expected: SubmissionState,
    ) -> Result<bool, StoreError> {
        let record = serde_json::to_value(submission)?;
        let raw = submission.raw().map(|r| r.bytes.as_slice());

        let result = sqlx::query(
            "UPDATE submissions
             SET published_hash = $1, state = $2, record = $3, raw_content = $4, updated_at = $5
             WHERE id = $6 AND state = $7",
        )
        .bind(submission.published_hash().map(|h| h.as_str()))
        .bind(submission.state().as_str())
        .bind(&record)
        .bind(raw)
        .bind(submission.updated_at)
        .bind(submission.id.0)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(e, submission.id))?;

        Ok(result.rows_affected() > 0)
    }
}

fn write_error(err: sqlx::Error, id: SubmissionId) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return if db.constraint() == Some(PRIMARY_KEY) {
                StoreError::DuplicateId(id)
            } else {
                StoreError::Conflict(db.message().to_string())
            };
        }
    }
    StoreError::Database(err)
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct SubmissionRow {
    id: Uuid,
    state: String,
    record: serde_json::Value,
    raw_content: Option<Vec<u8>>,
}

impl SubmissionRow {
    fn into_record(self) -> Result<Submission, StoreError> {
        let mut submission: Submission = serde_json::from_value(self.record)?;
        if submission.state().as_str() != self.state {
            tracing::warn!(
                id = %self.id,
                column = %self.state,
                record = %submission.state(),
                "submission state column disagrees with record, trusting record"
            );
        }
        if let (Some(raw), Some(bytes)) = (submission.raw_mut(), self.raw_content) {
            raw.bytes = bytes;
        }
        Ok(submission)
    }
}
