//! Postgres-backed job record store.
//!
//! # Design
//! - Promotion is a single `UPDATE` over a `FOR UPDATE` subselect, so one
//!   storage event promotes at most one record. A concurrent promoter waits
//!   for a locked row and re-checks it rather than skipping to an older one.
//! - Recency is `created_at`, ties broken by insertion sequence.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marquee_core::{DeliveryState, JobRecord, JobRecordStore, NewJobRecord, Promotion};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DataError, Result};

/// Database-backed repository for job records.
#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

const INSERT_PENDING: &str = r"
    INSERT INTO marquee.job_records (id, job_id, title, size_bytes, quality, delivery_state)
    VALUES ($1, $2, $3, $4, $5, 'pending')
    RETURNING id, job_id, title, size_bytes, quality, delivery_state,
              file_reference, message_locator, request_count, created_at, updated_at
";

const SELECT_READY_BY_TITLE: &str = r"
    SELECT id, job_id, title, size_bytes, quality, delivery_state,
           file_reference, message_locator, request_count, created_at, updated_at
    FROM marquee.job_records
    WHERE delivery_state = 'ready'
      AND strpos(lower(title), lower($1)) > 0
    ORDER BY created_at ASC, seq ASC
    LIMIT 1
";

const SELECT_PENDING: &str = r"
    SELECT id, job_id, title, size_bytes, quality, delivery_state,
           file_reference, message_locator, request_count, created_at, updated_at
    FROM marquee.job_records
    WHERE delivery_state = 'pending'
    ORDER BY created_at DESC, seq DESC
";

const PROMOTE_LATEST_PENDING: &str = r"
    UPDATE marquee.job_records AS r
    SET delivery_state = 'ready',
        file_reference = $1,
        message_locator = $2,
        quality = $3,
        updated_at = now()
    WHERE r.delivery_state = 'pending'
      AND r.id = (
        SELECT id
        FROM marquee.job_records
        WHERE delivery_state = 'pending'
        ORDER BY created_at DESC, seq DESC
        LIMIT 1
        FOR UPDATE
      )
    RETURNING r.id, r.job_id, r.title, r.size_bytes, r.quality, r.delivery_state,
              r.file_reference, r.message_locator, r.request_count, r.created_at, r.updated_at
";

const PROMOTE_PENDING_FOR_JOB: &str = r"
    UPDATE marquee.job_records AS r
    SET delivery_state = 'ready',
        file_reference = $1,
        message_locator = $2,
        quality = $3,
        updated_at = now()
    WHERE r.delivery_state = 'pending'
      AND r.id = (
        SELECT id
        FROM marquee.job_records
        WHERE delivery_state = 'pending' AND job_id = $4
        ORDER BY created_at DESC, seq DESC
        LIMIT 1
        FOR UPDATE
      )
    RETURNING r.id, r.job_id, r.title, r.size_bytes, r.quality, r.delivery_state,
              r.file_reference, r.message_locator, r.request_count, r.created_at, r.updated_at
";

impl PgJobStore {
    /// Initialise the store, applying pending migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if migrations fail or the database is unreachable.
    pub async fn new(pool: PgPool) -> Result<Self> {
        let mut migrator = sqlx::migrate!("./migrations");
        migrator.set_ignore_missing(true);
        migrator
            .run(&pool)
            .await
            .map_err(|source| DataError::MigrationFailed { source })?;
        Ok(Self { pool })
    }

    /// Wrap a pool whose schema is already migrated.
    #[must_use]
    pub const fn attach(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Access the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn insert_pending(&self, record: &NewJobRecord) -> Result<JobRecord> {
        let row = sqlx::query(INSERT_PENDING)
            .bind(Uuid::new_v4())
            .bind(record.job_id)
            .bind(&record.title)
            .bind(clamp_i64(record.size_bytes))
            .bind(&record.quality)
            .fetch_one(&self.pool)
            .await
            .map_err(|source| DataError::query("create_pending", source))?;
        decode_record(&row)
    }

    async fn select_ready(&self, query: &str) -> Result<Option<JobRecord>> {
        let row = sqlx::query(SELECT_READY_BY_TITLE)
            .bind(query)
            .fetch_optional(&self.pool)
            .await
            .map_err(|source| DataError::query("find_ready_by_title", source))?;
        row.as_ref().map(decode_record).transpose()
    }

    async fn promote(
        &self,
        operation: &'static str,
        sql: &'static str,
        promotion: &Promotion,
        job_id: Option<Uuid>,
    ) -> Result<Option<JobRecord>> {
        let mut query = sqlx::query(sql)
            .bind(&promotion.file_reference)
            .bind(promotion.message_locator)
            .bind(&promotion.quality);
        if let Some(job_id) = job_id {
            query = query.bind(job_id);
        }
        let row = query
            .fetch_optional(&self.pool)
            .await
            .map_err(|source| DataError::query(operation, source))?;
        row.as_ref().map(decode_record).transpose()
    }

    async fn select_pending(&self) -> Result<Vec<JobRecord>> {
        let rows = sqlx::query(SELECT_PENDING)
            .fetch_all(&self.pool)
            .await
            .map_err(|source| DataError::query("list_pending", source))?;
        rows.iter().map(decode_record).collect()
    }
}

#[async_trait]
impl JobRecordStore for PgJobStore {
    async fn find_ready_by_title(&self, query: &str) -> anyhow::Result<Option<JobRecord>> {
        self.select_ready(query)
            .await
            .context("failed to look up ready record")
    }

    async fn create_pending(&self, record: NewJobRecord) -> anyhow::Result<JobRecord> {
        let created = self
            .insert_pending(&record)
            .await
            .context("failed to create pending record")?;
        debug!(record_id = %created.id, job_id = %record.job_id, "pending record created");
        Ok(created)
    }

    async fn promote_latest_pending(
        &self,
        promotion: Promotion,
    ) -> anyhow::Result<Option<JobRecord>> {
        self.promote("promote_latest_pending", PROMOTE_LATEST_PENDING, &promotion, None)
            .await
            .context("failed to promote latest pending record")
    }

    async fn promote_pending_for_job(
        &self,
        job_id: Uuid,
        promotion: Promotion,
    ) -> anyhow::Result<Option<JobRecord>> {
        self.promote(
            "promote_pending_for_job",
            PROMOTE_PENDING_FOR_JOB,
            &promotion,
            Some(job_id),
        )
        .await
        .context("failed to promote pending record for job")
    }

    async fn list_pending(&self) -> anyhow::Result<Vec<JobRecord>> {
        self.select_pending()
            .await
            .context("failed to list pending records")
    }
}

fn decode_record(row: &PgRow) -> Result<JobRecord> {
    let label: String = row.try_get("delivery_state")?;
    let file_reference: Option<String> = row.try_get("file_reference")?;
    let message_locator: Option<i64> = row.try_get("message_locator")?;
    let delivery = DeliveryState::from_parts(&label, file_reference, message_locator).map_err(
        |source| DataError::RowDecode {
            column: "delivery_state",
            source,
        },
    )?;
    let size_bytes: Option<i64> = row.try_get("size_bytes")?;
    let request_count: i32 = row.try_get("request_count")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at")?;

    Ok(JobRecord {
        id: row.try_get("id")?,
        job_id: row.try_get("job_id")?,
        title: row.try_get("title")?,
        size_bytes: size_bytes.and_then(|value| u64::try_from(value).ok()),
        quality: row.try_get("quality")?,
        delivery,
        request_count: u32::try_from(request_count).unwrap_or(0),
        created_at,
        updated_at,
    })
}

fn clamp_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_i64_saturates() {
        assert_eq!(clamp_i64(5), 5);
        assert_eq!(clamp_i64(u64::MAX), i64::MAX);
    }

    #[test]
    fn promotion_statements_guard_pending_state() {
        for sql in [PROMOTE_LATEST_PENDING, PROMOTE_PENDING_FOR_JOB] {
            assert!(sql.contains("r.delivery_state = 'pending'"));
            assert!(sql.contains("FOR UPDATE"));
            assert!(!sql.contains("SKIP LOCKED"));
            assert!(sql.contains("ORDER BY created_at DESC, seq DESC"));
        }
    }
}
