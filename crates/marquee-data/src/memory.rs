//! In-memory job record store.
//!
//! Mirrors the Postgres ordering rules (recency by `created_at`, ties by
//! insertion order) so the dispatcher and reconciler can be exercised without
//! a database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marquee_core::{DeliveryState, JobRecord, JobRecordStore, NewJobRecord, Promotion};
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct StoredRecord {
    seq: u64,
    record: JobRecord,
}

/// Process-local job record store.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    next_seq: u64,
    records: Vec<StoredRecord>,
}

impl Inner {
    fn push(&mut self, record: JobRecord) {
        self.next_seq += 1;
        self.records.push(StoredRecord {
            seq: self.next_seq,
            record,
        });
    }

    fn latest_pending_index(&self, job_id: Option<Uuid>) -> Option<usize> {
        self.records
            .iter()
            .enumerate()
            .filter(|(_, stored)| stored.record.delivery.is_pending())
            .filter(|(_, stored)| job_id.is_none() || stored.record.job_id == job_id)
            .max_by_key(|(_, stored)| (stored.record.created_at, stored.seq))
            .map(|(index, _)| index)
    }

    fn promote_at(&mut self, index: Option<usize>, promotion: Promotion) -> Option<JobRecord> {
        let stored = self.records.get_mut(index?)?;
        stored.record.promote(promotion, Utc::now());
        Some(stored.record.clone())
    }
}

impl MemoryJobStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a pending record with an explicit creation time.
    pub async fn create_pending_at(
        &self,
        record: NewJobRecord,
        created_at: DateTime<Utc>,
    ) -> JobRecord {
        let created = JobRecord {
            id: Uuid::new_v4(),
            job_id: Some(record.job_id),
            title: record.title,
            size_bytes: Some(record.size_bytes),
            quality: Some(record.quality),
            delivery: DeliveryState::Pending,
            request_count: 1,
            created_at,
            updated_at: created_at,
        };
        self.inner.lock().await.push(created.clone());
        created
    }

    /// Insert a fully formed record, e.g. one already delivered.
    pub async fn insert(&self, record: JobRecord) {
        self.inner.lock().await.push(record);
    }

    /// Copy of every stored record in insertion order.
    pub async fn snapshot(&self) -> Vec<JobRecord> {
        self.inner
            .lock()
            .await
            .records
            .iter()
            .map(|stored| stored.record.clone())
            .collect()
    }
}

#[async_trait]
impl JobRecordStore for MemoryJobStore {
    async fn find_ready_by_title(&self, query: &str) -> anyhow::Result<Option<JobRecord>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .records
            .iter()
            .filter(|stored| !stored.record.delivery.is_pending())
            .filter(|stored| stored.record.title_matches(query))
            .min_by_key(|stored| (stored.record.created_at, stored.seq))
            .map(|stored| stored.record.clone()))
    }

    async fn create_pending(&self, record: NewJobRecord) -> anyhow::Result<JobRecord> {
        Ok(self.create_pending_at(record, Utc::now()).await)
    }

    async fn promote_latest_pending(
        &self,
        promotion: Promotion,
    ) -> anyhow::Result<Option<JobRecord>> {
        let mut inner = self.inner.lock().await;
        let index = inner.latest_pending_index(None);
        Ok(inner.promote_at(index, promotion))
    }

    async fn promote_pending_for_job(
        &self,
        job_id: Uuid,
        promotion: Promotion,
    ) -> anyhow::Result<Option<JobRecord>> {
        let mut inner = self.inner.lock().await;
        let index = inner.latest_pending_index(Some(job_id));
        Ok(inner.promote_at(index, promotion))
    }

    async fn list_pending(&self) -> anyhow::Result<Vec<JobRecord>> {
        let inner = self.inner.lock().await;
        let mut pending: Vec<&StoredRecord> = inner
            .records
            .iter()
            .filter(|stored| stored.record.delivery.is_pending())
            .collect();
        pending.sort_by_key(|stored| std::cmp::Reverse((stored.record.created_at, stored.seq)));
        Ok(pending.into_iter().map(|stored| stored.record.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn ready(title: &str, created_at: DateTime<Utc>) -> JobRecord {
        JobRecord {
            id: Uuid::new_v4(),
            job_id: None,
            title: title.to_string(),
            size_bytes: None,
            quality: None,
            delivery: DeliveryState::Ready {
                file_reference: format!("file-{title}"),
                message_locator: 1,
            },
            request_count: 1,
            created_at,
            updated_at: created_at,
        }
    }

    #[tokio::test]
    async fn promotes_most_recent_pending_record() -> anyhow::Result<()> {
        let store = MemoryJobStore::new();
        let base = Utc::now();
        let older = store
            .create_pending_at(NewJobRecord::pending(Uuid::new_v4(), "A", 1), base)
            .await;
        let newer = store
            .create_pending_at(
                NewJobRecord::pending(Uuid::new_v4(), "B", 2),
                base + Duration::seconds(1),
            )
            .await;

        let promoted = store
            .promote_latest_pending(Promotion::new("doc-a", 10))
            .await?
            .expect("a pending record");
        assert_eq!(promoted.id, newer.id);

        let pending = store.list_pending().await?;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, older.id);
        Ok(())
    }

    #[tokio::test]
    async fn equal_timestamps_fall_back_to_insertion_order() -> anyhow::Result<()> {
        let store = MemoryJobStore::new();
        let at = Utc::now();
        let _first = store
            .create_pending_at(NewJobRecord::pending(Uuid::new_v4(), "first", 1), at)
            .await;
        let second = store
            .create_pending_at(NewJobRecord::pending(Uuid::new_v4(), "second", 1), at)
            .await;

        let promoted = store
            .promote_latest_pending(Promotion::new("doc", 3))
            .await?
            .expect("a pending record");
        assert_eq!(promoted.id, second.id);
        Ok(())
    }

    #[tokio::test]
    async fn promotion_without_pending_records_writes_nothing() -> anyhow::Result<()> {
        let store = MemoryJobStore::new();
        store.insert(ready("Arrival", Utc::now())).await;
        let before = store.snapshot().await;

        assert!(
            store
                .promote_latest_pending(Promotion::new("doc", 4))
                .await?
                .is_none()
        );
        assert_eq!(store.snapshot().await, before);
        Ok(())
    }

    #[tokio::test]
    async fn correlated_promotion_targets_the_tagged_job() -> anyhow::Result<()> {
        let store = MemoryJobStore::new();
        let base = Utc::now();
        let job_a = Uuid::new_v4();
        let a = store
            .create_pending_at(NewJobRecord::pending(job_a, "A", 1), base)
            .await;
        let _b = store
            .create_pending_at(
                NewJobRecord::pending(Uuid::new_v4(), "B", 1),
                base + Duration::seconds(1),
            )
            .await;

        let promoted = store
            .promote_pending_for_job(job_a, Promotion::new("doc-a", 11))
            .await?
            .expect("tagged record");
        assert_eq!(promoted.id, a.id);
        assert!(
            store
                .promote_pending_for_job(Uuid::new_v4(), Promotion::new("x", 12))
                .await?
                .is_none()
        );
        Ok(())
    }

    #[tokio::test]
    async fn lookup_ignores_pending_and_returns_first_match() -> anyhow::Result<()> {
        let store = MemoryJobStore::new();
        let base = Utc::now();
        store
            .create_pending_at(
                NewJobRecord::pending(Uuid::new_v4(), "Interstellar pending", 1),
                base - Duration::seconds(10),
            )
            .await;
        let first = ready("Interstellar 1080p", base);
        store.insert(first.clone()).await;
        store
            .insert(ready("Interstellar 720p", base + Duration::seconds(1)))
            .await;

        let hit = store.find_ready_by_title("INTERSTELLAR").await?;
        assert_eq!(hit.map(|record| record.id), Some(first.id));
        assert!(store.find_ready_by_title("Tenet").await?.is_none());
        Ok(())
    }
}
