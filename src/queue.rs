use std::{collections::HashMap, sync::Arc, time::Duration};

use aide_de_camp::core::{new_xid, queue::QueueError, Xid};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::instrument;

use crate::{
    codec::PayloadCodec,
    job_handle::{DeadJobs, JobTable, MemoryJobHandle},
    store::{JobStore, StoreError},
    types::{timestamp_now, JobFilter, JobPayload, JobRecord, NewJob},
};

/// In-memory job store. Records that run out of tries land in a separate dead-letter list.
pub struct MemoryQueue {
    jobs: JobTable,
    dead_jobs: DeadJobs,
    codec: PayloadCodec,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            dead_jobs: Arc::new(RwLock::new(Vec::new())),
            codec: PayloadCodec::new(),
        }
    }

    /// Enqueue a job that may run right away.
    pub async fn schedule(&self, queue: &str, payload: JobPayload) -> Result<Xid, StoreError> {
        self.schedule_at(queue, payload, None).await
    }

    /// Enqueue a job that runs no earlier than `delay` from now.
    pub async fn schedule_in(
        &self,
        queue: &str,
        payload: JobPayload,
        delay: Duration,
    ) -> Result<Xid, StoreError> {
        let delay = i64::try_from(delay.as_secs()).unwrap_or(i64::MAX);
        let available_at = timestamp_now().saturating_add(delay);
        self.schedule_at(queue, payload, Some(available_at)).await
    }

    #[instrument(skip_all, err, fields(job_type = %payload.name, payload_size))]
    pub async fn schedule_at(
        &self,
        queue: &str,
        payload: JobPayload,
        available_at: Option<i64>,
    ) -> Result<Xid, StoreError> {
        let encoded = self.codec.encode(&payload)?;

        tracing::Span::current().record("payload_size", encoded.len());

        let mut job = NewJob::new(queue, payload.name, encoded);
        job.available_at = available_at;
        self.push(job).await
    }

    /// Remove a job nobody is running.
    #[instrument(skip_all, err, fields(job_id = %job_id))]
    pub async fn cancel_job(&self, job_id: Xid) -> Result<(), StoreError> {
        let mut jobs = self.jobs.write().await;

        let reserved = jobs.get(&job_id).map(|job| job.reserved_at.is_some());

        match reserved {
            Some(false) => {
                jobs.remove(&job_id);
                Ok(())
            }
            Some(true) => Err(StoreError::JobReserved(job_id)),
            None => Err(QueueError::JobNotFound(job_id).into()),
        }
    }

    /// Remove a job nobody is running and hand back its descriptor.
    #[instrument(skip_all, err, fields(job_id = %job_id))]
    pub async fn unschedule_job(&self, job_id: Xid) -> Result<JobPayload, StoreError> {
        let mut jobs = self.jobs.write().await;

        let job = jobs
            .get(&job_id)
            .ok_or(QueueError::JobNotFound(job_id))?;
        if job.reserved_at.is_some() {
            return Err(StoreError::JobReserved(job_id));
        }

        let decoded = self
            .codec
            .decode(job.payload.as_deref().unwrap_or_default())?;
        jobs.remove(&job_id);
        Ok(decoded)
    }

    pub async fn dead_jobs(&self) -> Vec<JobRecord> {
        self.dead_jobs.read().await.clone()
    }

    /// Put a dead-lettered job back in line with a fresh attempt count.
    #[instrument(skip_all, err, fields(job_id = %job_id))]
    pub async fn retry_dead_job(&self, job_id: Xid) -> Result<(), StoreError> {
        // Handles lock `jobs` before `dead_jobs`; never hold both in the other order.
        let mut job = self.take_dead_job(job_id).await?;
        job.attempts = 0;
        job.available_at = None;
        job.reserved_at = None;
        job.updated_at = Utc::now();

        self.jobs.write().await.insert(job_id, job);
        Ok(())
    }

    /// Drop a single dead-lettered job for good.
    #[instrument(skip_all, err, fields(job_id = %job_id))]
    pub async fn delete_dead_job(&self, job_id: Xid) -> Result<(), StoreError> {
        self.take_dead_job(job_id).await.map(|_| ())
    }

    /// Empty the dead-letter list, returning how many jobs were dropped.
    pub async fn purge_dead_jobs(&self) -> usize {
        let mut dead_jobs = self.dead_jobs.write().await;
        let purged = dead_jobs.len();
        dead_jobs.clear();
        tracing::debug!(purged, "Purged dead jobs");
        purged
    }

    async fn take_dead_job(&self, job_id: Xid) -> Result<JobRecord, StoreError> {
        let mut dead_jobs = self.dead_jobs.write().await;
        let position = dead_jobs
            .iter()
            .position(|job| job.id == job_id)
            .ok_or(QueueError::JobNotFound(job_id))?;
        Ok(dead_jobs.remove(position))
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobStore for MemoryQueue {
    type Handle = MemoryJobHandle;

    #[instrument(skip_all, err, fields(queue = %job.queue, job_type = %job.job_type))]
    async fn push(&self, job: NewJob) -> Result<Xid, StoreError> {
        let jid = new_xid();
        let now = Utc::now();

        let mut jobs = self.jobs.write().await;

        jobs.insert(
            jid,
            JobRecord {
                id: jid,
                queue: job.queue,
                job_type: job.job_type,
                payload: job.payload,
                attempts: job.attempts,
                available_at: job.available_at,
                reserved_at: None,
                created_at: now,
                updated_at: now,
            },
        );

        Ok(jid)
    }

    #[instrument(skip_all, err)]
    async fn query(&self, filter: &JobFilter) -> Result<Vec<JobRecord>, StoreError> {
        let jobs = self.jobs.read().await;

        let mut matching: Vec<JobRecord> = jobs
            .values()
            .filter(|job| filter.matches(job))
            .cloned()
            .collect();
        matching.sort_by_key(|job| job.created_at);

        Ok(matching)
    }

    #[instrument(skip_all, err, fields(job_id = %id))]
    async fn claim(
        &self,
        id: Xid,
        now: DateTime<Utc>,
        lease: chrono::Duration,
    ) -> Result<Option<Self::Handle>, StoreError> {
        let mut jobs = self.jobs.write().await;

        let Some(job) = jobs.get_mut(&id) else {
            return Ok(None);
        };
        if !job.is_eligible(now.timestamp()) || !job.is_claimable(now, lease) {
            return Ok(None);
        }

        job.reserved_at = Some(now);
        job.attempts += 1;
        job.updated_at = now;

        Ok(Some(MemoryJobHandle::new(
            Arc::clone(&self.jobs),
            Arc::clone(&self.dead_jobs),
            job.clone(),
        )))
    }

    async fn find(&self, id: Xid) -> Result<Option<JobRecord>, StoreError> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }
}
