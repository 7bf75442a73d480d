use std::{collections::HashMap, sync::Arc};

use aide_de_camp::core::{job_handle::JobHandle, queue::QueueError, Bytes, Xid};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::warn;

use crate::types::JobRecord;

pub(crate) type JobTable = Arc<RwLock<HashMap<Xid, JobRecord>>>;
pub(crate) type DeadJobs = Arc<RwLock<Vec<JobRecord>>>;

/// A claimed job. Every outcome first checks that the record still carries this claim's
/// `reserved_at`; a claim that lost its lease to another processor cannot touch the record.
pub struct MemoryJobHandle {
    jobs: JobTable,
    dead_jobs: DeadJobs,
    row: JobRecord,
}

impl MemoryJobHandle {
    pub(crate) fn new(jobs: JobTable, dead_jobs: DeadJobs, row: JobRecord) -> Self {
        Self {
            jobs,
            dead_jobs,
            row,
        }
    }

    /// The record as it was right after the claim.
    pub fn record(&self) -> &JobRecord {
        &self.row
    }

    fn holds_claim(&self, current: &JobRecord) -> bool {
        current.reserved_at == self.row.reserved_at
    }
}

#[async_trait]
impl JobHandle for MemoryJobHandle {
    fn id(&self) -> Xid {
        self.row.id
    }

    fn job_type(&self) -> &str {
        &self.row.job_type
    }

    fn payload(&self) -> Bytes {
        self.row.payload.clone().unwrap_or_default()
    }

    fn retries(&self) -> u32 {
        self.row.attempts
    }

    async fn complete(mut self) -> Result<(), QueueError> {
        let jid = self.id();
        let mut jobs = self.jobs.write().await;

        let job = jobs.get(&jid).ok_or(QueueError::JobNotFound(jid))?;
        if !self.holds_claim(job) {
            warn!(%jid, "Claim lost before completion, leaving job in place");
            return Err(QueueError::JobNotFound(jid));
        }

        jobs.remove(&jid);
        Ok(())
    }

    async fn fail(mut self) -> Result<(), QueueError> {
        let jid = self.id();
        let mut jobs = self.jobs.write().await;

        let job = jobs.get_mut(&jid).ok_or(QueueError::JobNotFound(jid))?;
        if !self.holds_claim(job) {
            return Err(QueueError::JobNotFound(jid));
        }
        job.reserved_at = None;
        job.updated_at = Utc::now();

        Ok(())
    }

    async fn dead_queue(mut self) -> Result<(), QueueError> {
        let jid = self.id();

        let mut jobs = self.jobs.write().await;
        match jobs.get(&jid) {
            Some(job) if self.holds_claim(job) => {}
            _ => return Err(QueueError::JobNotFound(jid)),
        }

        if let Some(mut removed_job) = jobs.remove(&jid) {
            removed_job.reserved_at = None;
            removed_job.updated_at = Utc::now();
            let mut dead_jobs = self.dead_jobs.write().await;
            dead_jobs.push(removed_job);
        }

        Ok(())
    }
}
