use aide_de_camp::core::{job_handle::JobHandle, queue::QueueError, Xid};
use async_trait::async_trait;
use bincode::error::{DecodeError, EncodeError};
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::types::{JobFilter, JobRecord, NewJob};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error("Failed to encode job payload: {0}")]
    Encode(#[from] EncodeError),
    #[error("Failed to decode job payload: {0}")]
    Decode(#[from] DecodeError),
    #[error("Job {0} is claimed by a running processor")]
    JobReserved(Xid),
    #[error("Job store unavailable: {0}")]
    Unavailable(String),
}

/// Persistence for job records.
///
/// `claim` is the only way a processor gets to run a job. It must check eligibility and the
/// previous claim's lease, set `reserved_at` and bump `attempts` as one atomic step, so that
/// two processors sharing a store never run the same attempt.
#[async_trait]
pub trait JobStore: Send + Sync + 'static {
    type Handle: JobHandle + Send + 'static;

    async fn push(&self, job: NewJob) -> Result<Xid, StoreError>;

    /// Records matching `filter`, eligible or not, in store order.
    async fn query(&self, filter: &JobFilter) -> Result<Vec<JobRecord>, StoreError>;

    /// Claims the job for one attempt. `Ok(None)` when the job is gone, not eligible at `now`,
    /// or still held by another claim younger than `lease`.
    async fn claim(
        &self,
        id: Xid,
        now: DateTime<Utc>,
        lease: chrono::Duration,
    ) -> Result<Option<Self::Handle>, StoreError>;

    async fn find(&self, id: Xid) -> Result<Option<JobRecord>, StoreError>;
}
