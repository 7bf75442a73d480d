use aide_de_camp::core::{Bytes, Xid};
use bincode::{Decode, Encode};
use chrono::{DateTime, Utc};

/// Name of the queue used when a job does not ask for a specific one.
pub const DEFAULT_QUEUE: &str = "default";

/// A persisted unit of deferred work.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub id: Xid,
    pub queue: String,
    /// Handler name recorded at enqueue time. Informational, dispatch reads the payload.
    pub job_type: String,
    pub payload: Option<Bytes>,
    pub attempts: u32,
    /// Epoch seconds before which the job must not run.
    pub available_at: Option<i64>,
    pub reserved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn has_payload(&self) -> bool {
        self.payload.as_ref().is_some_and(|p| !p.is_empty())
    }

    /// `available_at` unset or not in the future.
    pub fn is_available(&self, now: i64) -> bool {
        self.available_at.map_or(true, |at| at <= now)
    }

    pub fn is_eligible(&self, now: i64) -> bool {
        self.has_payload() && self.is_available(now)
    }

    /// Whether a previous claim is absent or has outlived its lease.
    pub fn is_claimable(&self, now: DateTime<Utc>, lease: chrono::Duration) -> bool {
        match self.reserved_at {
            None => true,
            Some(reserved_at) => reserved_at + lease <= now,
        }
    }
}

/// The command descriptor stored in a job's payload.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct JobPayload {
    pub display_name: String,
    /// Key used to look up the handler in the registry.
    pub name: String,
    /// Tries before the job is dead-lettered; 0 retries forever.
    pub max_tries: u32,
    /// Execution timeout in seconds.
    pub time_out: Option<u64>,
    /// Epoch seconds after which the job should no longer be started.
    pub time_out_at: Option<i64>,
}

impl JobPayload {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            max_tries: 0,
            time_out: None,
            time_out_at: None,
        }
    }

    pub fn display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    pub fn max_tries(mut self, max_tries: u32) -> Self {
        self.max_tries = max_tries;
        self
    }

    pub fn time_out(mut self, seconds: u64) -> Self {
        self.time_out = Some(seconds);
        self
    }

    pub fn time_out_at(mut self, epoch_seconds: i64) -> Self {
        self.time_out_at = Some(epoch_seconds);
        self
    }
}

/// A record that has not been stored yet.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub queue: String,
    pub job_type: String,
    pub payload: Option<Bytes>,
    pub attempts: u32,
    pub available_at: Option<i64>,
}

impl NewJob {
    pub fn new(queue: impl Into<String>, job_type: impl Into<String>, payload: Bytes) -> Self {
        Self {
            queue: queue.into(),
            job_type: job_type.into(),
            payload: Some(payload),
            attempts: 0,
            available_at: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobFilter {
    pub queue: Option<String>,
}

impl JobFilter {
    pub fn queue(queue: impl Into<String>) -> Self {
        Self {
            queue: Some(queue.into()),
        }
    }

    pub fn matches(&self, record: &JobRecord) -> bool {
        self.queue.as_deref().map_or(true, |q| q == record.queue)
    }
}

/// Current time in epoch seconds.
pub fn timestamp_now() -> i64 {
    Utc::now().timestamp()
}
