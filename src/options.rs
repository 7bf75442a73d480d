use std::time::Duration;

use crate::retry::RetryPolicy;

/// Settings for a [`QueueProcessor`](crate::QueueProcessor).
#[derive(Debug, Clone)]
pub struct ProcessorOptions {
    /// Only process jobs on this queue; `None` means every queue.
    pub queue: Option<String>,
    /// Pause between the end of one tick and the start of the next.
    pub poll_interval: Duration,
    /// Used when a payload does not carry its own `time_out`.
    pub default_timeout: Duration,
    /// Ceiling applied to jobs whose payload cannot be decoded; 0 keeps retrying them.
    pub default_max_tries: u32,
    /// How long a claim fences off other processors before it is considered abandoned.
    pub claim_lease: Duration,
    pub retry_policy: RetryPolicy,
}

impl Default for ProcessorOptions {
    fn default() -> Self {
        Self {
            queue: None,
            poll_interval: Duration::from_millis(1000),
            default_timeout: Duration::from_secs(60),
            default_max_tries: 0,
            claim_lease: Duration::from_secs(300),
            retry_policy: RetryPolicy::default(),
        }
    }
}

impl ProcessorOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = Some(queue.into());
        self
    }

    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn default_max_tries(mut self, max_tries: u32) -> Self {
        self.default_max_tries = max_tries;
        self
    }

    pub fn claim_lease(mut self, lease: Duration) -> Self {
        self.claim_lease = lease;
        self
    }

    pub fn retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// The lease in the unit the store compares timestamps with. Leases too long to
    /// represent are capped at a year.
    pub(crate) fn claim_lease_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.claim_lease)
            .unwrap_or_else(|_| chrono::Duration::days(365))
    }

    /// Timeout for a payload's `time_out` in seconds, or the default.
    pub(crate) fn timeout_for(&self, time_out: Option<u64>) -> Duration {
        time_out.map_or(self.default_timeout, Duration::from_secs)
    }
}
