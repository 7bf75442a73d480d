use std::sync::Arc;

use aide_de_camp::core::{job_handle::JobHandle, Xid};
use chrono::Utc;
use thiserror::Error;
use tokio::{runtime::Handle, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    codec::PayloadCodec,
    context::JobContext,
    options::ProcessorOptions,
    retry::{decide, JobState},
    runner::JobRunner,
    store::{JobStore, StoreError},
    types::{JobFilter, JobRecord},
};

#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("Failed to scan job store: {0}")]
    Scan(#[source] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorStatus {
    Started,
    Stopped,
}

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub scanned: usize,
    /// Not executed: no payload, not yet available, or claimed elsewhere.
    pub skipped: usize,
    pub completed: usize,
    /// Failed attempts that were put back for a later tick.
    pub failed: usize,
    pub dead_lettered: usize,
}

impl TickReport {
    fn record(&mut self, outcome: JobOutcome) {
        match outcome {
            JobOutcome::Skipped => self.skipped += 1,
            JobOutcome::Completed => self.completed += 1,
            JobOutcome::Failed => self.failed += 1,
            JobOutcome::DeadLettered => self.dead_lettered += 1,
        }
    }

    pub fn executed(&self) -> usize {
        self.completed + self.failed + self.dead_lettered
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobOutcome {
    Skipped,
    Completed,
    Failed,
    DeadLettered,
}

/// Polls the store for due jobs and runs them one after another.
pub struct QueueProcessor<S: JobStore> {
    store: Arc<S>,
    runner: JobRunner,
    options: ProcessorOptions,
    codec: PayloadCodec,
}

impl<S: JobStore> QueueProcessor<S> {
    pub fn new(store: Arc<S>, runner: JobRunner, options: ProcessorOptions) -> Self {
        Self {
            store,
            runner,
            options,
            codec: PayloadCodec::new(),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn options(&self) -> &ProcessorOptions {
        &self.options
    }

    /// Spawns the polling loop on the current runtime and returns right away.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime. Use [`QueueProcessor::start_on`] to pick
    /// the runtime explicitly.
    pub fn start(self) -> ProcessorHandle {
        self.start_on(&Handle::current())
    }

    /// Spawns the polling loop on `runtime` and returns right away.
    pub fn start_on(self, runtime: &Handle) -> ProcessorHandle {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let queue = self.options.queue.clone();

        let task = runtime.spawn(async move { self.run(token).await });

        info!(
            queue = queue.as_deref().unwrap_or("*"),
            "Job processing has started"
        );

        ProcessorHandle { cancel, task }
    }

    /// Ticks until `cancel` fires. A tick that fails as a whole is logged and the loop
    /// carries on after the usual pause.
    pub async fn run(&self, cancel: CancellationToken) {
        loop {
            if cancel.is_cancelled() {
                break;
            }

            match self.tick().await {
                Ok(report) if report.scanned > 0 => debug!(?report, "Tick finished"),
                Ok(_) => {}
                Err(e) => error!(error = %e, "Error processing jobs"),
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.options.poll_interval) => {}
            }
        }

        info!("Job processing stopped");
    }

    /// One pass over the store. Individual job failures are logged and counted; only a failed
    /// scan is returned as an error.
    pub async fn tick(&self) -> Result<TickReport, ProcessorError> {
        let filter = JobFilter {
            queue: self.options.queue.clone(),
        };
        let jobs = self
            .store
            .query(&filter)
            .await
            .map_err(ProcessorError::Scan)?;

        let mut report = TickReport {
            scanned: jobs.len(),
            ..TickReport::default()
        };

        for job in jobs {
            let outcome = self.process_job(job).await;
            report.record(outcome);
        }

        Ok(report)
    }

    async fn process_job(&self, job: JobRecord) -> JobOutcome {
        let now = Utc::now();

        if !job.has_payload() {
            return JobOutcome::Skipped;
        }
        if !job.is_available(now.timestamp()) {
            return JobOutcome::Skipped;
        }

        let handle = match self
            .store
            .claim(job.id, now, self.options.claim_lease_chrono())
            .await
        {
            Ok(Some(handle)) => handle,
            Ok(None) => {
                debug!(job_id = %job.id, "Job no longer claimable, skipping");
                return JobOutcome::Skipped;
            }
            Err(e) => {
                error!(job_id = %job.id, error = %e, "Failed to update job attempts");
                return JobOutcome::Skipped;
            }
        };

        let attempts = handle.retries();
        debug!(job_id = %job.id, attempts, state = ?JobState::InFlight, "Claimed job");

        let payload = match self.codec.decode(&handle.payload()) {
            Ok(payload) => payload,
            Err(e) => {
                error!(job_id = %job.id, job_type = %job.job_type, error = %e, "Malformed job payload");
                let state = decide(
                    self.options.retry_policy,
                    false,
                    attempts,
                    self.options.default_max_tries,
                );
                return self.settle(handle, state, &job.job_type).await;
            }
        };

        info!(job_id = %job.id, job = %payload.display_name, attempts, "Running job");

        let mut timeout = self.options.timeout_for(payload.time_out);
        if timeout > self.options.claim_lease {
            // A handler must not outlive its claim.
            warn!(
                job_id = %job.id,
                timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                lease_ms = u64::try_from(self.options.claim_lease.as_millis()).unwrap_or(u64::MAX),
                "Job timeout exceeds the claim lease, capping it"
            );
            timeout = self.options.claim_lease;
        }

        let ctx = JobContext {
            job_id: job.id,
            queue: job.queue,
            attempt: attempts,
            max_tries: payload.max_tries,
            timeout,
            payload: payload.clone(),
        };

        let result = self.runner.run(&payload.name, ctx).await;
        if let Err(e) = &result {
            error!(
                job_id = %job.id,
                job = %payload.display_name,
                error = %e,
                state = ?JobState::Failed { attempt: attempts },
                "Job failed"
            );
        }

        let state = decide(
            self.options.retry_policy,
            result.is_ok(),
            attempts,
            payload.max_tries,
        );
        self.settle(handle, state, &payload.display_name).await
    }

    async fn settle(&self, handle: S::Handle, state: JobState, display_name: &str) -> JobOutcome {
        let job_id: Xid = handle.id();

        match state {
            JobState::Completed => match handle.complete().await {
                Ok(()) => {
                    info!(%job_id, job = display_name, "Successfully ran job");
                    JobOutcome::Completed
                }
                Err(e) => {
                    error!(%job_id, job = display_name, error = %e, "Job ran but could not be removed");
                    JobOutcome::Failed
                }
            },
            JobState::DeadLettered => {
                let attempts = handle.retries();
                match handle.dead_queue().await {
                    Ok(()) => {
                        warn!(%job_id, job = display_name, attempts, "Job exhausted its tries, moved to dead-letter");
                        JobOutcome::DeadLettered
                    }
                    Err(e) => {
                        error!(%job_id, job = display_name, error = %e, "Failed to dead-letter job");
                        JobOutcome::Failed
                    }
                }
            }
            JobState::Pending => {
                if let Err(e) = handle.fail().await {
                    error!(%job_id, job = display_name, error = %e, "Failed to release job");
                }
                JobOutcome::Failed
            }
            JobState::InFlight | JobState::Failed { .. } => {
                error!(%job_id, job = display_name, ?state, "Attempt settled in a non-final state, releasing job");
                if let Err(e) = handle.fail().await {
                    error!(%job_id, job = display_name, error = %e, "Failed to release job");
                }
                JobOutcome::Failed
            }
        }
    }
}

/// Returned by [`QueueProcessor::start`]. Dropping it leaves the loop running.
pub struct ProcessorHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ProcessorHandle {
    pub fn status(&self) -> ProcessorStatus {
        if self.task.is_finished() {
            ProcessorStatus::Stopped
        } else {
            ProcessorStatus::Started
        }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stops the loop after the job in progress, if any, and waits for it to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            error!(error = %e, "Job processor task ended abnormally");
        }
    }
}
