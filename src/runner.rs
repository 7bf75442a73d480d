use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use thiserror::Error;
use tracing::debug;

use crate::{context::JobContext, registry::HandlerRegistry, types::timestamp_now};

#[derive(Error, Debug)]
pub enum RunJobError {
    #[error("No handler registered for job '{0}'")]
    UnknownHandler(String),
    #[error("Handler returned an error: {0:#}")]
    Handler(anyhow::Error),
    #[error("Handler panicked")]
    Panicked,
    #[error("Handler task was aborted")]
    Aborted,
    #[error("Handler did not finish within {0:?}")]
    TimedOut(Duration),
    #[error("Job deadline {0} has already passed")]
    DeadlineExpired(i64),
}

/// Resolves a job name and runs its handler under a timeout.
///
/// The runner neither retries nor touches the store; every failure is handed back to the
/// caller to decide what the attempt means.
#[derive(Clone, Debug)]
pub struct JobRunner {
    registry: Arc<HandlerRegistry>,
}

impl JobRunner {
    pub fn new(registry: HandlerRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub async fn run(&self, name: &str, ctx: JobContext) -> Result<(), RunJobError> {
        let handler = self
            .registry
            .resolve(name)
            .ok_or_else(|| RunJobError::UnknownHandler(name.to_string()))?;

        let timeout = effective_timeout(&ctx, timestamp_now())?;
        let job_id = ctx.job_id;

        let start = Instant::now();
        let mut task = tokio::spawn(async move { handler.handle(ctx).await });

        let result = match tokio::time::timeout(timeout, &mut task).await {
            Ok(Ok(result)) => result.map_err(RunJobError::Handler),
            Ok(Err(e)) if e.is_panic() => Err(RunJobError::Panicked),
            Ok(Err(_)) => Err(RunJobError::Aborted),
            Err(_) => {
                task.abort();
                Err(RunJobError::TimedOut(timeout))
            }
        };

        debug!(
            %job_id,
            name,
            duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            ok = result.is_ok(),
            "Handler returned"
        );

        result
    }
}

/// The context's timeout, shortened to the payload's absolute deadline when there is one.
fn effective_timeout(ctx: &JobContext, now: i64) -> Result<Duration, RunJobError> {
    match ctx.payload.time_out_at {
        Some(deadline) if deadline <= now => Err(RunJobError::DeadlineExpired(deadline)),
        Some(deadline) => {
            let remaining = Duration::from_secs((deadline - now) as u64);
            Ok(ctx.timeout.min(remaining))
        }
        None => Ok(ctx.timeout),
    }
}
