#![allow(dead_code)]

use std::{
    future::Future,
    io,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use job_queue_processor::{
    prelude::*, JobFilter, MemoryJobHandle, NewJob, PayloadCodec, StoreError,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Buffer that collects formatted log lines written by [`capture_warnings`].
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Routes WARN and ERROR events on this thread into the returned buffer until the guard drops.
pub fn capture_warnings() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::WARN)
        .finish();
    (logs, tracing::subscriber::set_default(subscriber))
}

pub fn encode(payload: &JobPayload) -> Bytes {
    PayloadCodec::new().encode(payload).expect("payload encodes")
}

/// A record pushed straight into the store, bypassing the scheduling helpers.
pub fn raw_job(payload: &JobPayload) -> NewJob {
    NewJob::new("default", payload.name.clone(), encode(payload))
}

/// Names of the handlers that ran, in order.
#[derive(Clone, Default)]
pub struct Calls(Arc<Mutex<Vec<String>>>);

impl Calls {
    pub fn push(&self, name: &str) {
        self.0.lock().unwrap().push(name.to_string());
    }

    pub fn names(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.0.lock().unwrap().iter().filter(|n| *n == name).count()
    }
}

/// Registry with `ok`, `fail` and `slow` handlers that all record their calls.
pub fn registry(calls: &Calls) -> HandlerRegistry {
    let ok_calls = calls.clone();
    let fail_calls = calls.clone();
    let slow_calls = calls.clone();

    HandlerRegistry::new()
        .register("ok", move |ctx: JobContext| {
            let calls = ok_calls.clone();
            async move {
                calls.push(&ctx.payload.display_name);
                anyhow::Ok(())
            }
        })
        .register("fail", move |ctx: JobContext| {
            let calls = fail_calls.clone();
            async move {
                calls.push(&ctx.payload.display_name);
                Err::<(), _>(anyhow::anyhow!("{} always fails", ctx.payload.display_name))
            }
        })
        .register("slow", move |ctx: JobContext| {
            let calls = slow_calls.clone();
            async move {
                calls.push(&ctx.payload.display_name);
                tokio::time::sleep(Duration::from_millis(50)).await;
                anyhow::Ok(())
            }
        })
}

pub fn processor<S: JobStore>(
    store: Arc<S>,
    calls: &Calls,
    options: ProcessorOptions,
) -> QueueProcessor<S> {
    QueueProcessor::new(store, JobRunner::new(registry(calls)), options)
}

pub async fn wait_until<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition().await {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition was not met in time");
}

/// Wraps a [`MemoryQueue`] and fails scans or claims on demand.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryQueue,
    pub fail_query: AtomicBool,
    pub fail_claim: AtomicBool,
    pub queries: AtomicUsize,
}

#[async_trait]
impl JobStore for FlakyStore {
    type Handle = MemoryJobHandle;

    async fn push(&self, job: NewJob) -> Result<Xid, StoreError> {
        self.inner.push(job).await
    }

    async fn query(&self, filter: &JobFilter) -> Result<Vec<JobRecord>, StoreError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.fail_query.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".to_string()));
        }
        self.inner.query(filter).await
    }

    async fn claim(
        &self,
        id: Xid,
        now: DateTime<Utc>,
        lease: chrono::Duration,
    ) -> Result<Option<Self::Handle>, StoreError> {
        if self.fail_claim.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("write timed out".to_string()));
        }
        self.inner.claim(id, now, lease).await
    }

    async fn find(&self, id: Xid) -> Result<Option<JobRecord>, StoreError> {
        self.inner.find(id).await
    }
}
