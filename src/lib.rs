//! A polling job queue processor.
//!
//! Jobs are persisted as [`JobRecord`]s in a [`JobStore`]. A [`QueueProcessor`] scans the store
//! once per tick, claims each due job (bumping its attempt count), runs it through a
//! [`JobRunner`] and then deletes it on success, puts it back for the next tick on failure, or
//! moves it to the dead-letter list once it has used up its tries.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use job_queue_processor::{
//!     HandlerRegistry, JobContext, JobPayload, JobRunner, MemoryQueue, ProcessorOptions,
//!     QueueProcessor,
//! };
//!
//! async fn send_welcome_email(ctx: JobContext) -> anyhow::Result<()> {
//!     println!("sending welcome email, attempt {}", ctx.attempt);
//!     Ok(())
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MemoryQueue::new());
//! store
//!     .schedule(
//!         "default",
//!         JobPayload::new("send_welcome_email").display_name("Welcome email").max_tries(3),
//!     )
//!     .await?;
//!
//! let runner = JobRunner::new(
//!     HandlerRegistry::new().register("send_welcome_email", send_welcome_email),
//! );
//! let handle = QueueProcessor::new(store, runner, ProcessorOptions::new().queue("default")).start();
//!
//! // ...
//! handle.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod codec;
mod context;
mod job_handle;
mod options;
mod processor;
mod queue;
mod registry;
mod retry;
mod runner;
mod store;
mod types;

pub use codec::PayloadCodec;
pub use context::JobContext;
pub use job_handle::MemoryJobHandle;
pub use options::ProcessorOptions;
pub use processor::{ProcessorError, ProcessorHandle, ProcessorStatus, QueueProcessor, TickReport};
pub use queue::MemoryQueue;
pub use registry::{HandlerRegistry, JobHandler, NamedJob};
pub use retry::{decide, JobState, RetryPolicy};
pub use runner::{JobRunner, RunJobError};
pub use store::{JobStore, StoreError};
pub use types::{timestamp_now, JobFilter, JobPayload, JobRecord, NewJob, DEFAULT_QUEUE};

/// Re-exports to simplify importing this crate's types.
pub mod prelude {
    pub use super::{
        HandlerRegistry, JobContext, JobHandler, JobPayload, JobRecord, JobRunner, JobStore,
        MemoryQueue, NamedJob, ProcessorOptions, QueueProcessor, RetryPolicy,
    };
    pub use aide_de_camp::core::{job_handle::JobHandle, new_xid, queue::QueueError, Bytes, Xid};
}
