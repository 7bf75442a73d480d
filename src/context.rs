use std::time::Duration;

use aide_de_camp::core::Xid;

use crate::types::JobPayload;

/// What a handler gets to see about the attempt it is running.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub job_id: Xid,
    pub queue: String,
    pub payload: JobPayload,
    /// 1-based, already counted in the store.
    pub attempt: u32,
    pub max_tries: u32,
    pub timeout: Duration,
}

impl JobContext {
    pub fn is_last_attempt(&self) -> bool {
        self.max_tries > 0 && self.attempt >= self.max_tries
    }
}
