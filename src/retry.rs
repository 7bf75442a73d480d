/// Where a job record stands.
///
/// ```text
/// Pending -> InFlight -> Completed
///                     -> Failed(attempt) -> Pending
///                                        -> DeadLettered
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    InFlight,
    Completed,
    Failed { attempt: u32 },
    DeadLettered,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::DeadLettered)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryPolicy {
    /// Dead-letter once `attempts` reaches the payload's `max_tries`. A `max_tries` of 0 never
    /// dead-letters.
    #[default]
    MaxTries,
    /// Failed jobs go back to the queue forever, one tick apart.
    Unbounded,
}

impl RetryPolicy {
    /// Settles a `Failed` attempt into the state the record moves to next.
    pub fn after_failure(self, attempts: u32, max_tries: u32) -> JobState {
        match self {
            RetryPolicy::MaxTries if max_tries > 0 && attempts >= max_tries => {
                JobState::DeadLettered
            }
            _ => JobState::Pending,
        }
    }
}

/// The state an attempt lands in, given how the run went.
pub fn decide(policy: RetryPolicy, succeeded: bool, attempts: u32, max_tries: u32) -> JobState {
    if succeeded {
        JobState::Completed
    } else {
        policy.after_failure(attempts, max_tries)
    }
}
