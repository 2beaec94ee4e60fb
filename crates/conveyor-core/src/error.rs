use thiserror::Error;

use crate::ports::RecordId;

/// Error raised inside a job's `run` entry point.
///
/// Kept separate from [`QueueError`] on purpose: job failures are contained
/// by the worker and recorded on the queue record, while `QueueError` values
/// surface synchronously to the caller.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct JobError(String);

impl JobError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Error)]
pub enum QueueError {
    /// A connection name was requested that was never registered.
    #[error("unknown queue connection '{0}'")]
    UnknownConnection(String),

    /// The job payload could not be reduced to a durable form. The job was
    /// never enqueued.
    #[error("job payload could not be serialized: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Two job types were registered under the same name.
    #[error("duplicate job registration for '{0}'")]
    DuplicateJob(String),

    /// A payload referenced a job name with no registered type.
    #[error("no job registered for '{0}'")]
    UnknownJob(String),

    /// An operation referenced a record that does not exist.
    #[error("unknown queue record {0}")]
    UnknownRecord(RecordId),

    /// A synchronously dispatched job failed on the caller's task.
    #[error("job failed: {0}")]
    Job(#[from] JobError),
}
