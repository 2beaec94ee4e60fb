//! Job contract: the payload shape a unit of work must satisfy.

mod registry;

pub use registry::{ErasedJob, JobRegistry};

use async_trait::async_trait;
use chrono::Duration;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::JobError;

/// Queue records land here when no queue name is given.
pub const DEFAULT_QUEUE: &str = "default";

/// A unit of work.
///
/// Jobs are plain data plus an async entry point. The serde bounds are what
/// let a job cross a process boundary: the dispatcher serializes the value
/// into a queue record and a worker, possibly in another process,
/// reconstructs it by `NAME` through the [`JobRegistry`]. Anything holding a
/// non-serializable resource (an open connection, a file handle) simply
/// cannot implement this trait, which is the fail-fast the durable path
/// needs.
///
/// # Example
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct SendWelcomeMail { user_id: u64 }
///
/// #[async_trait]
/// impl Job for SendWelcomeMail {
///     const NAME: &'static str = "mail.send_welcome";
///     const QUEUEABLE: bool = true;
///
///     async fn run(self) -> Result<(), JobError> { ... }
/// }
/// ```
#[async_trait]
pub trait Job: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Stable name identifying this job type in persisted payloads.
    const NAME: &'static str;

    /// Whether `dispatch` routes this job through a queue provider. Jobs
    /// that leave this `false` run inline on the dispatching task.
    const QUEUEABLE: bool = false;

    /// Execution entry point.
    async fn run(self) -> Result<(), JobError>;

    /// Queue name override.
    fn queue(&self) -> &str {
        DEFAULT_QUEUE
    }

    /// Hold-back before the job becomes eligible.
    fn delay(&self) -> Duration {
        Duration::zero()
    }

    /// Named connection override; `None` uses the configured default.
    fn connection(&self) -> Option<&str> {
        None
    }
}
