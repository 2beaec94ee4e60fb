//! Queue provider contract and the bundled in-memory backend.

mod memory;
mod record;
mod status;

pub use memory::MemoryProvider;
pub use record::{LogEntry, QueueRecord};
pub use status::JobStatus;

use async_trait::async_trait;
use chrono::Duration;

use crate::error::QueueError;
use crate::ports::RecordId;

/// A job ready to be persisted. Serialization already happened at the
/// dispatcher, so a `PushJob` is always storable.
#[derive(Debug, Clone)]
pub struct PushJob {
    /// Registered job type name.
    pub job: String,
    pub payload: serde_json::Value,
    pub queue: String,
    /// Time to hold the record back before it becomes eligible.
    pub delay: Duration,
}

/// A record claimed by `pop`: the snapshot a worker needs to execute it.
#[derive(Debug, Clone)]
pub struct ClaimedJob {
    pub id: RecordId,
    pub job: String,
    pub payload: serde_json::Value,
    pub queue: String,
    pub attempts: u32,
}

/// Per-status record counts, for inspection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueCounts {
    pub pending: usize,
    pub running: usize,
    pub failed: usize,
    pub completed: usize,
}

/// Storage backend for one named connection.
///
/// Design intent:
/// - The provider owns every record transition; workers and operators only
///   name the transition they want (`pop`, `complete`, `fail`, ...).
/// - `pop` must claim atomically per record: concurrent calls racing on the
///   same eligible record see exactly one winner. That is the one place
///   compare-and-swap semantics are required; everything else is sequential.
#[async_trait]
pub trait QueueProvider: Send + Sync {
    /// Persist a Pending record, `scheduled_at = now + delay`.
    async fn push(&self, job: PushJob) -> Result<RecordId, QueueError>;

    /// Claim up to `count` eligible records on `queue` (all queues when
    /// `None`), oldest `scheduled_at` first. Eligible means Pending and due,
    /// or Running with an expired lock (stale-lock recovery). Each claim
    /// transitions the record to Running, sets the lock, and increments
    /// `attempts`.
    async fn pop(&self, queue: Option<&str>, count: usize) -> Result<Vec<ClaimedJob>, QueueError>;

    /// Is an identical job (same name and payload) already waiting or
    /// running? Used to avoid scheduling duplicates.
    async fn in_queue(
        &self,
        job: &str,
        payload: &serde_json::Value,
        queue: Option<&str>,
    ) -> Result<bool, QueueError>;

    /// Number of Pending records. The scheduler uses this to decide whether
    /// to re-arm after a run.
    async fn pending_count(&self, queue: Option<&str>) -> Result<usize, QueueError>;

    /// Terminal success transition: status Completed, lock cleared.
    async fn complete(&self, id: RecordId) -> Result<(), QueueError>;

    /// Terminal failure transition: status Failed, lock cleared, error
    /// captured on the record.
    async fn fail(&self, id: RecordId, error: String) -> Result<(), QueueError>;

    /// Operator retry: reset a Failed record to Pending. Returns whether the
    /// record was actually reset.
    async fn retry(&self, id: RecordId) -> Result<bool, QueueError>;

    /// Remove a Pending record before it is claimed, the only cancellation
    /// point. Returns whether a record was removed.
    async fn delete(&self, id: RecordId) -> Result<bool, QueueError>;

    /// Remove terminal records older than `retention` that are not locked.
    /// Returns how many were removed.
    async fn cleanup(&self, retention: Duration) -> Result<usize, QueueError>;

    /// Fetch one record for inspection.
    async fn record(&self, id: RecordId) -> Result<Option<QueueRecord>, QueueError>;

    /// Record counts by status, for inspection.
    async fn counts(&self, queue: Option<&str>) -> Result<QueueCounts, QueueError>;
}
