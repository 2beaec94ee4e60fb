//! In-memory queue provider.
//!
//! The bundled backend: useful on its own for tests and single-process
//! deployments, and the reference semantics for any durable backend. All
//! record state lives in one map behind a mutex; claims re-check
//! eligibility while holding the lock, which is what gives racing `pop`
//! calls at-most-one winner per record.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use tokio::sync::Mutex;

use super::{ClaimedJob, JobStatus, PushJob, QueueCounts, QueueProvider, QueueRecord};
use crate::error::QueueError;
use crate::ports::{Clock, IdGenerator, RecordId, SystemClock, UlidGenerator};

/// Default claim lock: comfortably longer than any job is expected to run.
pub const DEFAULT_LOCK_SECONDS: i64 = 600;

struct MemoryState {
    /// All records (single source of truth).
    records: HashMap<RecordId, QueueRecord>,
}

impl MemoryState {
    /// Eligible record ids on `queue`, oldest `scheduled_at` first.
    fn eligible_ids(&self, queue: Option<&str>, now: chrono::DateTime<chrono::Utc>) -> Vec<RecordId> {
        let mut eligible: Vec<&QueueRecord> = self
            .records
            .values()
            .filter(|r| queue.is_none_or(|q| r.queue == q))
            .filter(|r| r.eligible(now))
            .collect();
        // FIFO within eligibility; id breaks scheduled_at ties (ULIDs sort
        // by creation time).
        eligible.sort_by(|a, b| a.scheduled_at.cmp(&b.scheduled_at).then(a.id.cmp(&b.id)));
        eligible.iter().map(|r| r.id).collect()
    }
}

pub struct MemoryProvider {
    state: Arc<Mutex<MemoryState>>,
    clock: Arc<dyn Clock>,
    ids: UlidGenerator,
    lock_duration: Duration,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Build with an explicit clock (tests pin eligibility and lock expiry
    /// through it).
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState { records: HashMap::new() })),
            ids: UlidGenerator::new(Arc::clone(&clock)),
            clock,
            lock_duration: Duration::seconds(DEFAULT_LOCK_SECONDS),
        }
    }

    pub fn with_lock_duration(mut self, lock_duration: Duration) -> Self {
        self.lock_duration = lock_duration;
        self
    }
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueueProvider for MemoryProvider {
    async fn push(&self, job: PushJob) -> Result<RecordId, QueueError> {
        let now = self.clock.now();
        let id = self.ids.record_id();
        let record = QueueRecord::new(id, job.job, job.payload, job.queue, now + job.delay, now);

        let mut state = self.state.lock().await;
        state.records.insert(id, record);
        Ok(id)
    }

    async fn pop(&self, queue: Option<&str>, count: usize) -> Result<Vec<ClaimedJob>, QueueError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;

        let candidates = state.eligible_ids(queue, now);
        let mut claimed = Vec::new();
        for id in candidates {
            if claimed.len() == count {
                break;
            }
            // Conditional transition under the state lock. A record another
            // claimer got to first simply fails the check.
            if let Some(record) = state.records.get_mut(&id)
                && record.try_claim(now, self.lock_duration)
            {
                claimed.push(ClaimedJob {
                    id: record.id,
                    job: record.job.clone(),
                    payload: record.payload.clone(),
                    queue: record.queue.clone(),
                    attempts: record.attempts,
                });
            }
        }
        Ok(claimed)
    }

    async fn in_queue(
        &self,
        job: &str,
        payload: &serde_json::Value,
        queue: Option<&str>,
    ) -> Result<bool, QueueError> {
        let state = self.state.lock().await;
        Ok(state.records.values().any(|r| {
            !r.status.is_terminal()
                && r.job == job
                && r.payload == *payload
                && queue.is_none_or(|q| r.queue == q)
        }))
    }

    async fn pending_count(&self, queue: Option<&str>) -> Result<usize, QueueError> {
        let state = self.state.lock().await;
        Ok(state
            .records
            .values()
            .filter(|r| r.status == JobStatus::Pending && queue.is_none_or(|q| r.queue == q))
            .count())
    }

    async fn complete(&self, id: RecordId) -> Result<(), QueueError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        let record = state.records.get_mut(&id).ok_or(QueueError::UnknownRecord(id))?;
        record.mark_completed(now);
        Ok(())
    }

    async fn fail(&self, id: RecordId, error: String) -> Result<(), QueueError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        let record = state.records.get_mut(&id).ok_or(QueueError::UnknownRecord(id))?;
        record.mark_failed(now, error);
        Ok(())
    }

    async fn retry(&self, id: RecordId) -> Result<bool, QueueError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        let record = state.records.get_mut(&id).ok_or(QueueError::UnknownRecord(id))?;
        Ok(record.reset_for_retry(now))
    }

    async fn delete(&self, id: RecordId) -> Result<bool, QueueError> {
        let mut state = self.state.lock().await;
        let removable = state
            .records
            .get(&id)
            .is_some_and(|r| r.status == JobStatus::Pending);
        if removable {
            state.records.remove(&id);
        }
        Ok(removable)
    }

    async fn cleanup(&self, retention: Duration) -> Result<usize, QueueError> {
        let now = self.clock.now();
        let cutoff = now - retention;
        let mut state = self.state.lock().await;

        let before = state.records.len();
        state
            .records
            .retain(|_, r| !(r.status.is_terminal() && r.created_at < cutoff && !r.is_locked(now)));
        Ok(before - state.records.len())
    }

    async fn record(&self, id: RecordId) -> Result<Option<QueueRecord>, QueueError> {
        let state = self.state.lock().await;
        Ok(state.records.get(&id).cloned())
    }

    async fn counts(&self, queue: Option<&str>) -> Result<QueueCounts, QueueError> {
        let state = self.state.lock().await;
        let mut counts = QueueCounts::default();
        for record in state.records.values() {
            if queue.is_some_and(|q| record.queue != q) {
                continue;
            }
            match record.status {
                JobStatus::Pending => counts.pending += 1,
                JobStatus::Running => counts.running += 1,
                JobStatus::Failed => counts.failed += 1,
                JobStatus::Completed => counts.completed += 1,
            }
        }
        Ok(counts)
    }
}
