//! Queue record: the durable representation of one queued job.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::JobStatus;
use crate::ports::RecordId;

/// One lifecycle entry on a record, kept for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub event: String,
    pub at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

/// Durable representation of one queued job.
///
/// Design:
/// - The record is the single source of truth for job state; queue
///   structures elsewhere hold `RecordId` only.
/// - `job` + `payload` are immutable after persistence. Everything that
///   mutates goes through the transition methods below, which keep the
///   status/lock/attempts invariants in one place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueRecord {
    pub id: RecordId,

    /// Registered job type name ([`crate::job::Job::NAME`]).
    pub job: String,

    /// Serialized job arguments.
    pub payload: serde_json::Value,

    /// Queue this record belongs to.
    pub queue: String,

    pub status: JobStatus,

    /// When the record becomes eligible for claiming.
    pub scheduled_at: DateTime<Utc>,

    /// Set while claimed; a lock in the past means the claiming worker died
    /// or stalled and the record may be re-claimed.
    pub lock_until: Option<DateTime<Utc>>,

    /// Number of claims so far. Incremented exactly once per claim.
    pub attempts: u32,

    /// Last captured execution error.
    pub error: Option<String>,

    /// Ordered lifecycle log.
    pub log: Vec<LogEntry>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QueueRecord {
    pub fn new(
        id: RecordId,
        job: impl Into<String>,
        payload: serde_json::Value,
        queue: impl Into<String>,
        scheduled_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        let mut record = Self {
            id,
            job: job.into(),
            payload,
            queue: queue.into(),
            status: JobStatus::Pending,
            scheduled_at,
            lock_until: None,
            attempts: 0,
            error: None,
            log: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        record.push_log("queued", now, None);
        record
    }

    /// Is the record claimable at `now`?
    ///
    /// Pending records become eligible once `scheduled_at` passes. Running
    /// records become eligible again once their lock expires (stale-lock
    /// recovery; may cause duplicate execution, hence at-least-once).
    pub fn eligible(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            JobStatus::Pending => self.scheduled_at <= now,
            JobStatus::Running => self.lock_until.is_some_and(|until| until < now),
            JobStatus::Failed | JobStatus::Completed => false,
        }
    }

    /// Conditional claim: transitions to Running only if the record is still
    /// eligible at `now`. Returns whether the claim succeeded.
    ///
    /// Callers must hold the store's mutation lock across the eligibility
    /// check and the transition; that is what makes racing `pop` calls see
    /// at most one winner per record.
    pub fn try_claim(&mut self, now: DateTime<Utc>, lock_duration: Duration) -> bool {
        if !self.eligible(now) {
            return false;
        }
        self.status = JobStatus::Running;
        self.lock_until = Some(now + lock_duration);
        self.attempts += 1;
        self.push_log("claimed", now, Some(serde_json::json!({ "attempt": self.attempts })));
        true
    }

    pub fn mark_completed(&mut self, now: DateTime<Utc>) {
        self.status = JobStatus::Completed;
        self.lock_until = None;
        self.push_log("completed", now, None);
    }

    pub fn mark_failed(&mut self, now: DateTime<Utc>, error: impl Into<String>) {
        let error = error.into();
        self.status = JobStatus::Failed;
        self.lock_until = None;
        self.push_log("failed", now, Some(serde_json::json!({ "error": error })));
        self.error = Some(error);
    }

    /// Operator retry: put a failed record back in line. Returns false for
    /// records in any other status.
    pub fn reset_for_retry(&mut self, now: DateTime<Utc>) -> bool {
        if self.status != JobStatus::Failed {
            return false;
        }
        self.status = JobStatus::Pending;
        self.scheduled_at = now;
        self.error = None;
        self.push_log("retried", now, None);
        true
    }

    /// Does an unexpired claim lock exist at `now`?
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.lock_until.is_some_and(|until| until >= now)
    }

    fn push_log(&mut self, event: &str, at: DateTime<Utc>, payload: Option<serde_json::Value>) {
        self.log.push(LogEntry { event: event.to_string(), at, payload });
        self.updated_at = at;
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::ports::{IdGenerator, SystemClock, UlidGenerator};
    use std::sync::Arc;

    fn record_at(scheduled_at: DateTime<Utc>, now: DateTime<Utc>) -> QueueRecord {
        let ids = UlidGenerator::new(Arc::new(SystemClock));
        QueueRecord::new(
            ids.record_id(),
            "demo",
            serde_json::json!({ "n": 1 }),
            "default",
            scheduled_at,
            now,
        )
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn future_schedule_is_not_eligible() {
        let record = record_at(t0() + Duration::seconds(60), t0());
        assert!(!record.eligible(t0()));
        assert!(record.eligible(t0() + Duration::seconds(60)));
    }

    #[test]
    fn claim_increments_attempts_and_sets_lock() {
        let mut record = record_at(t0(), t0());
        assert!(record.try_claim(t0(), Duration::seconds(300)));

        assert_eq!(record.status, JobStatus::Running);
        assert_eq!(record.attempts, 1);
        assert_eq!(record.lock_until, Some(t0() + Duration::seconds(300)));
    }

    #[test]
    fn second_claim_loses_while_lock_holds() {
        let mut record = record_at(t0(), t0());
        assert!(record.try_claim(t0(), Duration::seconds(300)));
        assert!(!record.try_claim(t0() + Duration::seconds(10), Duration::seconds(300)));
        assert_eq!(record.attempts, 1);
    }

    #[test]
    fn stale_lock_reclaims_with_fresh_attempt() {
        let mut record = record_at(t0(), t0());
        assert!(record.try_claim(t0(), Duration::seconds(300)));

        let later = t0() + Duration::seconds(301);
        assert!(record.try_claim(later, Duration::seconds(300)));
        assert_eq!(record.attempts, 2);
        assert_eq!(record.lock_until, Some(later + Duration::seconds(300)));
    }

    #[test]
    fn terminal_records_never_reclaim() {
        let mut record = record_at(t0(), t0());
        record.try_claim(t0(), Duration::seconds(300));
        record.mark_failed(t0(), "boom");

        assert!(record.lock_until.is_none());
        assert!(!record.try_claim(t0() + Duration::seconds(3600), Duration::seconds(300)));
        assert_eq!(record.error.as_deref(), Some("boom"));
    }

    #[test]
    fn retry_resets_failed_only() {
        let mut record = record_at(t0(), t0());
        record.try_claim(t0(), Duration::seconds(300));
        record.mark_completed(t0());
        assert!(!record.reset_for_retry(t0()));

        let mut failed = record_at(t0(), t0());
        failed.try_claim(t0(), Duration::seconds(300));
        failed.mark_failed(t0(), "boom");
        assert!(failed.reset_for_retry(t0() + Duration::seconds(5)));
        assert_eq!(failed.status, JobStatus::Pending);
        assert!(failed.error.is_none());
        // attempts are never decremented, even across a retry
        assert_eq!(failed.attempts, 1);
    }

    #[test]
    fn lifecycle_is_logged_in_order() {
        let mut record = record_at(t0(), t0());
        record.try_claim(t0(), Duration::seconds(300));
        record.mark_failed(t0() + Duration::seconds(1), "boom");

        let events: Vec<&str> = record.log.iter().map(|e| e.event.as_str()).collect();
        assert_eq!(events, vec!["queued", "claimed", "failed"]);
    }
}
