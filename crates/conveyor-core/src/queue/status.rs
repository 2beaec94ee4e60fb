//! Record status machine.

use serde::{Deserialize, Serialize};

/// Status of a queue record.
///
/// Transitions:
/// - Pending -> Running -> Completed
/// - Pending -> Running -> Failed
/// - Running -> Running (stale-lock reclaim, attempts += 1)
/// - Failed -> Pending (explicit operator retry only)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting to become eligible and be claimed.
    Pending,

    /// Claimed by a worker; `lock_until` bounds the claim.
    Running,

    /// Execution raised an error. Kept for inspection, never re-claimed.
    Failed,

    /// Execution finished cleanly.
    Completed,
}

impl JobStatus {
    /// Terminal statuses are only ever removed by cleanup or reset by an
    /// operator retry.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Failed | JobStatus::Completed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Failed => "failed",
            JobStatus::Completed => "completed",
        };
        f.write_str(s)
    }
}
