//! Queue configuration.

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Tunables for the queue subsystem.
///
/// Deserializable so hosts can load it from a config file; every field has
/// a default, so `{}` is a valid config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Connection resolved when a job names none.
    pub default_connection: String,

    /// Maximum jobs claimed per worker run.
    pub batch_size: usize,

    /// Claim lock duration in seconds. Must exceed the longest expected job
    /// runtime, or slow jobs get re-claimed mid-run.
    pub lock_seconds: i64,

    /// Cleanup retention: terminal records older than this are deleted.
    pub delete_after_secs: i64,

    /// Base polling interval for the built-in scheduler trigger.
    pub poll_interval_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            default_connection: "memory".to_string(),
            batch_size: 100,
            lock_seconds: 600,
            delete_after_secs: 7 * 24 * 60 * 60,
            poll_interval_secs: 60,
        }
    }
}

impl QueueConfig {
    pub fn lock_duration(&self) -> Duration {
        Duration::seconds(self.lock_seconds)
    }

    pub fn retention(&self) -> Duration {
        Duration::seconds(self.delete_after_secs)
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.poll_interval_secs)
    }
}
