//! Record ID generation.
//!
//! IDs are ULIDs: sortable by creation time and generated without
//! coordination, which matters when several worker processes share one
//! record store. The generator takes its timestamp from the [`Clock`] port
//! so tests get deterministic time prefixes.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::ports::Clock;

/// Opaque identifier of one queue record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(Ulid);

impl RecordId {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rec-{}", self.0)
    }
}

pub trait IdGenerator: Send + Sync {
    fn record_id(&self) -> RecordId;
}

/// ULID generator seeded from a clock.
pub struct UlidGenerator {
    clock: Arc<dyn Clock>,
}

impl UlidGenerator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

impl IdGenerator for UlidGenerator {
    fn record_id(&self) -> RecordId {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        RecordId(Ulid::from_parts(timestamp_ms, rand::random()))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::ports::{FixedClock, SystemClock};

    #[test]
    fn generated_ids_are_unique() {
        let ids = UlidGenerator::new(Arc::new(SystemClock));

        let a = ids.record_id();
        let b = ids.record_id();
        assert_ne!(a, b);
    }

    #[test]
    fn fixed_clock_pins_the_timestamp_part() {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let ids = UlidGenerator::new(Arc::new(FixedClock::new(at)));

        let id = ids.record_id();
        assert_eq!(id.as_ulid().timestamp_ms(), at.timestamp_millis() as u64);
    }

    #[test]
    fn display_carries_a_prefix() {
        let ids = UlidGenerator::new(Arc::new(SystemClock));
        assert!(ids.record_id().to_string().starts_with("rec-"));
    }
}
