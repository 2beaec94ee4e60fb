//! Ports: seams between the queue subsystem and its environment.
//!
//! Each trait hides one external concern (time and ID generation here, the
//! record store behind [`crate::queue::QueueProvider`]) so the core logic
//! stays testable without a real backend.

mod clock;
mod ids;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::ids::{IdGenerator, RecordId, UlidGenerator};
