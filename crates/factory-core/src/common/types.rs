//! # Protocol Payload Types
//!
//! The typed payloads carried by each message purpose. Every field is a
//! 32-bit unsigned integer on the wire; see [`crate::protocol`] for the
//! record layout.
//!
//! Worker IDs are 1-based: an order served by `N` workers produces reports
//! for IDs `1..=N`.

use core::fmt;
use core::time::Duration;

/// Identifier of a worker within a single order, starting at 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(pub u32);

impl WorkerId {
    /// Zero-based slot for this worker in a table sized for `worker_count`
    /// workers, or `None` if the ID is out of range.
    pub const fn index(self, worker_count: u32) -> Option<usize> {
        if self.0 == 0 || self.0 > worker_count {
            None
        } else {
            Some((self.0 - 1) as usize)
        }
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An order for `total_units` units, sent once by the procurement client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkOrder {
    pub total_units: u32,
}

/// The server's acceptance of an order and the number of completion reports
/// the client should expect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrderConfirmation {
    pub worker_count: u32,
}

/// Emitted by a worker after each claim-and-process cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProductionReport {
    pub worker_id: WorkerId,
    pub capacity: u32,
    pub units_made: u32,
    pub duration_ms: u32,
}

impl ProductionReport {
    pub const fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms as u64)
    }
}

/// Emitted exactly once per worker, after it observes an exhausted pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompletionReport {
    pub worker_id: WorkerId,
}
