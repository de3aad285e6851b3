//! Per-worker bookkeeping for one order.
//!
//! The [`ProductionLedger`] is owned by the coordinator's receive loop and is
//! never shared, so it needs no locking. It is sized once from the worker
//! count in the order confirmation and indexed by [`WorkerId::index`].
//!
//! Every report either updates the ledger or is returned as an
//! [`Inconsistency`]. Inconsistencies are counted and logged but never end
//! the run; only a completion from a new, in-range worker moves the run
//! towards termination.

use core::fmt;
use core::time::Duration;
use factory_core::{CompletionReport, ProductionReport, WorkerId};

/// Largest worker count a confirmation may announce.
pub const MAX_WORKERS: u32 = 65_536;

/// What one worker produced for the current order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub iterations: u32,
    pub units: u64,
}

/// A report that does not fit what the ledger has already seen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Inconsistency {
    #[error("Factory {worker_id} is not one of the {worker_count} confirmed factories")]
    UnknownWorker {
        worker_id: WorkerId,
        worker_count: u32,
    },
    #[error("Factory {worker_id} reported production after completing")]
    ProductionAfterCompletion { worker_id: WorkerId },
    #[error("Factory {worker_id} completed more than once")]
    DuplicateCompletion { worker_id: WorkerId },
}

/// Running totals for one order.
#[derive(Debug)]
pub struct ProductionLedger {
    order_size: u32,
    stats: Vec<WorkerStats>,
    completed: Vec<bool>,
    active: u32,
    inconsistencies: Vec<Inconsistency>,
}

impl ProductionLedger {
    /// Creates a ledger expecting one completion from each of
    /// `worker_count` workers.
    ///
    /// Callers must bound `worker_count` by [`MAX_WORKERS`].
    pub fn new(order_size: u32, worker_count: u32) -> Self {
        let slots = worker_count as usize;
        Self {
            order_size,
            stats: vec![WorkerStats::default(); slots],
            completed: vec![false; slots],
            active: worker_count,
            inconsistencies: Vec::new(),
        }
    }

    /// Workers that have not completed yet.
    pub const fn active(&self) -> u32 {
        self.active
    }

    pub const fn is_finished(&self) -> bool {
        self.active == 0
    }

    /// Counts one production cycle.
    ///
    /// Production from an unknown or already completed worker is not counted.
    pub fn record_production(
        &mut self,
        report: &ProductionReport,
    ) -> Result<&WorkerStats, Inconsistency> {
        let slot = self.slot(report.worker_id)?;
        if self.completed[slot] {
            return Err(self.flag(Inconsistency::ProductionAfterCompletion {
                worker_id: report.worker_id,
            }));
        }

        let stats = &mut self.stats[slot];
        stats.iterations += 1;
        stats.units += u64::from(report.units_made);
        Ok(&*stats)
    }

    /// Marks a worker as done and returns how many are still active.
    pub fn record_completion(&mut self, report: &CompletionReport) -> Result<u32, Inconsistency> {
        let slot = self.slot(report.worker_id)?;
        if self.completed[slot] {
            return Err(self.flag(Inconsistency::DuplicateCompletion {
                worker_id: report.worker_id,
            }));
        }

        self.completed[slot] = true;
        self.active -= 1;
        Ok(self.active)
    }

    /// Freezes the ledger into the final report.
    pub fn finish(self, elapsed: Duration) -> AggregateSummary {
        let total_units = self.stats.iter().map(|s| s.units).sum();
        AggregateSummary {
            order_size: self.order_size,
            per_worker: self.stats,
            total_units,
            elapsed,
            inconsistencies: self.inconsistencies,
        }
    }

    fn slot(&mut self, worker_id: WorkerId) -> Result<usize, Inconsistency> {
        let worker_count = self.stats.len() as u32;
        worker_id.index(worker_count).ok_or_else(|| {
            self.flag(Inconsistency::UnknownWorker {
                worker_id,
                worker_count,
            })
        })
    }

    fn flag(&mut self, inconsistency: Inconsistency) -> Inconsistency {
        self.inconsistencies.push(inconsistency);
        inconsistency
    }
}

/// The outcome of a completed order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AggregateSummary {
    pub order_size: u32,
    /// Stats for worker `i + 1` at index `i`.
    pub per_worker: Vec<WorkerStats>,
    pub total_units: u64,
    /// From sending the order to receiving the last completion.
    pub elapsed: Duration,
    pub inconsistencies: Vec<Inconsistency>,
}

impl AggregateSummary {
    /// Whether the factory made exactly what was ordered.
    pub fn is_fulfilled(&self) -> bool {
        self.total_units == u64::from(self.order_size)
    }

    pub fn worker(&self, worker_id: WorkerId) -> Option<&WorkerStats> {
        worker_id
            .index(self.per_worker.len() as u32)
            .map(|i| &self.per_worker[i])
    }
}

impl fmt::Display for AggregateSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "****** PROCUREMENT Summary Report ******")?;
        for (i, stats) in self.per_worker.iter().enumerate() {
            writeln!(
                f,
                "Factory #{:>3} made a total of {:>5} parts in {:>3} iterations",
                i + 1,
                stats.units,
                stats.iterations
            )?;
        }
        writeln!(f, "==============================")?;
        writeln!(
            f,
            "Grand total parts made = {:>5} vs order size of {:>5}",
            self.total_units, self.order_size
        )?;
        if !self.inconsistencies.is_empty() {
            writeln!(
                f,
                "Inconsistent reports ignored = {}",
                self.inconsistencies.len()
            )?;
        }
        write!(
            f,
            "Order-to-Completion time = {:.1} mSec",
            self.elapsed.as_secs_f64() * 1000.0
        )
    }
}
