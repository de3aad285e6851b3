//! Spawning and joining the workers that serve one order.
//!
//! A [`Crew`] is created per order. Every worker runs as its own Tokio task on
//! the multi-threaded runtime and shares the order's [`WorkPool`] through an
//! [`Arc`]. Reports flow to the relay over a single bounded
//! [`mpsc::Sender`], which preserves each worker's own emission order.
//!
//! Results are not written into shared state. Each worker returns its
//! [`WorkerOutcome`] through its own [`JoinHandle`], and [`Crew::join`]
//! collects them in worker order.

use super::worker::{WorkerOutcome, WorkerProfile, worker_loop};
use factory_core::{Error, Message, Result, WorkPool};
use portable_atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::{sync::mpsc, task::JoinHandle};

/// The workers currently serving an order.
pub struct Crew {
    handles: Vec<JoinHandle<Result<WorkerOutcome>>>,
    active: Arc<AtomicUsize>,
}

impl Crew {
    /// Spawns one worker per profile.
    ///
    /// `reports` is moved in and cloned into each worker, so the receiving
    /// end closes exactly when the last worker finishes.
    pub fn spawn(
        profiles: Vec<WorkerProfile>,
        pool: &Arc<WorkPool>,
        reports: mpsc::Sender<Message>,
    ) -> Self {
        let active = Arc::new(AtomicUsize::new(0));
        let handles = profiles
            .into_iter()
            .map(|profile| {
                tracing::debug!(
                    "Starting worker {} with capacity {} and duration {:?}",
                    profile.worker_id,
                    profile.capacity,
                    profile.duration
                );
                tokio::spawn(worker_loop(
                    profile,
                    Arc::clone(pool),
                    reports.clone(),
                    Arc::clone(&active),
                ))
            })
            .collect();

        Self { handles, active }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Workers that have started and not yet finished or been torn down.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Waits for every worker and returns their outcomes ordered by worker.
    ///
    /// # Errors
    ///
    /// Returns the first worker error, or [`Error::ChannelError`] if a worker
    /// task panicked or was aborted.
    pub async fn join(mut self) -> Result<Vec<WorkerOutcome>> {
        let handles = core::mem::take(&mut self.handles);
        let results = futures::future::join_all(handles).await;

        results
            .into_iter()
            .enumerate()
            .map(|(i, joined)| {
                joined.map_err(|e| Error::ChannelError {
                    context: format!("Worker #{} did not finish: {e}", i + 1),
                })?
            })
            .collect()
    }

    /// Aborts every worker that has not finished yet.
    ///
    /// Aborting interrupts a worker mid-sleep; units it already claimed are
    /// not returned to the pool.
    pub fn abort(&self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

impl Drop for Crew {
    fn drop(&mut self) {
        // An order that is torn down early must not leave workers behind.
        self.abort();
    }
}
