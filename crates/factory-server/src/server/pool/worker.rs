use crate::server::telemetry::{
    decrement_active_workers, increment_active_workers, increment_units_produced,
};
use core::time::Duration;
use factory_core::{
    Claim, CompletionReport, Error, Message, ProductionReport, Result, WorkPool, WorkerId,
};
use portable_atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Parameters one worker runs with for the duration of an order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkerProfile {
    pub worker_id: WorkerId,
    /// Most units the worker claims per cycle. A worker with capacity 0
    /// completes without producing.
    pub capacity: u32,
    /// Simulated processing time per cycle.
    pub duration: Duration,
}

impl WorkerProfile {
    pub const fn duration_ms(&self) -> u32 {
        let ms = self.duration.as_millis();
        if ms > u32::MAX as u128 {
            u32::MAX
        } else {
            ms as u32
        }
    }
}

/// What a worker accomplished, returned through its join handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkerOutcome {
    pub worker_id: WorkerId,
    pub iterations: u32,
    pub units_made: u64,
}

/// Counts a worker as active for as long as it is alive.
///
/// The count and the `active_workers` gauge are released on drop, so a
/// worker aborted mid-sleep is still accounted for.
pub struct ActiveWorker {
    active: Arc<AtomicUsize>,
}

impl ActiveWorker {
    pub fn enter(active: Arc<AtomicUsize>) -> Self {
        active.fetch_add(1, Ordering::AcqRel);
        increment_active_workers();
        Self { active }
    }
}

impl Drop for ActiveWorker {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
        decrement_active_workers();
    }
}

/// Worker task that drains `pool` until it is exhausted.
///
/// Each cycle claims up to `profile.capacity` units, sleeps for
/// `profile.duration`, then sends one [`Message::Production`] on `reports`.
/// Once a claim comes back [`Claim::Exhausted`] the worker sends exactly one
/// [`Message::Completion`] and returns. It never claims again after that.
///
/// The pool lock is only held inside [`WorkPool::claim`]; the sleep runs
/// without it so workers process their batches in parallel.
///
/// The worker counts itself in `active` until it returns or is aborted.
///
/// # Errors
///
/// - [`Error::LockPoisoned`] if the pool lock was poisoned.
/// - [`Error::ChannelError`] if the relay hung up, which only happens when the
///   order is being torn down.
#[tracing::instrument(skip_all, fields(worker = profile.worker_id.0))]
pub async fn worker_loop(
    profile: WorkerProfile,
    pool: Arc<WorkPool>,
    reports: mpsc::Sender<Message>,
    active: Arc<AtomicUsize>,
) -> Result<WorkerOutcome> {
    let WorkerProfile {
        worker_id,
        capacity,
        duration,
    } = profile;

    let _active = ActiveWorker::enter(active);
    let mut outcome = WorkerOutcome {
        worker_id,
        iterations: 0,
        units_made: 0,
    };

    while let Claim::Granted { units } = pool.claim(capacity)? {
        tracing::info!(
            "Factory {worker_id}: Going to make {units:>5} parts in {:>4} mSec",
            profile.duration_ms()
        );
        tokio::time::sleep(duration).await;

        outcome.iterations += 1;
        outcome.units_made += u64::from(units);
        increment_units_produced(u64::from(units));

        let report = Message::Production(ProductionReport {
            worker_id,
            capacity,
            units_made: units,
            duration_ms: profile.duration_ms(),
        });
        send(&reports, report, worker_id).await?;
    }

    send(
        &reports,
        Message::Completion(CompletionReport { worker_id }),
        worker_id,
    )
    .await?;

    tracing::info!(
        ">>> Factory {worker_id}: Terminating after making total of {} parts in {} iterations",
        outcome.units_made,
        outcome.iterations
    );
    Ok(outcome)
}

async fn send(reports: &mpsc::Sender<Message>, message: Message, worker_id: WorkerId) -> Result<()> {
    reports
        .send(message)
        .await
        .map_err(|_| Error::ChannelError {
            context: format!("Worker {worker_id} report channel closed"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(id: u32, capacity: u32) -> WorkerProfile {
        WorkerProfile {
            worker_id: WorkerId(id),
            capacity,
            duration: Duration::from_millis(1),
        }
    }

    fn idle() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    async fn collect(mut rx: mpsc::Receiver<Message>) -> Vec<Message> {
        let mut messages = Vec::new();
        while let Some(message) = rx.recv().await {
            messages.push(message);
        }
        messages
    }

    #[tokio::test]
    async fn reports_each_cycle_then_completes() {
        let pool = Arc::new(WorkPool::with_total(120));
        let (tx, rx) = mpsc::channel(16);

        let outcome = worker_loop(profile(3, 50), pool, tx, idle()).await.unwrap();
        let messages = collect(rx).await;

        assert_eq!(
            outcome,
            WorkerOutcome {
                worker_id: WorkerId(3),
                iterations: 3,
                units_made: 120
            }
        );
        let made: Vec<u32> = messages
            .iter()
            .filter_map(|m| match m {
                Message::Production(r) => {
                    assert_eq!(r.worker_id, WorkerId(3));
                    assert_eq!(r.capacity, 50);
                    assert_eq!(r.duration_ms, 1);
                    Some(r.units_made)
                }
                _ => None,
            })
            .collect();
        assert_eq!(made, vec![50, 50, 20]);
        assert_eq!(
            messages.last(),
            Some(&Message::Completion(CompletionReport {
                worker_id: WorkerId(3)
            }))
        );
    }

    #[tokio::test]
    async fn empty_pool_only_completes() {
        let pool = Arc::new(WorkPool::with_total(0));
        let (tx, rx) = mpsc::channel(4);

        let outcome = worker_loop(profile(1, 10), pool, tx, idle()).await.unwrap();

        assert_eq!(outcome.iterations, 0);
        assert_eq!(outcome.units_made, 0);
        assert_eq!(
            collect(rx).await,
            vec![Message::Completion(CompletionReport {
                worker_id: WorkerId(1)
            })]
        );
    }

    #[tokio::test]
    async fn closed_relay_is_a_channel_error() {
        let pool = Arc::new(WorkPool::with_total(10));
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let err = worker_loop(profile(2, 5), pool, tx, idle()).await.unwrap_err();
        assert!(matches!(err, Error::ChannelError { .. }));
    }

    #[tokio::test]
    async fn zero_capacity_completes_without_producing() {
        let pool = Arc::new(WorkPool::with_total(10));
        let (tx, rx) = mpsc::channel(4);

        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            worker_loop(profile(4, 0), Arc::clone(&pool), tx, idle()),
        )
        .await
        .expect("a zero-capacity worker must stop")
        .unwrap();

        assert_eq!(outcome.iterations, 0);
        assert_eq!(
            collect(rx).await,
            vec![Message::Completion(CompletionReport {
                worker_id: WorkerId(4)
            })]
        );
        assert_eq!(pool.claim(100).unwrap(), Claim::Granted { units: 10 });
    }

    #[tokio::test]
    async fn active_count_is_released_when_aborted_mid_sleep() {
        let pool = Arc::new(WorkPool::with_total(10));
        let (tx, _rx) = mpsc::channel(4);
        let active = idle();
        let slow = WorkerProfile {
            worker_id: WorkerId(1),
            capacity: 1,
            duration: Duration::from_secs(60),
        };

        let handle = tokio::spawn(worker_loop(slow, pool, tx, Arc::clone(&active)));
        while active.load(Ordering::Acquire) == 0 {
            tokio::task::yield_now().await;
        }

        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());
        assert_eq!(active.load(Ordering::Acquire), 0);
    }

    #[tokio::test]
    async fn active_count_is_released_on_return() {
        let active = idle();
        let (tx, _rx) = mpsc::channel(4);
        worker_loop(profile(1, 5), Arc::new(WorkPool::with_total(5)), tx, Arc::clone(&active))
            .await
            .unwrap();
        assert_eq!(active.load(Ordering::Acquire), 0);
    }

    #[test]
    fn duration_ms_saturates() {
        let mut p = profile(1, 1);
        p.duration = Duration::from_secs(u64::MAX / 1000);
        assert_eq!(p.duration_ms(), u32::MAX);
    }
}
