//! The shared "remaining units" counter every worker draws from.

mod mutex;


pub(crate) use mutex::{Mutex, lock};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Outcome of a single [`WorkPool::claim`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Claim {
    /// `units` were removed from the pool and now belong to the caller.
    /// Always at least 1.
    Granted { units: u32 },
    /// Nothing could be taken: the pool was empty on entry or the caller
    /// asked for zero units. Workers treat this as terminal.
    Exhausted,
}

impl Claim {
    /// Units granted, with [`Claim::Exhausted`] counting as zero.
    pub const fn units(self) -> u32 {
        match self {
            Self::Granted { units } => units,
            Self::Exhausted => 0,
        }
    }
}

/// A lock-guarded counter of units still to be produced for the current
/// order.
///
/// The counter is never exposed directly. The only operations are
/// [`reset`](Self::reset), called once per accepted order before any worker
/// starts, and [`claim`](Self::claim), which atomically takes up to a
/// worker's capacity. Because every read-modify-write happens under one lock,
/// the sum of all granted claims after a reset equals the reset total
/// exactly, regardless of how many workers race.
///
/// Share it between workers with an [`Arc`](std::sync::Arc); workers never
/// hold a private copy.
///
/// ## Features
/// - `parking-lot`: use [`parking_lot::Mutex`], which cannot poison.
///   Otherwise a worker panicking inside `claim` poisons the pool and
///   subsequent claims fail with [`Error::LockPoisoned`].
///
/// [`Error::LockPoisoned`]: crate::Error::LockPoisoned
#[derive(Debug, Default)]
pub struct WorkPool {
    remaining: Mutex<u64>,
}

impl WorkPool {
    /// Creates an empty pool. Every claim is [`Claim::Exhausted`] until the
    /// first [`reset`](Self::reset).
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a pool preloaded with `total` units.
    pub fn with_total(total: u32) -> Self {
        Self {
            remaining: Mutex::new(u64::from(total)),
        }
    }

    /// Replaces whatever remains with `total` units for a new order.
    ///
    /// # Errors
    /// - Returns an error if the underlying lock has been poisoned.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self)))]
    pub fn reset(&self, total: u32) -> crate::Result<()> {
        let mut remaining = lock(&self.remaining)?;
        *remaining = u64::from(total);
        Ok(())
    }

    /// Atomically takes `min(remaining, capacity)` units.
    ///
    /// The lock is held only for the computation; callers must not hold any
    /// other state across it.
    ///
    /// # Returns
    /// - `Ok(Claim::Granted { units })`: `units` were taken, `units <=
    ///   capacity`
    /// - `Ok(Claim::Exhausted)`: nothing was left, or `capacity` is zero
    ///
    /// # Errors
    /// - Returns an error if the underlying lock has been poisoned.
    ///
    /// # Example
    /// ```
    /// use factory_core::{Claim, WorkPool};
    ///
    /// let pool = WorkPool::with_total(70);
    /// assert_eq!(pool.claim(50).unwrap(), Claim::Granted { units: 50 });
    /// assert_eq!(pool.claim(50).unwrap(), Claim::Granted { units: 20 });
    /// assert_eq!(pool.claim(50).unwrap(), Claim::Exhausted);
    /// ```
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub fn claim(&self, capacity: u32) -> crate::Result<Claim> {
        let mut remaining = lock(&self.remaining)?;

        // `units <= capacity`, so the narrowing cast is lossless.
        let units = (*remaining).min(u64::from(capacity)) as u32;
        if units == 0 {
            return Ok(Claim::Exhausted);
        }

        *remaining -= u64::from(units);
        Ok(Claim::Granted { units })
    }
}
