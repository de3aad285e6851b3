#[cfg(feature = "parking-lot")]
pub use parking_lot::{Mutex, MutexGuard};
#[cfg(not(feature = "parking-lot"))]
pub use std::sync::{Mutex, MutexGuard};

/// Acquires `mutex`, mapping poisoning to [`crate::Error::LockPoisoned`].
///
/// With `parking-lot` enabled locks never poison and this is infallible.
#[inline]
pub fn lock<T>(mutex: &Mutex<T>) -> crate::Result<MutexGuard<'_, T>> {
    #[cfg(feature = "parking-lot")]
    {
        Ok(mutex.lock())
    }
    #[cfg(not(feature = "parking-lot"))]
    {
        Ok(mutex.lock()?)
    }
}
