//! Counting permits for admission control.
//!
//! The connector bounds two resources with [`Limiter`]: the number of
//! concurrent document downloads (one connector-wide limiter) and the number
//! of jobs submitted to any single printer (one limiter embedded in each
//! printer record). Permits are acquired owned so a guard can be held across
//! await points and task boundaries, and are returned when the guard drops.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// A bounded pool of permits with an in-flight gauge.
///
/// `in_flight()` is best-effort: it may momentarily lag acquires and
/// releases observed by other tasks, but it never exceeds the capacity.
/// Fairness between waiters is not guaranteed.
pub struct Limiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    in_flight: Arc<AtomicUsize>,
}

impl Limiter {
    /// Creates a limiter with the given number of permits.
    ///
    /// A capacity of zero admits nothing; every `acquire` waits forever.
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Acquires one permit, waiting until one is free.
    ///
    /// The permit is returned when the guard is dropped.
    pub async fn acquire(&self) -> Permit {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("semaphore closed unexpectedly");

        self.in_flight.fetch_add(1, Ordering::Relaxed);

        Permit {
            _permit: permit,
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    /// Returns the number of permits currently held.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Returns the configured permit count.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl std::fmt::Debug for Limiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Limiter")
            .field("capacity", &self.capacity)
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

/// A held permit. Dropping it returns the permit to the pool.
pub struct Permit {
    _permit: OwnedSemaphorePermit,
    in_flight: Arc<AtomicUsize>,
}

impl Drop for Permit {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}
