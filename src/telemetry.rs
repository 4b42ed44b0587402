use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// The correlated counters of a [Limiter](crate::Limiter).
///
/// `peak_active` is derived from `active`, so all three live behind one lock rather than as
/// independent atomics.
#[derive(Debug, Default)]
pub(crate) struct Telemetry {
    counters: RwLock<Counters>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    dispatched: usize,
    active: usize,
    peak_active: usize,
}

/// A snapshot of the state of the [Limiter](crate::Limiter).
///
/// All fields are read under a single lock acquisition, so they are consistent with each other:
/// `active <= peak_active <= capacity` always holds for a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimiterState {
    capacity: usize,
    dispatched: usize,
    active: usize,
    peak_active: usize,
}

impl Telemetry {
    /// Record an admission. Returns the new active count.
    pub(crate) fn admit(&self) -> usize {
        let mut counters = self.write();
        counters.active += 1;
        counters.dispatched += 1;
        if counters.peak_active < counters.active {
            counters.peak_active = counters.active;
        }
        counters.active
    }

    /// Record a task leaving the limiter. Returns the new active count.
    pub(crate) fn release(&self) -> usize {
        let mut counters = self.write();
        counters.active = counters.active.saturating_sub(1);
        counters.active
    }

    pub(crate) fn dispatched(&self) -> usize {
        self.read().dispatched
    }

    pub(crate) fn active(&self) -> usize {
        self.read().active
    }

    pub(crate) fn peak_active(&self) -> usize {
        self.read().peak_active
    }

    pub(crate) fn snapshot(&self, capacity: usize) -> LimiterState {
        let counters = *self.read();
        LimiterState {
            capacity,
            dispatched: counters.dispatched,
            active: counters.active,
            peak_active: counters.peak_active,
        }
    }

    // Nothing panics while the lock is held (release runs inside `Drop`, possibly while
    // unwinding), so a poisoned lock still guards valid counters.
    fn read(&self) -> RwLockReadGuard<'_, Counters> {
        self.counters.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Counters> {
        self.counters.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LimiterState {
    /// The fixed concurrency limit.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
    /// The number of tasks admitted since the limiter was created.
    pub fn dispatched(&self) -> usize {
        self.dispatched
    }
    /// The number of tasks running.
    pub fn active(&self) -> usize {
        self.active
    }
    /// The highest number of tasks that have run at the same time.
    pub fn peak_active(&self) -> usize {
        self.peak_active
    }
    /// The number of tasks that could be admitted without waiting.
    pub fn available(&self) -> usize {
        self.capacity - self.active
    }
}
