use std::fmt;

/// Returned by [Limiter::try_run](crate::Limiter::try_run) when every token is in use.
///
/// The rejected task is handed back untouched.
#[derive(thiserror::Error)]
#[error("limiter is at capacity: {capacity} tasks already running")]
pub struct AtCapacity<F> {
    task: F,
    capacity: usize,
}

impl<F> AtCapacity<F> {
    pub(crate) fn new(task: F, capacity: usize) -> Self {
        Self { task, capacity }
    }

    /// The capacity of the limiter that rejected the task.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Take back the rejected task.
    pub fn into_inner(self) -> F {
        self.task
    }
}

impl<F> fmt::Debug for AtCapacity<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AtCapacity")
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}
