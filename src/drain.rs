use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Notify;

/// Counts launched tasks that have not finished yet, and lets callers wait for that count to
/// reach zero.
#[derive(Debug, Default)]
pub(crate) struct Outstanding {
    count: AtomicUsize,
    drained: Notify,
}

impl Outstanding {
    /// Must be called before the task is launched, so a concurrent [Outstanding::wait] cannot
    /// miss it.
    pub(crate) fn add(&self) {
        self.count.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn done(&self) {
        let prev = self.count.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "more tasks finished than were launched");
        if prev == 1 {
            self.drained.notify_waiters();
        }
    }

    pub(crate) fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    pub(crate) async fn wait(&self) {
        loop {
            let drained = self.drained.notified();
            tokio::pin!(drained);
            // Register before checking, otherwise a `notify_waiters` between the check and the
            // await would be lost.
            drained.as_mut().enable();

            if self.count() == 0 {
                return;
            }
            drained.await;
        }
    }
}
