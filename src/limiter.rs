use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{self, Poll},
};

use pin_project_lite::pin_project;
use tokio::sync::{Semaphore, TryAcquireError};

use crate::{drain::Outstanding, telemetry::Telemetry, AtCapacity, LimiterState};

/// The capacity used when a limiter is asked for a capacity of zero.
pub const DEFAULT_CAPACITY: usize = 100;

/// Limits the number of concurrently running tasks.
///
/// Concurrency is limited through a fixed pool of tokens. Launching a task takes a token, and the
/// token goes back to the pool when the task finishes (or panics, or is aborted). When the pool is
/// empty, [Limiter::run] waits for a token: the caller's own control flow is the backlog, there is
/// no internal queue.
///
/// Cloning a limiter is cheap and every clone shares the same tokens and counters.
#[derive(Debug, Clone)]
pub struct Limiter {
    inner: Arc<LimiterInner>,
}

#[derive(Debug)]
struct LimiterInner {
    capacity: usize,
    tokens: Semaphore,
    telemetry: Telemetry,
    outstanding: Outstanding,
}

/// Permission for one admitted task to run.
///
/// Dropping the token releases it: the active count is decremented *before* the token goes back
/// to the pool. In the other order a newly admitted task could bump the active count above the
/// capacity (and the peak with it) before the old task's decrement lands.
#[derive(Debug)]
struct Token {
    limiter: Arc<LimiterInner>,
}

impl Limiter {
    /// Create a limiter allowing `capacity` tasks to run at once.
    ///
    /// A capacity of zero falls back to [DEFAULT_CAPACITY].
    pub fn new(capacity: usize) -> Self {
        let capacity = match capacity {
            0 => {
                tracing::debug!(
                    default = DEFAULT_CAPACITY,
                    "capacity of zero requested, using the default"
                );
                DEFAULT_CAPACITY
            }
            c if c > Semaphore::MAX_PERMITS => {
                tracing::warn!(
                    requested = c,
                    max = Semaphore::MAX_PERMITS,
                    "capacity exceeds the maximum number of tokens, clamping"
                );
                Semaphore::MAX_PERMITS
            }
            c => c,
        };
        tracing::debug!(capacity, "created limiter");

        Self {
            inner: Arc::new(LimiterInner {
                capacity,
                tokens: Semaphore::new(capacity),
                telemetry: Telemetry::default(),
                outstanding: Outstanding::default(),
            }),
        }
    }

    /// Run `task` on the tokio runtime once a token is available.
    ///
    /// Waits while `capacity` tasks are already running. Resolves as soon as the task has been
    /// admitted and spawned, not when it finishes; use [Limiter::wait] for that.
    pub async fn run<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = self.acquire().await;
        tokio::spawn(Admitted {
            task,
            token: Some(token),
        });
    }

    /// Run a blocking closure on tokio's blocking thread pool once a token is available.
    ///
    /// Admission behaves exactly like [Limiter::run].
    pub async fn run_blocking<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let token = self.acquire().await;
        tokio::task::spawn_blocking(move || {
            // Dropped on return or unwind.
            let _token = token;
            task()
        });
    }

    /// Run `task` on the tokio runtime if a token is available right now.
    ///
    /// Returns the task back inside [AtCapacity] otherwise, leaving the counters untouched.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime.
    pub fn try_run<F>(&self, task: F) -> Result<(), AtCapacity<F>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match self.inner.tokens.try_acquire() {
            Ok(permit) => permit.forget(),
            Err(TryAcquireError::NoPermits) => {
                tracing::trace!(capacity = self.inner.capacity, "rejected task at capacity");
                return Err(AtCapacity::new(task, self.inner.capacity));
            }
            Err(TryAcquireError::Closed) => unreachable!("the token pool is never closed"),
        }

        let token = Token::admit(&self.inner);
        tokio::spawn(Admitted {
            task,
            token: Some(token),
        });
        Ok(())
    }

    /// Wait until every task launched so far has finished.
    ///
    /// Tasks launched while waiting may or may not be covered. The limiter stays usable
    /// afterwards.
    pub async fn wait(&self) {
        self.inner.outstanding.wait().await
    }

    /// The maximum number of tasks allowed to run at once.
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// The number of tasks admitted since the limiter was created.
    pub fn dispatched(&self) -> usize {
        self.inner.telemetry.dispatched()
    }

    /// The number of tasks currently running.
    pub fn active(&self) -> usize {
        self.inner.telemetry.active()
    }

    /// The highest number of tasks that have run at the same time.
    pub fn peak_active(&self) -> usize {
        self.inner.telemetry.peak_active()
    }

    /// A consistent snapshot of all the counters.
    pub fn state(&self) -> LimiterState {
        self.inner.telemetry.snapshot(self.inner.capacity)
    }

    async fn acquire(&self) -> Token {
        match self.inner.tokens.acquire().await {
            // The token is handed back explicitly by `Token::drop`, after the active count has
            // been decremented.
            Ok(permit) => permit.forget(),
            Err(_) => unreachable!("the token pool is never closed"),
        }
        Token::admit(&self.inner)
    }
}

impl Default for Limiter {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Token {
    /// Bookkeeping for a task that has just taken a token from the pool.
    fn admit(limiter: &Arc<LimiterInner>) -> Self {
        let active = limiter.telemetry.admit();
        limiter.outstanding.add();
        tracing::trace!(active, capacity = limiter.capacity, "admitted task");
        Self {
            limiter: limiter.clone(),
        }
    }
}

impl Drop for Token {
    fn drop(&mut self) {
        let active = self.limiter.telemetry.release();
        self.limiter.tokens.add_permits(1);
        self.limiter.outstanding.done();
        tracing::trace!(active, "released task");
    }
}

pin_project! {
    /// A spawned task together with the token it was admitted with.
    ///
    /// The token is released as soon as the task completes. If the task panics or is aborted, the
    /// runtime drops this future and the token with it.
    struct Admitted<F> {
        #[pin]
        task: F,
        token: Option<Token>,
    }
}

impl<F> Future for Admitted<F>
where
    F: Future<Output = ()>,
{
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut task::Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        task::ready!(this.task.poll(cx));
        drop(this.token.take());
        Poll::Ready(())
    }
}
