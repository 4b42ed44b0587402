//! Bounded concurrency limits for fanning out tokio tasks.
//!
//! A [Limiter] holds a fixed pool of tokens. Every task launched through it takes one token for
//! as long as it runs, so submitting more work than the capacity makes the submitter wait instead
//! of overwhelming whatever the tasks talk to. The limiter keeps count of how many tasks it has
//! dispatched, how many are running and the peak concurrency it has seen, and can wait for
//! everything it launched to finish.
//!
//! ```no_run
//! # async fn fetch(_: u32) {}
//! # async fn demo() {
//! let limiter = capped::Limiter::new(8);
//! for id in 0..1000 {
//!     limiter.run(fetch(id)).await;
//! }
//! limiter.wait().await;
//! assert_eq!(limiter.dispatched(), 1000);
//! assert!(limiter.peak_active() <= 8);
//! # }
//! ```

mod drain;
mod error;
mod limiter;
mod telemetry;

pub use error::AtCapacity;
pub use limiter::{Limiter, DEFAULT_CAPACITY};
pub use telemetry::LimiterState;
