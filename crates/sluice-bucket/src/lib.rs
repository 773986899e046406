//! Lazily evaluated token bucket for bandwidth limiting.
//!
//! The bucket has no background timer. Every request carries the current
//! instant, and the bucket derives how many fill intervals have elapsed since
//! it was created, credits the new tokens, debits the request and reports how
//! long the caller has to wait for the balance to become non-negative.
//!
//! # Key Features
//!
//! - **Reactive**: O(1) per request, state fully determined by the last tick
//! - **Debt-based**: a request larger than the balance is granted immediately
//!   and paid back by future ticks; the returned wait is advisory
//! - **Tick-stable**: a request landing within 5% of a tick boundary counts the
//!   tick as complete, so timer jitter does not shift results
//! - **Shareable**: state lives behind one lock that is never held while waiting
//!
//! # Example
//!
//! ```
//! use std::time::{Duration, Instant};
//! use sluice_bucket::TokenBucket;
//!
//! let start = Instant::now();
//! let bucket = TokenBucket::new(1.0, 1000, start).unwrap();
//!
//! assert_eq!(bucket.take(start, 1), Duration::from_secs(1));
//! assert_eq!(bucket.take(start + Duration::from_secs(2), 1), Duration::ZERO);
//! ```

pub use self::bucket::{TokenBucket, check_limit};
pub use self::clock::{Clock, SystemClock};
pub use self::error::{LimitError, Result};

mod bucket;
mod clock;
mod error;
