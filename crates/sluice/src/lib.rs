//! Bandwidth-limited readers backed by token buckets.
//!
//! Every read is charged against two [`TokenBucket`]s: one owned by the
//! stream and one shared by all streams drawing from the same allowance. The
//! read happens first; the reader then waits for the longer of the two
//! debts before handing the bytes back.
//!
//! # Architecture
//!
//! - [`ThrottledReader`] / [`AsyncThrottledReader`] - `Read` and `AsyncRead` wrappers
//! - [`BandwidthConfig`] - TOML-loadable local and shared limits
//! - [`Limiter`] - hands out readers and applies reloaded limits to live buckets
//!
//! # Example
//!
//! ```
//! use std::io::Read;
//! use sluice::{BandwidthConfig, Limiter};
//!
//! let config = BandwidthConfig::from_toml_str(
//!     r#"
//!     [local]
//!     rate = 1e6
//!     capacity = 65536
//!
//!     [shared]
//!     rate = 4e6
//!     capacity = 262144
//!     "#,
//! )
//! .unwrap();
//!
//! let limiter = Limiter::new(&config).unwrap();
//! let mut reader = limiter.wrap(&b"hello"[..]).unwrap();
//!
//! let mut out = String::new();
//! reader.read_to_string(&mut out).unwrap();
//! assert_eq!(out, "hello");
//! ```

pub use self::async_reader::AsyncThrottledReader;
pub use self::clock::TokioClock;
pub use self::config::{BandwidthConfig, LimitSpec};
pub use self::error::{ConfigError, Result};
pub use self::limiter::Limiter;
pub use self::reader::ThrottledReader;
pub use self::sleep::{Sleeper, ThreadSleeper};

pub use sluice_bucket::{Clock, LimitError, SystemClock, TokenBucket};

mod async_reader;
mod clock;
mod config;
mod error;
mod limiter;
mod reader;
mod sleep;
