//! Time-related operations.
//!
//! `sleep` and `timeout` integrate with Tokio's timer wheel; `Instant` is
//! monotonic and suitable for pacing measurements.
//!
//! # Examples
//!
//! ```rust
//! use core_async::time::{timeout, sleep, Duration};
//!
//! async fn example() {
//!     let slow = sleep(Duration::from_millis(50));
//!     assert!(timeout(Duration::from_millis(5), slow).await.is_err());
//! }
//! ```

pub use tokio::time::{error::Elapsed, interval, sleep, sleep_until, timeout, Interval, Sleep, Timeout};

pub use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
