//! Async runtime facade for the anisync workspace.
//!
//! Every other crate reaches Tokio through this one so that the runtime
//! surface they rely on stays small and explicit:
//!
//! - `task`: spawning and join handles
//! - `time`: sleeping, timeouts, durations
//! - `sync`: locks, channels, notifications and cancellation tokens
//! - `net`: the UDP socket used by the desktop transport
//! - `runtime`: building and driving a runtime from synchronous code
//!
//! # Examples
//!
//! ```rust
//! use core_async::sync::CancellationToken;
//! use core_async::task;
//!
//! async fn example() {
//!     let token = CancellationToken::new();
//!     let child = token.child_token();
//!
//!     let handle = task::spawn(async move { child.cancelled().await });
//!
//!     token.cancel();
//!     handle.await.ok();
//! }
//! ```

// Re-export the async entry-point/test macros so downstream crates never need
// direct Tokio dependencies.
pub use core_async_macros::{main, test};

pub mod net;
pub mod runtime;
pub mod sync;
pub mod task;
pub mod time;

pub use task::spawn;
pub use time::{sleep, Duration, Instant};

/// Waits on multiple concurrent branches, returning when the first completes.
///
/// Re-exported so callers can write `core_async::select!` without naming Tokio.
pub use tokio::select;
