//! # Host Bridge Traits
//!
//! Contracts between the protocol core and whatever process hosts it (a
//! headless service, a tray application, a test harness).
//!
//! ## Traits
//!
//! - [`DatagramTransport`](net::DatagramTransport) - one request datagram in,
//!   one reply datagram out, bounded by a timeout
//! - [`Clock`](time::Clock) - time source for pacing and session timestamps
//! - [`LoggerSink`](time::LoggerSink) - forward structured logs to the host
//!
//! ## Implementations
//!
//! | Host    | Crate            |
//! |---------|------------------|
//! | Desktop | `bridge-desktop` |
//! | Tests   | `mockall` mocks and scripted fakes |
//!
//! ## Error Handling
//!
//! Every bridge reports [`BridgeError`](error::BridgeError). The protocol layer
//! treats transient bridge failures as retryable and never lets them escape
//! the queue loop.
//!
//! ## Thread Safety
//!
//! All traits require `Send + Sync`; one transport may be shared by several
//! queues behind a session lock.

pub mod error;
pub mod net;
pub mod time;

pub use error::BridgeError;

pub use net::{DatagramReply, DatagramRequest, DatagramTransport, MAX_DATAGRAM_SIZE};
pub use time::{Clock, LogEntry, LogLevel, LoggerSink, ManualClock, SystemClock};
