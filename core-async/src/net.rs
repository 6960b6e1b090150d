//! Networking primitives.
//!
//! Only datagram sockets are exposed; the protocol client speaks UDP and never
//! opens streams.

pub use tokio::net::{lookup_host, ToSocketAddrs, UdpSocket};
