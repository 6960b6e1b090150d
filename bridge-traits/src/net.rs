//! Datagram Transport Abstraction
//!
//! The protocol client exchanges one request datagram for one reply datagram.
//! Hosts provide the socket; the core only sees [`DatagramTransport`].

use async_trait::async_trait;
use bytes::Bytes;
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{BridgeError, Result};

/// Largest datagram the remote service accepts or sends.
pub const MAX_DATAGRAM_SIZE: usize = 1400;

/// Reply wait used when a request does not set its own.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(20);

/// Outbound datagram plus how long to wait for the answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatagramRequest {
    pub payload: Bytes,
    pub timeout: Duration,
}

impl DatagramRequest {
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
            timeout: DEFAULT_REPLY_TIMEOUT,
        }
    }

    /// Builds a request from protocol text.
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(Bytes::from(text.into()))
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Reply datagram received for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatagramReply {
    pub payload: Bytes,
    pub elapsed: Duration,
}

impl DatagramReply {
    pub fn new(payload: impl Into<Bytes>, elapsed: Duration) -> Self {
        Self {
            payload: payload.into(),
            elapsed,
        }
    }

    /// Decodes the reply as UTF-8 text.
    pub fn text(&self) -> Result<String> {
        String::from_utf8(self.payload.to_vec())
            .map_err(|e| BridgeError::OperationFailed(format!("Invalid UTF-8 in reply: {}", e)))
    }
}

/// Request/reply datagram channel to the remote service.
///
/// Implementations must:
/// - reject payloads larger than [`max_datagram_size`](Self::max_datagram_size)
///   with [`BridgeError::PayloadTooLarge`]
/// - return [`BridgeError::Timeout`] when no reply arrives in time
/// - never retry on their own; retry policy belongs to the caller
///
/// # Example
///
/// ```ignore
/// use bridge_traits::net::{DatagramRequest, DatagramTransport};
///
/// async fn ping(transport: &dyn DatagramTransport) -> Result<String> {
///     let reply = transport.exchange(DatagramRequest::text("PING")).await?;
///     reply.text()
/// }
/// ```
#[async_trait]
pub trait DatagramTransport: Send + Sync {
    /// Sends one datagram and waits for the next reply.
    async fn exchange(&self, request: DatagramRequest) -> Result<DatagramReply>;

    /// Largest payload this transport will send.
    fn max_datagram_size(&self) -> usize {
        MAX_DATAGRAM_SIZE
    }

    /// Local address the transport is bound to, when known.
    fn local_addr(&self) -> Option<SocketAddr> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datagram_request_builder() {
        let request = DatagramRequest::text("LOGOUT s=abc").timeout(Duration::from_secs(2));

        assert_eq!(request.payload, Bytes::from_static(b"LOGOUT s=abc"));
        assert_eq!(request.timeout, Duration::from_secs(2));
        assert_eq!(request.len(), 12);
        assert!(!request.is_empty());
    }

    #[test]
    fn test_default_timeout() {
        let request = DatagramRequest::text("PING");
        assert_eq!(request.timeout, DEFAULT_REPLY_TIMEOUT);
    }

    #[test]
    fn test_reply_text_rejects_invalid_utf8() {
        let reply = DatagramReply::new(vec![0xff, 0xfe], Duration::ZERO);
        assert!(matches!(reply.text(), Err(BridgeError::OperationFailed(_))));

        let reply = DatagramReply::new("300 PONG", Duration::from_millis(12));
        assert_eq!(reply.text().unwrap(), "300 PONG");
    }
}
