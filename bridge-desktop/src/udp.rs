//! Datagram transport over a Tokio UDP socket

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    net::{DatagramReply, DatagramRequest, DatagramTransport, MAX_DATAGRAM_SIZE},
};
use core_async::net::{lookup_host, UdpSocket};
use core_async::sync::Mutex;
use core_async::time::{timeout, Instant};
use std::io::ErrorKind;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use tracing::{debug, warn};

/// UDP transport connected to a single remote endpoint.
///
/// The socket is `connect`ed so datagrams from other peers are dropped by the
/// kernel. Exchanges are serialized internally: a reply is always read by the
/// caller that sent the matching request.
pub struct UdpSocketTransport {
    socket: UdpSocket,
    remote: SocketAddr,
    max_datagram_size: usize,
    exchange_lock: Mutex<()>,
}

impl UdpSocketTransport {
    /// Resolves `host:port`, binds `local_port` on the matching address family
    /// and connects the socket.
    pub async fn connect(host: &str, port: u16, local_port: u16) -> Result<Self> {
        let remote = lookup_host((host, port))
            .await?
            .next()
            .ok_or_else(|| BridgeError::NotAvailable(format!("Cannot resolve {}:{}", host, port)))?;

        let local = if remote.is_ipv4() {
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, local_port))
        } else {
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, local_port))
        };

        Self::connect_addr(local, remote).await
    }

    /// Binds `local` and connects to an already resolved `remote`.
    pub async fn connect_addr(local: SocketAddr, remote: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(local).await?;
        socket.connect(remote).await?;

        debug!(
            local = %socket.local_addr()?,
            remote = %remote,
            "UDP transport connected"
        );

        Ok(Self {
            socket,
            remote,
            max_datagram_size: MAX_DATAGRAM_SIZE,
            exchange_lock: Mutex::new(()),
        })
    }

    /// Overrides the datagram size limit (tests and non-standard servers).
    pub fn with_max_datagram_size(mut self, size: usize) -> Self {
        self.max_datagram_size = size;
        self
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote
    }

    /// Drops replies that arrived after an earlier exchange timed out, so
    /// they are not mistaken for the answer to the next request.
    fn discard_stale_replies(&self, buf: &mut [u8]) {
        loop {
            match self.socket.try_recv(buf) {
                Ok(len) => debug!(bytes = len, "Discarded stale datagram"),
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    warn!(error = %e, "Failed to drain socket");
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl DatagramTransport for UdpSocketTransport {
    async fn exchange(&self, request: DatagramRequest) -> Result<DatagramReply> {
        if request.len() > self.max_datagram_size {
            return Err(BridgeError::PayloadTooLarge {
                size: request.len(),
                limit: self.max_datagram_size,
            });
        }

        let _guard = self.exchange_lock.lock().await;
        let mut buf = vec![0u8; self.max_datagram_size];
        self.discard_stale_replies(&mut buf);

        let started = Instant::now();
        self.socket.send(&request.payload).await?;

        let len = timeout(request.timeout, self.socket.recv(&mut buf))
            .await
            .map_err(|_| BridgeError::Timeout(request.timeout))??;

        buf.truncate(len);
        Ok(DatagramReply::new(buf, started.elapsed()))
    }

    fn max_datagram_size(&self) -> usize {
        self.max_datagram_size
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.local_addr().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_async::time::Duration;

    async fn loopback_pair() -> (UdpSocket, UdpSocketTransport) {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let transport = UdpSocketTransport::connect_addr(
            "127.0.0.1:0".parse().unwrap(),
            server.local_addr().unwrap(),
        )
        .await
        .unwrap();
        (server, transport)
    }

    #[tokio::test]
    async fn test_exchange_round_trip() {
        let (server, transport) = loopback_pair().await;

        let responder = tokio::spawn(async move {
            let mut buf = [0u8; 64];
            let (len, peer) = server.recv_from(&mut buf).await.unwrap();
            assert_eq!(&buf[..len], b"LOGOUT s=abc12");
            server.send_to(b"203 LOGGED OUT", peer).await.unwrap();
        });

        let reply = transport
            .exchange(DatagramRequest::text("LOGOUT s=abc12").timeout(Duration::from_secs(2)))
            .await
            .unwrap();

        assert_eq!(reply.text().unwrap(), "203 LOGGED OUT");
        responder.await.unwrap();
    }

    #[tokio::test]
    async fn test_exchange_times_out() {
        let (_server, transport) = loopback_pair().await;

        let result = transport
            .exchange(DatagramRequest::text("PING").timeout(Duration::from_millis(30)))
            .await;

        assert!(matches!(result, Err(BridgeError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_rejects_oversized_payload() {
        let (_server, transport) = loopback_pair().await;
        let transport = transport.with_max_datagram_size(8);

        let result = transport
            .exchange(DatagramRequest::text("MYLISTADD fid=1&state=2"))
            .await;

        assert!(matches!(
            result,
            Err(BridgeError::PayloadTooLarge { size: 23, limit: 8 })
        ));
    }

    #[tokio::test]
    async fn test_stale_reply_is_discarded() {
        let (server, transport) = loopback_pair().await;
        let client_addr = transport.local_addr().unwrap();

        // A late answer to an earlier request sits in the socket buffer.
        server.send_to(b"220 FILE late", client_addr).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let responder = tokio::spawn(async move {
            let mut buf = [0u8; 64];
            let (_, peer) = server.recv_from(&mut buf).await.unwrap();
            server.send_to(b"230 ANIME fresh", peer).await.unwrap();
        });

        let reply = transport
            .exchange(DatagramRequest::text("ANIME aid=1").timeout(Duration::from_secs(2)))
            .await
            .unwrap();

        assert_eq!(reply.text().unwrap(), "230 ANIME fresh");
        responder.await.unwrap();
    }
}
