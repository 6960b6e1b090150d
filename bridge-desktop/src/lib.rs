//! # Desktop Bridge Implementations
//!
//! Bridge implementations for desktop and server hosts (macOS, Windows,
//! Linux):
//! - `DatagramTransport` using a Tokio `UdpSocket`
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::UdpSocketTransport;
//! use std::sync::Arc;
//!
//! #[core_async::main]
//! async fn main() -> anyhow::Result<()> {
//!     let transport = UdpSocketTransport::connect("api.anidb.net", 9000, 9001).await?;
//!     let transport: Arc<dyn bridge_traits::DatagramTransport> = Arc::new(transport);
//!     // Hand the transport to the core configuration
//!     Ok(())
//! }
//! ```

mod udp;

pub use udp::UdpSocketTransport;
