//! # Core Runtime Module
//!
//! Foundational infrastructure shared by the protocol client and the queues:
//! - Logging and tracing set-up with credential redaction
//! - Client configuration with fail-fast validation
//! - Event bus carrying queue, session and command events

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
