use std::time::Duration;
use thiserror::Error;

/// Failures reported by host bridge implementations.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("No reply within {0:?}")]
    Timeout(Duration),

    #[error("Datagram of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Whether the failure came from the network path (and may succeed later).
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Io(_) | Self::OperationFailed(_))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
