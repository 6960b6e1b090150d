//! Error types for the AniDB UDP provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// AniDB protocol errors
///
/// Outcomes are classified by [`crate::Outcome`]; this enum is the `Result`
/// view of them plus construction and transport faults.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The server banned this client (`555`, or `504` during login)
    #[error("Banned by server{}", ban_suffix(.reason))]
    ProtocolBan { reason: Option<String> },

    /// Credentials rejected or client not accepted
    #[error("Authentication failed: {0}")]
    AuthenticationFailure(String),

    /// The server does not know the command (`598`)
    #[error("Unsupported command: {0}")]
    UnsupportedCommand(String),

    /// The requested file, anime, episode or list entry does not exist
    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    /// Timeout, socket failure or a server-side error worth retrying
    #[error("Transient network failure: {0}")]
    TransientNetworkFailure(String),

    /// A reply that does not start with a three digit status code
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Command parameters rejected before anything was queued
    #[error("Invalid command: {0}")]
    InvalidCommand(String),
}

impl ProtocolError {
    /// Whether retrying the same command later can succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProtocolError::TransientNetworkFailure(_) | ProtocolError::MalformedResponse(_)
        )
    }
}

impl From<BridgeError> for ProtocolError {
    fn from(error: BridgeError) -> Self {
        ProtocolError::TransientNetworkFailure(error.to_string())
    }
}

fn ban_suffix(reason: &Option<String>) -> String {
    reason
        .as_deref()
        .map(|r| format!(": {}", r))
        .unwrap_or_default()
}

/// Result type for AniDB operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_error_display() {
        let error = ProtocolError::ProtocolBan {
            reason: Some("client flooding".to_string()),
        };
        assert_eq!(error.to_string(), "Banned by server: client flooding");

        let error = ProtocolError::ProtocolBan { reason: None };
        assert_eq!(error.to_string(), "Banned by server");
    }

    #[test]
    fn test_bridge_error_is_transient() {
        let error: ProtocolError = BridgeError::Timeout(Duration::from_secs(20)).into();

        assert!(matches!(error, ProtocolError::TransientNetworkFailure(_)));
        assert!(error.is_transient());
        assert!(!ProtocolError::InvalidCommand("fid=0".to_string()).is_transient());
    }
}
