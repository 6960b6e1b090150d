//! Canonical classification of one command execution.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ProtocolError;

/// Result of executing one [`Command`](crate::Command).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success(Payload),
    NotFound,
    Banned { reason: Option<String> },
    UnknownCommand,
    LoginRequired,
    LoginFailed,
    TransientFailure { reason: String },
}

impl Outcome {
    pub fn transient(reason: impl Into<String>) -> Self {
        Outcome::TransientFailure {
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> OutcomeKind {
        match self {
            Outcome::Success(_) => OutcomeKind::Success,
            Outcome::NotFound => OutcomeKind::NotFound,
            Outcome::Banned { .. } => OutcomeKind::Banned,
            Outcome::UnknownCommand => OutcomeKind::UnknownCommand,
            Outcome::LoginRequired => OutcomeKind::LoginRequired,
            Outcome::LoginFailed => OutcomeKind::LoginFailed,
            Outcome::TransientFailure { .. } => OutcomeKind::TransientFailure,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn payload(&self) -> Option<&Payload> {
        match self {
            Outcome::Success(payload) => Some(payload),
            _ => None,
        }
    }

    /// Converts the outcome into the error taxonomy.
    ///
    /// `LoginRequired` only survives the handler when re-authentication did
    /// not stick, so it is reported as an authentication failure.
    pub fn into_result(self) -> Result<Payload, ProtocolError> {
        match self {
            Outcome::Success(payload) => Ok(payload),
            Outcome::NotFound => Err(ProtocolError::EntityNotFound(
                "no matching entity".to_string(),
            )),
            Outcome::Banned { reason } => Err(ProtocolError::ProtocolBan { reason }),
            Outcome::UnknownCommand => Err(ProtocolError::UnsupportedCommand(
                "rejected by server".to_string(),
            )),
            Outcome::LoginRequired => Err(ProtocolError::AuthenticationFailure(
                "session not accepted".to_string(),
            )),
            Outcome::LoginFailed => Err(ProtocolError::AuthenticationFailure(
                "login rejected".to_string(),
            )),
            Outcome::TransientFailure { reason } => {
                Err(ProtocolError::TransientNetworkFailure(reason))
            }
        }
    }
}

/// Fieldless view of [`Outcome`], used in events and completions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Success,
    NotFound,
    Banned,
    UnknownCommand,
    LoginRequired,
    LoginFailed,
    TransientFailure,
}

impl OutcomeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::Success => "success",
            OutcomeKind::NotFound => "not_found",
            OutcomeKind::Banned => "banned",
            OutcomeKind::UnknownCommand => "unknown_command",
            OutcomeKind::LoginRequired => "login_required",
            OutcomeKind::LoginFailed => "login_failed",
            OutcomeKind::TransientFailure => "transient_failure",
        }
    }

    /// Success, NotFound and UnknownCommand end an entry's life.
    pub fn is_definitive(&self) -> bool {
        matches!(
            self,
            OutcomeKind::Success | OutcomeKind::NotFound | OutcomeKind::UnknownCommand
        )
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Data carried by a successful reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    /// `MYLISTADD` result
    MyListEntry {
        /// List id, when the server returned one
        lid: Option<u64>,
        already_listed: bool,
    },
    File(FileInfo),
    Anime(AnimeInfo),
    Episode(EpisodeInfo),
    /// Accepted with nothing to return
    Ack,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub fid: u64,
    pub aid: u64,
    pub eid: u64,
    /// 0 when the release group is unknown
    pub gid: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimeInfo {
    pub aid: u64,
    /// Air year, e.g. `1998` or `2006-2007`
    pub year: String,
    /// TV Series, OVA, Movie, ...
    pub kind: String,
    pub romaji_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeInfo {
    pub eid: u64,
    pub aid: u64,
    /// Length in minutes
    pub length: u32,
    /// Episode number as shown by the server (`1`, `S2`, `C1`, ...)
    pub number: String,
    pub english_name: String,
    pub romaji_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(Outcome::Success(Payload::Ack).kind(), OutcomeKind::Success);
        assert_eq!(
            Outcome::Banned { reason: None }.kind().as_str(),
            "banned"
        );
        assert_eq!(
            Outcome::transient("timeout").kind(),
            OutcomeKind::TransientFailure
        );
    }

    #[test]
    fn test_definitive_kinds() {
        assert!(OutcomeKind::NotFound.is_definitive());
        assert!(OutcomeKind::UnknownCommand.is_definitive());
        assert!(!OutcomeKind::LoginFailed.is_definitive());
        assert!(!OutcomeKind::TransientFailure.is_definitive());
    }

    #[test]
    fn test_into_result() {
        let ok = Outcome::Success(Payload::MyListEntry {
            lid: Some(7),
            already_listed: false,
        })
        .into_result();
        assert!(matches!(ok, Ok(Payload::MyListEntry { lid: Some(7), .. })));

        assert!(matches!(
            Outcome::NotFound.into_result(),
            Err(ProtocolError::EntityNotFound(_))
        ));
        assert!(matches!(
            Outcome::Banned {
                reason: Some("spam".to_string())
            }
            .into_result(),
            Err(ProtocolError::ProtocolBan { reason: Some(_) })
        ));
        assert!(matches!(
            Outcome::UnknownCommand.into_result(),
            Err(ProtocolError::UnsupportedCommand(_))
        ));
        assert!(matches!(
            Outcome::transient("reset").into_result(),
            Err(ProtocolError::TransientNetworkFailure(r)) if r == "reset"
        ));
    }
}
