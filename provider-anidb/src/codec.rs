//! Reply decoding and the status codes shared by every command.
//!
//! A reply datagram looks like
//!
//! ```text
//! 220 FILE
//! 312498|4688|69260|4243
//! ```
//!
//! The first three characters are the status code; the rest of the first line
//! is a human readable message (or, for `AUTH`, the session key followed by
//! the message) and every following line is data.

use crate::error::{ProtocolError, Result};
use crate::outcome::Outcome;

pub const LOGIN_ACCEPTED: u16 = 200;
pub const LOGIN_ACCEPTED_NEW_VERSION: u16 = 201;
pub const LOGGED_OUT: u16 = 203;
pub const NOT_LOGGED_IN: u16 = 403;
pub const LOGIN_FAILED: u16 = 500;
pub const LOGIN_FIRST: u16 = 501;
pub const ACCESS_DENIED: u16 = 502;
pub const CLIENT_VERSION_OUTDATED: u16 = 503;
pub const CLIENT_BANNED: u16 = 504;
pub const INVALID_SESSION: u16 = 506;
pub const BANNED: u16 = 555;
pub const UNKNOWN_COMMAND: u16 = 598;

/// Decoded reply datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub code: u16,
    /// Everything after the code and its separating space
    pub body: String,
}

impl Reply {
    /// Text on the status line after the code.
    pub fn message(&self) -> &str {
        message(&self.body)
    }
}

/// Status line text of a reply body.
pub fn message(body: &str) -> &str {
    body.lines().next().unwrap_or("").trim()
}

/// Data lines of a reply body (everything after the status line).
pub fn data_lines(body: &str) -> impl Iterator<Item = &str> {
    body.lines().skip(1).map(str::trim).filter(|line| !line.is_empty())
}

/// First data line split on `|`.
pub fn first_record(body: &str) -> Option<Vec<&str>> {
    data_lines(body).next().map(|line| line.split('|').collect())
}

/// Splits a raw reply into status code and body.
///
/// # Errors
///
/// [`ProtocolError::MalformedResponse`] when the text does not start with
/// three ASCII digits.
pub fn decode_reply(text: &str) -> Result<Reply> {
    let text = text.trim_end_matches(['\r', '\n', '\0']);
    let digits = text.get(..3).filter(|d| d.bytes().all(|b| b.is_ascii_digit()));
    let Some(digits) = digits else {
        return Err(ProtocolError::MalformedResponse(format!(
            "missing status code in {:?}",
            text.chars().take(32).collect::<String>()
        )));
    };

    let code = digits
        .parse::<u16>()
        .map_err(|e| ProtocolError::MalformedResponse(e.to_string()))?;
    let rest = &text[3..];
    let body = rest.strip_prefix(' ').unwrap_or(rest);

    Ok(Reply {
        code,
        body: body.to_string(),
    })
}

/// Codes every command must honour before its own parsing runs.
pub fn short_circuit(code: u16, body: &str) -> Option<Outcome> {
    match code {
        BANNED => Some(Outcome::Banned {
            reason: ban_reason(body),
        }),
        UNKNOWN_COMMAND => Some(Outcome::UnknownCommand),
        _ => None,
    }
}

/// Classification for codes a command does not handle itself.
pub fn fallback(code: u16, body: &str) -> Outcome {
    match code {
        LOGIN_FIRST | INVALID_SESSION => Outcome::LoginRequired,
        ACCESS_DENIED => Outcome::LoginFailed,
        600..=699 => Outcome::transient(format!("server error {}: {}", code, message(body))),
        _ => Outcome::transient(format!("unexpected reply {}: {}", code, message(body))),
    }
}

/// Reason text of a `555 BANNED` reply, if the server sent one.
pub fn ban_reason(body: &str) -> Option<String> {
    data_lines(body).next().map(str::to_string)
}

/// Appends the session key to rendered command text.
///
/// Commands that already carry parameters get `&s=KEY`, bare keywords get
/// ` s=KEY`.
pub fn append_session(text: &str, token: &str) -> String {
    let text = text.trim();
    if text.contains(' ') {
        format!("{}&s={}", text, token)
    } else {
        format!("{} s={}", text, token)
    }
}

/// Escapes a parameter value for the wire.
pub fn encode_value(value: &str) -> String {
    value.replace('&', "&amp;").replace('\n', "<br />")
}
