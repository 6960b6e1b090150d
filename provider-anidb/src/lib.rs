//! # AniDB UDP Provider
//!
//! Protocol client for the AniDB UDP API.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`Command`]: the closed set of supported operations, each rendering its
//!   own wire text and classifying its own replies
//! - [`codec`]: reply decoding and the status codes every command shares
//! - [`ConnectionHandler`]: session owner with login, re-login on `501`/`506`,
//!   ban latching and one request in flight at a time
//! - [`CommandExecutor`]: the seam queue processors execute through
//!
//! ## Wire format
//!
//! ```text
//! -> MYLISTADD fid=42&state=2&edit=1&s=Xk3Qp
//! <- 311 MYLIST ENTRY EDITED
//! ```

pub mod codec;
pub mod command;
pub mod connection;
pub mod error;
pub mod outcome;
pub mod session;

pub use command::{ActivityKind, Command, FileRef, MyListState};
pub use connection::{CommandExecutor, ConnectionHandler, SessionSnapshot};
pub use error::{ProtocolError, Result};
pub use outcome::{AnimeInfo, EpisodeInfo, FileInfo, Outcome, OutcomeKind, Payload};
