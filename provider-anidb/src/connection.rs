//! Session-owning connection handler.
//!
//! [`ConnectionHandler`] owns one datagram transport and one AniDB session.
//! Every call goes through a single async mutex, so at most one request is
//! in flight per handler and the session key is never used concurrently.

use async_trait::async_trait;
use bridge_traits::net::{DatagramRequest, DatagramTransport};
use bridge_traits::time::{Clock, SystemClock};
use chrono::{DateTime, Utc};
use core_async::sync::{watch, Mutex};
use core_async::time::Duration;
use core_runtime::config::{ClientIdentity, CoreConfig, Credentials};
use core_runtime::events::{CoreEvent, EventBus, SessionEvent};
use core_runtime::logging::redact_wire;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::codec::{self, Reply};
use crate::command::Command;
use crate::error::Result;
use crate::outcome::Outcome;
use crate::session::{self, AuthReply};

/// Executes commands against a session.
///
/// Queue processors only see this trait, so a queue can be bound to its own
/// handler or share one with the other queues.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Executes one command, logging in first when needed.
    async fn execute(&self, command: &Command) -> Outcome;

    /// Watch that flips to `true` when the session gets banned.
    fn ban_watch(&self) -> watch::Receiver<bool>;

    /// Lifts a ban so commands are sent again.
    async fn clear_ban(&self);
}

#[derive(Debug, Default)]
struct SessionState {
    token: Option<String>,
    banned: bool,
    ban_reason: Option<String>,
    last_auth: Option<DateTime<Utc>>,
}

/// Point-in-time view of a handler's session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub logged_in: bool,
    pub banned: bool,
    pub ban_reason: Option<String>,
    pub last_auth: Option<DateTime<Utc>>,
}

/// AniDB UDP session handler.
///
/// # Example
///
/// ```ignore
/// let handler = ConnectionHandler::new("shared", transport, &config, events);
/// let command = Command::get_anime_info(1)?;
/// match handler.execute(&command).await {
///     Outcome::Success(payload) => println!("{:?}", payload),
///     other => println!("{:?}", other.kind()),
/// }
/// ```
pub struct ConnectionHandler {
    name: String,
    transport: Arc<dyn DatagramTransport>,
    credentials: Credentials,
    client: ClientIdentity,
    reply_timeout: Duration,
    session: Mutex<SessionState>,
    ban_tx: watch::Sender<bool>,
    events: EventBus,
    clock: Arc<dyn Clock>,
}

impl ConnectionHandler {
    /// Creates a handler. Nothing is sent until the first command or `login()`.
    pub fn new(
        name: impl Into<String>,
        transport: Arc<dyn DatagramTransport>,
        config: &CoreConfig,
        events: EventBus,
    ) -> Self {
        let (ban_tx, _) = watch::channel(false);
        Self {
            name: name.into(),
            transport,
            credentials: config.credentials.clone(),
            client: config.client.clone(),
            reply_timeout: config.reply_timeout(),
            session: Mutex::new(SessionState::default()),
            ban_tx,
            events,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the clock used for session timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_banned(&self) -> bool {
        *self.ban_tx.borrow()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let session = self.session.lock().await;
        SessionSnapshot {
            logged_in: session.token.is_some(),
            banned: session.banned,
            ban_reason: session.ban_reason.clone(),
            last_auth: session.last_auth,
        }
    }

    /// Opens a session unless one is already held. Returns whether a
    /// session is held afterwards.
    #[instrument(skip(self), fields(handler = %self.name))]
    pub async fn login(&self) -> bool {
        let mut session = self.session.lock().await;
        if session.banned {
            return false;
        }
        if session.token.is_some() {
            return true;
        }
        self.authenticate(&mut session).await.is_ok()
    }

    /// Closes the session. The local session key is dropped even when the
    /// server cannot be reached.
    #[instrument(skip(self), fields(handler = %self.name))]
    pub async fn logout(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        let Some(token) = session.token.take() else {
            return Ok(());
        };

        self.events
            .emit(CoreEvent::Session(SessionEvent::LoggedOut {
                handler: self.name.clone(),
            }))
            .ok();

        let reply = self.send(&session::render_logout(&token)).await?;
        if !session::logout_accepted(reply.code) {
            warn!(code = reply.code, "Unexpected logout reply");
        }
        info!("Logged out");
        Ok(())
    }

    /// Executes one command.
    ///
    /// Logs in first when no session is held. A `LoginRequired` reply drops
    /// the session key, logs in again and retries exactly once. Transport
    /// faults come back as `TransientFailure` and leave the session as it was.
    #[instrument(skip(self, command), fields(handler = %self.name, key = %command.dedup_key()))]
    pub async fn execute(&self, command: &Command) -> Outcome {
        let mut session = self.session.lock().await;
        if session.banned {
            return Outcome::Banned {
                reason: session.ban_reason.clone(),
            };
        }

        if session.token.is_none() {
            if let Err(outcome) = self.authenticate(&mut session).await {
                return outcome;
            }
        }

        let mut outcome = self.dispatch(&session, command).await;
        if outcome == Outcome::LoginRequired {
            info!("Session rejected, logging in again");
            session.token = None;
            self.events
                .emit(CoreEvent::Session(SessionEvent::SessionExpired {
                    handler: self.name.clone(),
                }))
                .ok();

            if let Err(outcome) = self.authenticate(&mut session).await {
                return outcome;
            }
            outcome = self.dispatch(&session, command).await;
            if outcome == Outcome::LoginRequired {
                session.token = None;
            }
        }

        if let Outcome::Banned { reason } = &outcome {
            self.mark_banned(&mut session, reason.clone());
        }

        debug!(outcome = %outcome.kind(), "Command finished");
        outcome
    }

    /// Lifts the ban flag.
    pub async fn clear_ban(&self) {
        let mut session = self.session.lock().await;
        if !session.banned {
            return;
        }
        session.banned = false;
        session.ban_reason = None;
        self.ban_tx.send_replace(false);

        info!(handler = %self.name, "Ban cleared");
        self.events
            .emit(CoreEvent::Session(SessionEvent::BanCleared {
                handler: self.name.clone(),
            }))
            .ok();
    }

    async fn dispatch(&self, session: &SessionState, command: &Command) -> Outcome {
        let Some(token) = session.token.as_deref() else {
            return Outcome::LoginRequired;
        };

        let text = codec::append_session(&command.render(), token);
        match self.send(&text).await {
            Ok(reply) => command.parse_outcome(reply.code, &reply.body),
            Err(e) => {
                warn!(error = %e, "Command exchange failed");
                Outcome::transient(e.to_string())
            }
        }
    }

    /// Runs `AUTH`. On failure returns the outcome the pending command
    /// should report.
    async fn authenticate(&self, session: &mut SessionState) -> std::result::Result<(), Outcome> {
        info!(handler = %self.name, user = %self.credentials.username, "Logging in");

        let reply = match self.send(&session::render_auth(&self.credentials, &self.client)).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(handler = %self.name, error = %e, "Login exchange failed");
                return Err(Outcome::transient(e.to_string()));
            }
        };

        match session::parse_auth(reply.code, &reply.body) {
            AuthReply::Accepted {
                token,
                new_version_available,
            } => {
                if new_version_available {
                    warn!(handler = %self.name, "Server reports a newer client version");
                }
                let now = self.clock.now();
                session.token = Some(token);
                session.last_auth = Some(now);
                info!(handler = %self.name, "Logged in");
                self.events
                    .emit(CoreEvent::Session(SessionEvent::LoggedIn {
                        handler: self.name.clone(),
                        at: now.timestamp(),
                    }))
                    .ok();
                Ok(())
            }
            AuthReply::Rejected { reason } => {
                warn!(handler = %self.name, %reason, "Login rejected");
                self.events
                    .emit(CoreEvent::Session(SessionEvent::LoginFailed {
                        handler: self.name.clone(),
                        reason,
                    }))
                    .ok();
                Err(Outcome::LoginFailed)
            }
            AuthReply::Banned { reason } => {
                self.mark_banned(session, reason.clone());
                Err(Outcome::Banned { reason })
            }
            AuthReply::Transient { reason } => {
                warn!(handler = %self.name, %reason, "Login not completed");
                Err(Outcome::TransientFailure { reason })
            }
        }
    }

    fn mark_banned(&self, session: &mut SessionState, reason: Option<String>) {
        session.token = None;
        session.banned = true;
        session.ban_reason = reason.clone();
        self.ban_tx.send_replace(true);

        warn!(handler = %self.name, reason = ?reason, "Banned by server");
        self.events
            .emit(CoreEvent::Session(SessionEvent::Banned {
                handler: self.name.clone(),
                reason,
            }))
            .ok();
    }

    async fn send(&self, text: &str) -> Result<Reply> {
        debug!(handler = %self.name, request = %redact_wire(text), "Sending");

        let request = DatagramRequest::text(text).timeout(self.reply_timeout);
        let reply = self.transport.exchange(request).await?;
        let body = reply.text()?;

        debug!(
            handler = %self.name,
            elapsed_ms = reply.elapsed.as_millis() as u64,
            reply = %body.lines().next().unwrap_or(""),
            "Received"
        );
        codec::decode_reply(&body)
    }
}

#[async_trait]
impl CommandExecutor for ConnectionHandler {
    async fn execute(&self, command: &Command) -> Outcome {
        ConnectionHandler::execute(self, command).await
    }

    fn ban_watch(&self) -> watch::Receiver<bool> {
        self.ban_tx.subscribe()
    }

    async fn clear_ban(&self) {
        ConnectionHandler::clear_ban(self).await
    }
}

impl std::fmt::Debug for ConnectionHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandler")
            .field("name", &self.name)
            .field("credentials", &self.credentials)
            .field("reply_timeout", &self.reply_timeout)
            .field("banned", &self.is_banned())
            .finish()
    }
}
