//! # Core Configuration Module
//!
//! Settings for the protocol client and the three work queues.
//!
//! ## Overview
//!
//! A [`CoreConfig`] is built with [`CoreConfigBuilder`] or loaded from JSON and
//! validated before anything touches the network. Validation fails fast with
//! an actionable [`Error::Config`] message.
//!
//! ## Usage
//!
//! ```
//! use core_runtime::config::{CoreConfig, QueueKind, SessionMode};
//!
//! let config = CoreConfig::builder()
//!     .credentials("alice", "hunter2")
//!     .client("anisync", 1)
//!     .session_mode(SessionMode::PerQueue)
//!     .queue_pacing_ms(QueueKind::Images, 250)
//!     .build()
//!     .expect("valid config");
//!
//! assert_eq!(config.server.port, 9000);
//! assert_eq!(config.queues.get(QueueKind::Images).pacing_ms, 250);
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! // Credentials are required
//! let config = CoreConfig::builder()
//!     .client("anisync", 1)
//!     .build()
//!     .expect("Should fail - missing credentials");
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Public UDP API host.
pub const DEFAULT_SERVER_HOST: &str = "api.anidb.net";

/// Public UDP API port.
pub const DEFAULT_SERVER_PORT: u16 = 9000;

/// First local port; per-queue sessions bind consecutive ports after it.
pub const DEFAULT_LOCAL_PORT: u16 = 9001;

/// Protocol version sent with `AUTH`.
pub const PROTOCOL_VERSION: u32 = 3;

pub const DEFAULT_REPLY_TIMEOUT_MS: u64 = 20_000;

const MAX_REPLY_TIMEOUT_MS: u64 = 120_000;

/// Sustained-load packet interval the service tolerates (one per 2 seconds).
pub const DEFAULT_METADATA_PACING_MS: u64 = 2_000;

pub const DEFAULT_IMAGE_PACING_MS: u64 = 500;

const MAX_PACING_MS: u64 = 60_000;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

const MAX_ATTEMPTS_LIMIT: u32 = 20;

pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 30_000;

// ============================================================================
// Queue identity
// ============================================================================

/// The three independent work queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueKind {
    /// Metadata and catalog operations
    General,
    /// Image-related operations
    Images,
    /// Operations produced by file hashing
    Hasher,
}

impl QueueKind {
    pub const ALL: [QueueKind; 3] = [QueueKind::General, QueueKind::Images, QueueKind::Hasher];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Images => "images",
            Self::Hasher => "hasher",
        }
    }

    /// Name shown to operators ("General", "Images", "Hasher").
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::General => "General",
            Self::Images => "Images",
            Self::Hasher => "Hasher",
        }
    }

    /// Offset from [`ServerEndpoint::local_port`] for per-queue sessions.
    pub fn port_offset(&self) -> u16 {
        match self {
            Self::General => 0,
            Self::Images => 1,
            Self::Hasher => 2,
        }
    }
}

impl fmt::Display for QueueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "general" => Ok(Self::General),
            "images" | "image" => Ok(Self::Images),
            "hasher" => Ok(Self::Hasher),
            other => Err(Error::Config(format!("Unknown queue: {}", other))),
        }
    }
}

// ============================================================================
// Settings structs
// ============================================================================

/// Remote service address and the local port to bind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEndpoint {
    pub host: String,
    pub port: u16,
    pub local_port: u16,
}

impl Default for ServerEndpoint {
    fn default() -> Self {
        Self {
            host: DEFAULT_SERVER_HOST.to_string(),
            port: DEFAULT_SERVER_PORT,
            local_port: DEFAULT_LOCAL_PORT,
        }
    }
}

/// Account credentials used by `AUTH`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Registered client name and version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientIdentity {
    /// Lowercase registered client name
    pub name: String,
    /// Registered client version
    pub version: u32,
    pub protocol_version: u32,
}

impl Default for ClientIdentity {
    fn default() -> Self {
        Self {
            name: "anisync".to_string(),
            version: 1,
            protocol_version: PROTOCOL_VERSION,
        }
    }
}

/// Whether the three queues share one session or each hold their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// One handler and one session for every queue
    #[default]
    Shared,
    /// A handler, socket and session per queue
    PerQueue,
}

/// Per-queue tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    /// Minimum delay between two executions on the queue
    pub pacing_ms: u64,
    /// Executions allowed for one entry before it is dropped
    pub max_attempts: u32,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            pacing_ms: DEFAULT_METADATA_PACING_MS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl QueueSettings {
    pub fn new(pacing_ms: u64, max_attempts: u32) -> Self {
        Self {
            pacing_ms,
            max_attempts,
        }
    }

    pub fn with_pacing_ms(mut self, pacing_ms: u64) -> Self {
        self.pacing_ms = pacing_ms;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    fn validate(&self, kind: QueueKind) -> Result<()> {
        if self.pacing_ms > MAX_PACING_MS {
            return Err(Error::Config(format!(
                "{} queue pacing of {} ms exceeds the maximum of {} ms",
                kind.display_name(),
                self.pacing_ms,
                MAX_PACING_MS
            )));
        }

        if self.max_attempts == 0 || self.max_attempts > MAX_ATTEMPTS_LIMIT {
            return Err(Error::Config(format!(
                "{} queue max_attempts must be between 1 and {}, got {}",
                kind.display_name(),
                MAX_ATTEMPTS_LIMIT,
                self.max_attempts
            )));
        }

        Ok(())
    }
}

/// Tuning for all three queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueTuning {
    pub general: QueueSettings,
    pub images: QueueSettings,
    pub hasher: QueueSettings,
}

impl Default for QueueTuning {
    fn default() -> Self {
        Self {
            general: QueueSettings::default(),
            images: QueueSettings::default().with_pacing_ms(DEFAULT_IMAGE_PACING_MS),
            hasher: QueueSettings::default(),
        }
    }
}

impl QueueTuning {
    pub fn get(&self, kind: QueueKind) -> QueueSettings {
        match kind {
            QueueKind::General => self.general,
            QueueKind::Images => self.images,
            QueueKind::Hasher => self.hasher,
        }
    }

    pub fn get_mut(&mut self, kind: QueueKind) -> &mut QueueSettings {
        match kind {
            QueueKind::General => &mut self.general,
            QueueKind::Images => &mut self.images,
            QueueKind::Hasher => &mut self.hasher,
        }
    }
}

// ============================================================================
// CoreConfig
// ============================================================================

/// Complete client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreConfig {
    #[serde(default)]
    pub server: ServerEndpoint,

    pub credentials: Credentials,

    #[serde(default)]
    pub client: ClientIdentity,

    /// How long to wait for a reply datagram
    #[serde(default = "default_reply_timeout_ms")]
    pub reply_timeout_ms: u64,

    #[serde(default)]
    pub session_mode: SessionMode,

    #[serde(default)]
    pub queues: QueueTuning,

    /// Per-subscriber event buffer
    #[serde(default = "default_event_buffer_size")]
    pub event_buffer_size: usize,

    /// Upper bound for draining the queues at shutdown
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
}

fn default_reply_timeout_ms() -> u64 {
    DEFAULT_REPLY_TIMEOUT_MS
}

fn default_event_buffer_size() -> usize {
    DEFAULT_EVENT_BUFFER_SIZE
}

fn default_shutdown_timeout_ms() -> u64 {
    DEFAULT_SHUTDOWN_TIMEOUT_MS
}

impl CoreConfig {
    /// Creates a new builder.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Parses and validates a JSON settings document.
    ///
    /// ```
    /// use core_runtime::config::{CoreConfig, SessionMode};
    ///
    /// let config = CoreConfig::from_json(r#"{
    ///     "credentials": { "username": "alice", "password": "hunter2" },
    ///     "session_mode": "per_queue",
    ///     "queues": { "images": { "pacing_ms": 100 } }
    /// }"#).unwrap();
    ///
    /// assert_eq!(config.session_mode, SessionMode::PerQueue);
    /// assert_eq!(config.queues.images.pacing_ms, 100);
    /// assert_eq!(config.queues.images.max_attempts, 3);
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        let config: CoreConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Local port the given queue's session binds. `0` stays `0` (OS-assigned).
    pub fn local_port_for(&self, kind: QueueKind) -> u16 {
        match self.session_mode {
            SessionMode::PerQueue if self.server.local_port != 0 => {
                self.server.local_port.saturating_add(kind.port_offset())
            }
            _ => self.server.local_port,
        }
    }

    /// Validates the configuration.
    ///
    /// Checks:
    /// - server host, port and credentials are present
    /// - the client name is a lowercase alphanumeric registration name
    /// - reply timeout, pacing and retry ceilings are within bounds
    /// - per-queue local ports do not overflow
    pub fn validate(&self) -> Result<()> {
        if self.server.host.trim().is_empty() {
            return Err(Error::Config("Server host cannot be empty".to_string()));
        }

        if self.server.port == 0 {
            return Err(Error::Config("Server port cannot be 0".to_string()));
        }

        if self.credentials.username.trim().is_empty() || self.credentials.password.is_empty() {
            return Err(Error::Config(
                "Username and password are required to open a session".to_string(),
            ));
        }

        if self.client.name.is_empty()
            || !self
                .client
                .name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        {
            return Err(Error::Config(format!(
                "Client name '{}' must be the lowercase alphanumeric name registered with the service",
                self.client.name
            )));
        }

        if self.reply_timeout_ms == 0 || self.reply_timeout_ms > MAX_REPLY_TIMEOUT_MS {
            return Err(Error::Config(format!(
                "Reply timeout must be between 1 and {} ms, got {}",
                MAX_REPLY_TIMEOUT_MS, self.reply_timeout_ms
            )));
        }

        for kind in QueueKind::ALL {
            self.queues.get(kind).validate(kind)?;
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.shutdown_timeout_ms == 0 {
            return Err(Error::Config(
                "Shutdown timeout must be greater than 0 ms".to_string(),
            ));
        }

        if self.session_mode == SessionMode::PerQueue && self.server.local_port > u16::MAX - 2 {
            return Err(Error::Config(format!(
                "Local port {} leaves no room for per-queue sessions",
                self.server.local_port
            )));
        }

        Ok(())
    }
}

/// Builder for [`CoreConfig`].
#[derive(Debug, Default)]
pub struct CoreConfigBuilder {
    server: ServerEndpoint,
    credentials: Option<Credentials>,
    client: ClientIdentity,
    reply_timeout_ms: Option<u64>,
    session_mode: SessionMode,
    queues: QueueTuning,
    event_buffer_size: Option<usize>,
    shutdown_timeout_ms: Option<u64>,
}

impl CoreConfigBuilder {
    /// Sets the remote host and port.
    pub fn server(mut self, host: impl Into<String>, port: u16) -> Self {
        self.server.host = host.into();
        self.server.port = port;
        self
    }

    /// Sets the first local port. `0` lets the OS pick.
    pub fn local_port(mut self, port: u16) -> Self {
        self.server.local_port = port;
        self
    }

    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials::new(username, password));
        self
    }

    /// Sets the registered client name and version.
    pub fn client(mut self, name: impl Into<String>, version: u32) -> Self {
        self.client.name = name.into();
        self.client.version = version;
        self
    }

    pub fn reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn session_mode(mut self, mode: SessionMode) -> Self {
        self.session_mode = mode;
        self
    }

    pub fn queue_settings(mut self, kind: QueueKind, settings: QueueSettings) -> Self {
        *self.queues.get_mut(kind) = settings;
        self
    }

    pub fn queue_pacing_ms(mut self, kind: QueueKind, pacing_ms: u64) -> Self {
        self.queues.get_mut(kind).pacing_ms = pacing_ms;
        self
    }

    pub fn max_attempts(mut self, kind: QueueKind, max_attempts: u32) -> Self {
        self.queues.get_mut(kind).max_attempts = max_attempts;
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when credentials are missing or any value is
    /// out of range.
    pub fn build(self) -> Result<CoreConfig> {
        let credentials = self.credentials.ok_or_else(|| {
            Error::Config(
                "Credentials are required. Call .credentials(username, password) \
                 or provide them in the settings file."
                    .to_string(),
            )
        })?;

        let config = CoreConfig {
            server: self.server,
            credentials,
            client: self.client,
            reply_timeout_ms: self.reply_timeout_ms.unwrap_or(DEFAULT_REPLY_TIMEOUT_MS),
            session_mode: self.session_mode,
            queues: self.queues,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            shutdown_timeout_ms: self
                .shutdown_timeout_ms
                .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT_MS),
        };

        config.validate()?;
        Ok(config)
    }
}
