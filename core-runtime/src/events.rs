//! # Event Bus System
//!
//! Typed events published by the queues and the session handlers, delivered
//! over the `core_async::sync::broadcast` channel.
//!
//! ## Overview
//!
//! - **Event Types**: [`QueueEvent`], [`SessionEvent`] and [`CommandEvent`]
//!   wrapped in [`CoreEvent`]
//! - **EventBus**: cloneable publisher; every `subscribe()` is an independent
//!   observer that never affects the publisher
//! - **EventStream**: receiver wrapper with an optional filter
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐  emit   ┌───────────┐  subscribe  ┌──────────────┐
//! │ Queue Processor ├────────>│           ├────────────>│ Host console │
//! └─────────────────┘         │ EventBus  │             └──────────────┘
//! ┌─────────────────┐  emit   │ (broadcast│  subscribe  ┌──────────────┐
//! │ Session Handler ├────────>│  channel) ├────────────>│  Dashboard   │
//! └─────────────────┘         └───────────┘             └──────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::config::QueueKind;
//! use core_runtime::events::{CoreEvent, EventBus, EventStream, QueueEvent, QueueState};
//!
//! # #[core_async::main]
//! # async fn main() {
//! let bus = EventBus::new(16);
//! let mut images = EventStream::new(bus.subscribe()).for_queue(QueueKind::Images);
//!
//! bus.emit(CoreEvent::Queue(QueueEvent::StateChanged {
//!     queue: QueueKind::Images,
//!     state: QueueState::Running,
//!     pending: 2,
//!     activity: Some("GettingAnimeInfo".to_string()),
//! }))
//! .ok();
//!
//! let event = images.recv().await.unwrap();
//! assert_eq!(event.queue(), Some(QueueKind::Images));
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber missed `n` events; keep
//!   receiving.
//! - **`RecvError::Closed`**: every publisher is gone; the core has shut down.
//!
//! Emitting with no subscribers returns an error that publishers ignore.

use crate::config::QueueKind;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use core_async::sync::broadcast;

pub use crate::config::DEFAULT_EVENT_BUFFER_SIZE;
pub use core_async::sync::broadcast::error::{RecvError, SendError};
pub use core_async::sync::broadcast::Receiver;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event published on the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Queue processor state changes
    Queue(QueueEvent),
    /// Login, logout and ban state of a connection handler
    Session(SessionEvent),
    /// Per-command lifecycle inside a queue
    Command(CommandEvent),
}

impl CoreEvent {
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Queue(e) => e.description(),
            CoreEvent::Session(e) => e.description(),
            CoreEvent::Command(e) => e.description(),
        }
    }

    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Session(SessionEvent::Banned { .. })
            | CoreEvent::Session(SessionEvent::LoginFailed { .. })
            | CoreEvent::Command(CommandEvent::Dropped { .. }) => EventSeverity::Error,
            CoreEvent::Queue(QueueEvent::AutoPaused { .. }) => EventSeverity::Warning,
            CoreEvent::Session(SessionEvent::LoggedIn { .. })
            | CoreEvent::Command(CommandEvent::Completed { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }

    /// The queue this event concerns, when it concerns one.
    pub fn queue(&self) -> Option<QueueKind> {
        match self {
            CoreEvent::Queue(QueueEvent::StateChanged { queue, .. })
            | CoreEvent::Queue(QueueEvent::AutoPaused { queue, .. }) => Some(*queue),
            CoreEvent::Command(e) => Some(e.queue()),
            CoreEvent::Session(_) => None,
        }
    }

    /// Serializes the event for hosts that forward it over the wire.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Queue Events
// ============================================================================

/// Lifecycle state of a queue processor.
///
/// ```text
///            enqueue              pause
///   Idle ───────────────> Running ─────> Paused
///    ^  <───────────────    │  ^  <─────   │
///    │     queue empty      │  │  resume   │
///    │                      │  └───────────┘
///    └──── shutdown ────> Draining ──> Stopped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueState {
    /// Nothing queued, nothing executing
    Idle,
    /// Dequeuing and executing
    Running,
    /// Holding entries without executing them
    Paused,
    /// Shutdown requested; waiting for the in-flight command
    Draining,
    /// Terminal
    Stopped,
}

impl QueueState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped)
    }

    /// Whether new entries are accepted in this state.
    pub fn accepts_work(&self) -> bool {
        !matches!(self, Self::Draining | Self::Stopped)
    }
}

impl fmt::Display for QueueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum QueueEvent {
    /// Emitted on every state transition, including each dequeue.
    StateChanged {
        queue: QueueKind,
        state: QueueState,
        /// Entries waiting behind the one executing
        pending: usize,
        /// Activity kind of the entry executing, if any
        activity: Option<String>,
    },
    /// The queue paused itself because the session cannot proceed.
    AutoPaused { queue: QueueKind, reason: String },
}

impl QueueEvent {
    fn description(&self) -> &str {
        match self {
            QueueEvent::StateChanged { .. } => "Queue state changed",
            QueueEvent::AutoPaused { .. } => "Queue paused automatically",
        }
    }
}

// ============================================================================
// Session Events
// ============================================================================

/// Events from a connection handler. `handler` names the handler (the queue
/// it serves, or "shared").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SessionEvent {
    LoggedIn {
        handler: String,
        /// Unix epoch seconds
        at: i64,
    },
    LoginFailed { handler: String, reason: String },
    /// The server reported the session as missing or invalid.
    SessionExpired { handler: String },
    LoggedOut { handler: String },
    Banned {
        handler: String,
        reason: Option<String>,
    },
    BanCleared { handler: String },
}

impl SessionEvent {
    fn description(&self) -> &str {
        match self {
            SessionEvent::LoggedIn { .. } => "Session opened",
            SessionEvent::LoginFailed { .. } => "Login failed",
            SessionEvent::SessionExpired { .. } => "Session expired",
            SessionEvent::LoggedOut { .. } => "Session closed",
            SessionEvent::Banned { .. } => "Client banned",
            SessionEvent::BanCleared { .. } => "Ban cleared",
        }
    }
}

// ============================================================================
// Command Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum CommandEvent {
    /// A second enqueue of a live dedup key was folded into the existing entry.
    Coalesced { queue: QueueKind, dedup_key: String },
    /// Execution finished with a definitive outcome.
    Completed {
        queue: QueueKind,
        dedup_key: String,
        outcome: String,
        attempts: u32,
    },
    /// Transient failure; the entry went back to the tail of the queue.
    Requeued {
        queue: QueueKind,
        dedup_key: String,
        attempt: u32,
        max_attempts: u32,
    },
    /// Retry ceiling reached; the entry was discarded.
    Dropped {
        queue: QueueKind,
        dedup_key: String,
        attempts: u32,
        reason: String,
    },
}

impl CommandEvent {
    fn description(&self) -> &str {
        match self {
            CommandEvent::Coalesced { .. } => "Duplicate command coalesced",
            CommandEvent::Completed { .. } => "Command completed",
            CommandEvent::Requeued { .. } => "Command requeued",
            CommandEvent::Dropped { .. } => "Command dropped",
        }
    }

    pub fn queue(&self) -> QueueKind {
        match self {
            CommandEvent::Coalesced { queue, .. }
            | CommandEvent::Completed { queue, .. }
            | CommandEvent::Requeued { queue, .. }
            | CommandEvent::Dropped { queue, .. } => *queue,
        }
    }

    pub fn dedup_key(&self) -> &str {
        match self {
            CommandEvent::Coalesced { dedup_key, .. }
            | CommandEvent::Completed { dedup_key, .. }
            | CommandEvent::Requeued { dedup_key, .. }
            | CommandEvent::Dropped { dedup_key, .. } => dedup_key,
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus.
///
/// Clones share the same channel. Slow subscribers receive
/// `RecvError::Lagged` instead of blocking publishers.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Creates a bus with [`DEFAULT_EVENT_BUFFER_SIZE`].
    #[allow(clippy::should_implement_trait)]
    pub fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }

    /// Publishes an event. Errors only when nobody is subscribed.
    pub fn emit(&self, event: CoreEvent) -> std::result::Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates an independent subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// `broadcast::Receiver` with an optional filter.
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Keeps queue and command events for one queue.
    pub fn for_queue(self, kind: QueueKind) -> Self {
        self.filter(move |event| event.queue() == Some(kind))
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// `RecvError::Lagged(n)` when `n` events were missed, `RecvError::Closed`
    /// when every publisher is gone.
    pub async fn recv(&mut self) -> std::result::Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.matches(&event) {
                return Ok(event);
            }
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv); `None` when nothing is
    /// buffered.
    pub fn try_recv(&mut self) -> Option<std::result::Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.matches(&event) => return Some(Ok(event)),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }

    fn matches(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn state_changed(queue: QueueKind, state: QueueState) -> CoreEvent {
        CoreEvent::Queue(QueueEvent::StateChanged {
            queue,
            state,
            pending: 0,
            activity: None,
        })
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
        assert!(bus.emit(state_changed(QueueKind::General, QueueState::Idle)).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        let event = CoreEvent::Session(SessionEvent::LoggedIn {
            handler: "shared".to_string(),
            at: 1_700_000_000,
        });

        assert_eq!(bus.emit(event.clone()).unwrap(), 2);
        assert_eq!(sub1.recv().await.unwrap(), event);
        assert_eq!(sub2.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_event_stream_for_queue() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe()).for_queue(QueueKind::Hasher);

        bus.emit(state_changed(QueueKind::General, QueueState::Running)).ok();
        bus.emit(CoreEvent::Session(SessionEvent::LoggedOut {
            handler: "hasher".to_string(),
        }))
        .ok();
        bus.emit(state_changed(QueueKind::Hasher, QueueState::Paused)).ok();

        let received = stream.recv().await.unwrap();
        assert_eq!(received, state_changed(QueueKind::Hasher, QueueState::Paused));
        assert!(stream.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_try_recv_reports_lag() {
        let bus = EventBus::new(2);
        let mut stream = EventStream::new(bus.subscribe());

        for _ in 0..5 {
            bus.emit(state_changed(QueueKind::Images, QueueState::Running)).ok();
        }

        assert!(matches!(stream.try_recv(), Some(Err(RecvError::Lagged(3)))));
        assert!(matches!(stream.try_recv(), Some(Ok(_))));
    }

    #[core_async::test]
    async fn test_stream_reports_closed_bus() {
        let bus = EventBus::new(4);
        let receiver: Receiver<CoreEvent> = bus.subscribe();
        let mut stream = EventStream::new(receiver);

        bus.emit(state_changed(QueueKind::General, QueueState::Idle)).unwrap();
        drop(bus);

        assert!(stream.recv().await.is_ok());
        assert!(matches!(stream.recv().await, Err(RecvError::Closed)));
    }

    #[test]
    fn test_severity() {
        let banned = CoreEvent::Session(SessionEvent::Banned {
            handler: "shared".to_string(),
            reason: Some("flooding".to_string()),
        });
        assert_eq!(banned.severity(), EventSeverity::Error);

        let paused = CoreEvent::Queue(QueueEvent::AutoPaused {
            queue: QueueKind::General,
            reason: "banned".to_string(),
        });
        assert_eq!(paused.severity(), EventSeverity::Warning);

        assert_eq!(
            state_changed(QueueKind::General, QueueState::Idle).severity(),
            EventSeverity::Debug
        );
    }

    #[test]
    fn test_json_shape() {
        let event = CoreEvent::Command(CommandEvent::Completed {
            queue: QueueKind::General,
            dedup_key: "MarkFileAsDisk_F42".to_string(),
            outcome: "success".to_string(),
            attempts: 1,
        });

        let json: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(json["type"], "Command");
        assert_eq!(json["payload"]["event"], "Completed");
        assert_eq!(json["payload"]["queue"], "general");
        assert_eq!(json["payload"]["dedup_key"], "MarkFileAsDisk_F42");
    }

    #[test]
    fn test_queue_state_helpers() {
        assert!(QueueState::Paused.accepts_work());
        assert!(!QueueState::Draining.accepts_work());
        assert!(QueueState::Stopped.is_terminal());
        assert_eq!(QueueState::Running.to_string(), "running");
    }
}
