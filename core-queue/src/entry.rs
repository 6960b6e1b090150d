//! Queue entries, enqueue tickets and completions.

use chrono::{DateTime, Utc};
use core_async::sync::oneshot;
use core_runtime::config::QueueKind;
use provider_anidb::{Command, OutcomeKind, Payload};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Type-safe queue entry identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryId(Uuid);

impl EntryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A command waiting in (or executing from) a queue.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub id: EntryId,
    pub command: Command,
    pub dedup_key: String,
    pub enqueued_at: DateTime<Utc>,
    /// Executions that ended in a retryable failure
    pub attempts: u32,
}

impl QueueEntry {
    pub fn new(command: Command, enqueued_at: DateTime<Utc>) -> Self {
        Self {
            id: EntryId::new(),
            dedup_key: command.dedup_key(),
            command,
            enqueued_at,
            attempts: 0,
        }
    }
}

/// How an enqueue was absorbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnqueueStatus {
    /// A new entry was appended
    Queued,
    /// An entry with the same dedup key was already live; this enqueue waits
    /// on it
    Coalesced,
}

/// Final result of a queue entry, delivered to every ticket attached to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    pub queue: QueueKind,
    pub dedup_key: String,
    pub outcome: OutcomeKind,
    pub payload: Option<Payload>,
    /// Executions it took, including the final one
    pub attempts: u32,
    /// Last failure reason for dropped entries
    pub error: Option<String>,
}

impl Completion {
    pub fn is_success(&self) -> bool {
        self.outcome == OutcomeKind::Success
    }
}

/// Receipt returned by `enqueue`.
#[derive(Debug)]
pub struct Ticket {
    pub dedup_key: String,
    pub status: EnqueueStatus,
    completion: oneshot::Receiver<Completion>,
}

impl Ticket {
    pub(crate) fn new(
        dedup_key: String,
        status: EnqueueStatus,
        completion: oneshot::Receiver<Completion>,
    ) -> Self {
        Self {
            dedup_key,
            status,
            completion,
        }
    }

    pub fn is_coalesced(&self) -> bool {
        self.status == EnqueueStatus::Coalesced
    }

    /// Waits for the entry to finish.
    ///
    /// `None` when the entry never finished: it was still pending when the
    /// queue stopped and was handed back through `take_pending`, or the
    /// queue was dropped.
    pub async fn wait(self) -> Option<Completion> {
        self.completion.await.ok()
    }
}
