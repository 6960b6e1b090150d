//! # Queue Processor
//!
//! Sequential FIFO engine for one class of work.
//!
//! ## Overview
//!
//! A processor holds commands in memory and executes them one at a time
//! through a [`CommandExecutor`], waiting at least the configured pacing gap
//! between two dispatches. Producers enqueue from any task while the worker
//! is executing.
//!
//! ## State machine
//!
//! ```text
//! Idle ──enqueue──> Running ──queue empty──> Idle
//!   │                 │  ^
//!   │            pause│  │resume (non-empty)
//!   │                 v  │
//!   └─────pause────> Paused ──resume (empty)──> Idle
//!
//! any ──shutdown──> Draining ──in-flight done──> Stopped
//!                    (Stopped at once when nothing is in flight)
//! ```
//!
//! Pause and resume only flip the state; they take effect at the next
//! dequeue boundary and never interrupt the command being executed.
//!
//! ## Execution policy
//!
//! | Outcome                          | Effect                                     |
//! |----------------------------------|--------------------------------------------|
//! | Success, NotFound, UnknownCommand | complete, notify tickets                  |
//! | Banned, LoginFailed              | back to the head of the queue, pause       |
//! | TransientFailure, LoginRequired  | retry at the tail until the ceiling, then drop |

use bridge_traits::time::{Clock, SystemClock};
use core_async::sync::{oneshot, watch, CancellationToken, Notify};
use core_async::task::JoinHandle;
use core_async::time::sleep;
use core_runtime::config::{QueueKind, QueueSettings};
use core_runtime::events::{CommandEvent, CoreEvent, EventBus, QueueEvent, QueueState};
use provider_anidb::{ActivityKind, Command, CommandExecutor, Outcome, OutcomeKind, Payload};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::entry::{Completion, EnqueueStatus, QueueEntry, Ticket};
use crate::error::{QueueError, Result};
use crate::pacing::Pacer;

/// Point-in-time view of a processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub queue: QueueKind,
    pub state: QueueState,
    pub pending: usize,
    pub activity: Option<ActivityKind>,
}

/// Handle to one queue. Clones share the same queue.
#[derive(Clone)]
pub struct QueueProcessor {
    inner: Arc<Inner>,
}

struct Inner {
    kind: QueueKind,
    settings: QueueSettings,
    executor: Arc<dyn CommandExecutor>,
    events: EventBus,
    clock: Arc<dyn Clock>,
    shared: Mutex<Shared>,
    wake: Notify,
    state_tx: watch::Sender<QueueState>,
    cancel: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

struct Shared {
    state: QueueState,
    entries: VecDeque<QueueEntry>,
    /// Tickets per live dedup key; a key stays live while its entry executes
    waiters: HashMap<String, Vec<oneshot::Sender<Completion>>>,
    /// Activity of the entry executing, if any
    current: Option<ActivityKind>,
}

enum Poll {
    Ready,
    Wait,
    Exit,
}

impl QueueProcessor {
    pub fn new(
        kind: QueueKind,
        settings: QueueSettings,
        executor: Arc<dyn CommandExecutor>,
        events: EventBus,
    ) -> Self {
        Self::with_clock(kind, settings, executor, events, Arc::new(SystemClock))
    }

    pub fn with_clock(
        kind: QueueKind,
        settings: QueueSettings,
        executor: Arc<dyn CommandExecutor>,
        events: EventBus,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (state_tx, _) = watch::channel(QueueState::Idle);
        Self {
            inner: Arc::new(Inner {
                kind,
                settings,
                executor,
                events,
                clock,
                shared: Mutex::new(Shared {
                    state: QueueState::Idle,
                    entries: VecDeque::new(),
                    waiters: HashMap::new(),
                    current: None,
                }),
                wake: Notify::new(),
                state_tx,
                cancel: CancellationToken::new(),
                worker: Mutex::new(None),
            }),
        }
    }

    pub fn kind(&self) -> QueueKind {
        self.inner.kind
    }

    /// Spawns the worker task. Entries enqueued before this wait for it.
    ///
    /// # Errors
    ///
    /// [`QueueError::AlreadyStarted`] on a second call.
    pub fn start(&self) -> Result<()> {
        let mut worker = self.inner.worker.lock().unwrap_or_else(|e| e.into_inner());
        if worker.is_some() {
            return Err(QueueError::AlreadyStarted {
                queue: self.inner.kind,
            });
        }

        let inner = Arc::clone(&self.inner);
        *worker = Some(core_async::task::spawn(inner.run()));
        Ok(())
    }

    /// Adds a command, or attaches to the live entry with the same dedup key.
    ///
    /// Never blocks on execution.
    ///
    /// # Errors
    ///
    /// [`QueueError::ShuttingDown`] once shutdown was requested.
    pub fn enqueue(&self, command: Command) -> Result<Ticket> {
        let inner = &self.inner;
        let key = command.dedup_key();
        let (tx, rx) = oneshot::channel();

        let mut shared = inner.lock();
        if !shared.state.accepts_work() {
            return Err(QueueError::ShuttingDown { queue: inner.kind });
        }

        if let Some(waiters) = shared.waiters.get_mut(&key) {
            waiters.push(tx);
            debug!(queue = %inner.kind, dedup_key = %key, "Coalesced duplicate command");
            inner
                .events
                .emit(CoreEvent::Command(CommandEvent::Coalesced {
                    queue: inner.kind,
                    dedup_key: key.clone(),
                }))
                .ok();
            return Ok(Ticket::new(key, EnqueueStatus::Coalesced, rx));
        }

        shared.waiters.insert(key.clone(), vec![tx]);
        shared
            .entries
            .push_back(QueueEntry::new(command, inner.clock.now()));
        if shared.state == QueueState::Idle {
            shared.state = QueueState::Running;
        }
        inner.publish(&shared);
        let pending = shared.entries.len();
        drop(shared);

        inner.wake.notify_one();
        info!(queue = %inner.kind, dedup_key = %key, pending, "Enqueued command");
        Ok(Ticket::new(key, EnqueueStatus::Queued, rx))
    }

    /// Stops dequeuing. The command in flight, if any, still finishes.
    pub fn pause(&self) {
        let mut shared = self.inner.lock();
        if matches!(shared.state, QueueState::Idle | QueueState::Running) {
            shared.state = QueueState::Paused;
            self.inner.publish(&shared);
            info!(queue = %self.inner.kind, "Queue paused");
        }
    }

    pub fn resume(&self) {
        let mut shared = self.inner.lock();
        if shared.state != QueueState::Paused {
            return;
        }
        shared.state = if shared.entries.is_empty() {
            QueueState::Idle
        } else {
            QueueState::Running
        };
        self.inner.publish(&shared);
        drop(shared);

        self.inner.wake.notify_one();
        info!(queue = %self.inner.kind, "Queue resumed");
    }

    /// Requests shutdown: Stopped at once when nothing is in flight,
    /// otherwise Draining until the in-flight command finishes. Pending
    /// entries stay in memory.
    pub fn shutdown(&self) {
        let mut shared = self.inner.lock();
        if !matches!(shared.state, QueueState::Draining | QueueState::Stopped) {
            shared.state = if shared.current.is_some() {
                QueueState::Draining
            } else {
                QueueState::Stopped
            };
            self.inner.publish(&shared);
            info!(
                queue = %self.inner.kind,
                state = %shared.state,
                pending = shared.entries.len(),
                "Queue shutting down"
            );
        }
        drop(shared);

        self.inner.cancel.cancel();
        self.inner.wake.notify_one();
    }

    /// Resolves once the queue is Stopped and its worker has exited.
    pub async fn wait_stopped(&self) {
        let mut state_rx = self.inner.state_tx.subscribe();
        if state_rx.wait_for(|state| state.is_terminal()).await.is_err() {
            return;
        }

        let worker = {
            let mut worker = self.inner.worker.lock().unwrap_or_else(|e| e.into_inner());
            worker.take()
        };
        if let Some(handle) = worker {
            if let Err(e) = handle.await {
                warn!(queue = %self.inner.kind, error = %e, "Queue worker ended abnormally");
            }
        }
    }

    /// Hands back the commands that never ran.
    ///
    /// Their tickets resolve to `None`.
    ///
    /// # Errors
    ///
    /// [`QueueError::NotStopped`] unless the queue is Stopped.
    pub fn take_pending(&self) -> Result<Vec<Command>> {
        let mut shared = self.inner.lock();
        if shared.state != QueueState::Stopped {
            return Err(QueueError::NotStopped {
                queue: self.inner.kind,
            });
        }

        let commands: Vec<Command> = shared.entries.drain(..).map(|e| e.command).collect();
        shared.waiters.clear();
        self.inner.publish(&shared);
        Ok(commands)
    }

    pub fn state(&self) -> QueueState {
        self.inner.lock().state
    }

    pub fn pending_count(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        let shared = self.inner.lock();
        QueueSnapshot {
            queue: self.inner.kind,
            state: shared.state,
            pending: shared.entries.len(),
            activity: shared.current,
        }
    }

    /// Receiver observing every state change.
    pub fn state_watch(&self) -> watch::Receiver<QueueState> {
        self.inner.state_tx.subscribe()
    }
}

impl std::fmt::Debug for QueueProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueProcessor")
            .field("queue", &self.inner.kind)
            .field("settings", &self.inner.settings)
            .field("state", &self.state())
            .finish()
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Publishes the current state on the watch and the event bus.
    fn publish(&self, shared: &Shared) {
        let state = shared.state;
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state;
            true
        });

        self.events
            .emit(CoreEvent::Queue(QueueEvent::StateChanged {
                queue: self.kind,
                state,
                pending: shared.entries.len(),
                activity: shared.current.map(|a| a.as_str().to_string()),
            }))
            .ok();
    }

    /// Pauses without publishing; the caller publishes once it is done.
    fn auto_pause(&self, shared: &mut Shared, reason: &str) {
        shared.state = QueueState::Paused;
        warn!(queue = %self.kind, %reason, "Queue paused automatically");
        self.events
            .emit(CoreEvent::Queue(QueueEvent::AutoPaused {
                queue: self.kind,
                reason: reason.to_string(),
            }))
            .ok();
    }

    async fn run(self: Arc<Self>) {
        let mut ban_rx = self.executor.ban_watch();
        let mut ban_open = true;
        let mut pacer = Pacer::new(self.settings.pacing(), Arc::clone(&self.clock));
        info!(queue = %self.kind, pacing = ?self.settings.pacing(), "Queue worker started");

        loop {
            let banned = *ban_rx.borrow_and_update();
            match self.poll(banned) {
                Poll::Exit => break,
                Poll::Wait => {
                    core_async::select! {
                        _ = self.wake.notified() => {}
                        _ = self.cancel.cancelled() => {}
                        changed = ban_rx.changed(), if ban_open => {
                            if changed.is_err() {
                                ban_open = false;
                            }
                        }
                    }
                    continue;
                }
                Poll::Ready => {}
            }

            if let Some(delay) = pacer.remaining() {
                debug!(queue = %self.kind, ?delay, "Pacing");
                core_async::select! {
                    _ = sleep(delay) => {}
                    _ = self.cancel.cancelled() => {}
                }
            }

            // State may have changed while pacing.
            let Some(entry) = self.begin_next() else {
                continue;
            };
            pacer.mark();

            debug!(
                queue = %self.kind,
                entry_id = %entry.id,
                dedup_key = %entry.dedup_key,
                activity = %entry.command.activity(),
                "Executing command"
            );
            let outcome = self.executor.execute(&entry.command).await;
            self.finish(entry, outcome);
        }

        info!(queue = %self.kind, "Queue worker stopped");
    }

    fn poll(&self, banned: bool) -> Poll {
        let mut shared = self.lock();
        match shared.state {
            QueueState::Stopped => Poll::Exit,
            QueueState::Draining => {
                if shared.current.is_none() {
                    shared.state = QueueState::Stopped;
                    self.publish(&shared);
                }
                Poll::Exit
            }
            QueueState::Paused => Poll::Wait,
            QueueState::Idle | QueueState::Running if banned => {
                self.auto_pause(&mut shared, "session banned");
                self.publish(&shared);
                Poll::Wait
            }
            QueueState::Idle => Poll::Wait,
            QueueState::Running if shared.entries.is_empty() => {
                shared.state = QueueState::Idle;
                self.publish(&shared);
                Poll::Wait
            }
            QueueState::Running => Poll::Ready,
        }
    }

    fn begin_next(&self) -> Option<QueueEntry> {
        let mut shared = self.lock();
        if shared.state != QueueState::Running {
            return None;
        }
        let entry = shared.entries.pop_front()?;
        shared.current = Some(entry.command.activity());
        self.publish(&shared);
        Some(entry)
    }

    fn finish(&self, mut entry: QueueEntry, outcome: Outcome) {
        let mut shared = self.lock();
        shared.current = None;
        let kind = outcome.kind();

        match outcome {
            Outcome::Success(payload) => {
                let executions = entry.attempts + 1;
                self.complete(&mut shared, &entry, kind, Some(payload), executions);
            }
            Outcome::NotFound | Outcome::UnknownCommand => {
                let executions = entry.attempts + 1;
                self.complete(&mut shared, &entry, kind, None, executions);
            }
            Outcome::Banned { reason } => {
                let reason = reason.unwrap_or_else(|| "banned".to_string());
                self.hold(&mut shared, entry, &format!("session banned: {}", reason));
            }
            Outcome::LoginFailed => {
                self.hold(&mut shared, entry, "login failed");
            }
            Outcome::TransientFailure { reason } => {
                entry.attempts += 1;
                self.retry_or_drop(&mut shared, entry, kind, reason);
            }
            Outcome::LoginRequired => {
                entry.attempts += 1;
                self.retry_or_drop(&mut shared, entry, kind, "session not accepted".to_string());
            }
        }

        match shared.state {
            QueueState::Draining => shared.state = QueueState::Stopped,
            QueueState::Running if shared.entries.is_empty() => shared.state = QueueState::Idle,
            _ => {}
        }
        self.publish(&shared);
    }

    /// Puts the entry back at the head and pauses a running queue.
    fn hold(&self, shared: &mut Shared, entry: QueueEntry, reason: &str) {
        shared.entries.push_front(entry);
        if shared.state == QueueState::Running {
            self.auto_pause(shared, reason);
        }
    }

    fn retry_or_drop(&self, shared: &mut Shared, entry: QueueEntry, kind: OutcomeKind, reason: String) {
        let max_attempts = self.settings.max_attempts;
        if entry.attempts < max_attempts {
            warn!(
                queue = %self.kind,
                dedup_key = %entry.dedup_key,
                attempt = entry.attempts,
                max_attempts,
                %reason,
                "Command failed, requeued"
            );
            self.events
                .emit(CoreEvent::Command(CommandEvent::Requeued {
                    queue: self.kind,
                    dedup_key: entry.dedup_key.clone(),
                    attempt: entry.attempts,
                    max_attempts,
                }))
                .ok();
            shared.entries.push_back(entry);
            return;
        }

        warn!(
            queue = %self.kind,
            dedup_key = %entry.dedup_key,
            attempts = entry.attempts,
            %reason,
            "Command dropped after reaching the retry ceiling"
        );
        self.events
            .emit(CoreEvent::Command(CommandEvent::Dropped {
                queue: self.kind,
                dedup_key: entry.dedup_key.clone(),
                attempts: entry.attempts,
                reason: reason.clone(),
            }))
            .ok();
        let executions = entry.attempts;
        self.notify_waiters(shared, &entry, kind, None, executions, Some(reason));
    }

    fn complete(
        &self,
        shared: &mut Shared,
        entry: &QueueEntry,
        kind: OutcomeKind,
        payload: Option<Payload>,
        executions: u32,
    ) {
        info!(
            queue = %self.kind,
            dedup_key = %entry.dedup_key,
            outcome = %kind,
            "Command completed"
        );
        self.events
            .emit(CoreEvent::Command(CommandEvent::Completed {
                queue: self.kind,
                dedup_key: entry.dedup_key.clone(),
                outcome: kind.as_str().to_string(),
                attempts: executions,
            }))
            .ok();
        self.notify_waiters(shared, entry, kind, payload, executions, None);
    }

    fn notify_waiters(
        &self,
        shared: &mut Shared,
        entry: &QueueEntry,
        kind: OutcomeKind,
        payload: Option<Payload>,
        executions: u32,
        error: Option<String>,
    ) {
        let completion = Completion {
            queue: self.kind,
            dedup_key: entry.dedup_key.clone(),
            outcome: kind,
            payload,
            attempts: executions,
            error,
        };
        for waiter in shared.waiters.remove(&entry.dedup_key).unwrap_or_default() {
            waiter.send(completion.clone()).ok();
        }
    }
}
