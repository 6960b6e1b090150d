//! Logs queue state changes for headless hosts.

use core_async::sync::CancellationToken;
use core_async::task::{self, JoinHandle};
use core_runtime::config::QueueKind;
use core_runtime::events::{CoreEvent, EventStream, QueueEvent, QueueState, RecvError};
use tracing::{info, warn};

/// Human-readable state line, e.g. `Running (3 pending): MarkingFileExternal`.
pub fn format_state_message(state: QueueState, pending: usize, activity: Option<&str>) -> String {
    let mut message = match state {
        QueueState::Running | QueueState::Paused | QueueState::Draining if pending > 0 => {
            format!("{} ({} pending)", capitalize(state.as_str()), pending)
        }
        _ => capitalize(state.as_str()),
    };
    if let Some(activity) = activity {
        message.push_str(": ");
        message.push_str(activity);
    }
    message
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// The line the observer writes for one queue transition.
pub fn state_change_line(queue: QueueKind, message: &str) -> String {
    format!("{} Queue state change: {}", queue.display_name(), message)
}

/// What the observer logs for one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObserverLine {
    /// One line per state transition
    StateChange(String),
    /// Why a queue paused itself; the transition follows as its own line
    AutoPause(String),
}

/// Maps a bus event to the line it produces, if any.
pub fn observer_line(event: &CoreEvent) -> Option<ObserverLine> {
    match event {
        CoreEvent::Queue(QueueEvent::StateChanged {
            queue,
            state,
            pending,
            activity,
        }) => {
            let message = format_state_message(*state, *pending, activity.as_deref());
            Some(ObserverLine::StateChange(state_change_line(*queue, &message)))
        }
        CoreEvent::Queue(QueueEvent::AutoPaused { queue, reason }) => Some(ObserverLine::AutoPause(
            format!("{} Queue paused automatically: {}", queue.display_name(), reason),
        )),
        _ => None,
    }
}

/// Spawns a task that logs every queue transition until `shutdown` fires or
/// the bus closes.
pub fn spawn_queue_observer(mut stream: EventStream, shutdown: CancellationToken) -> JoinHandle<()> {
    task::spawn(async move {
        loop {
            let event = core_async::select! {
                _ = shutdown.cancelled() => break,
                event = stream.recv() => event,
            };

            match event {
                Ok(event) => match observer_line(&event) {
                    Some(ObserverLine::StateChange(line)) => info!("{}", line),
                    Some(ObserverLine::AutoPause(line)) => warn!("{}", line),
                    None => {}
                },
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Queue observer fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
