use core_runtime::config::QueueKind;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("{queue} queue is shutting down and accepts no new commands")]
    ShuttingDown { queue: QueueKind },

    #[error("Shutdown timed out waiting for: {}", .queues.join(", "))]
    ShutdownTimedOut { queues: Vec<String> },

    #[error("{queue} queue worker already started")]
    AlreadyStarted { queue: QueueKind },

    #[error("{queue} queue must be stopped before pending commands are taken")]
    NotStopped { queue: QueueKind },
}

pub type Result<T> = std::result::Result<T, QueueError>;
