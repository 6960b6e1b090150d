//! Composition root for the three queues.

use bridge_traits::time::{Clock, SystemClock};
use core_async::time::{timeout, Duration};
use core_runtime::config::{CoreConfig, QueueKind};
use core_runtime::events::EventBus;
use futures::future::join_all;
use provider_anidb::{Command, CommandExecutor};
use std::sync::Arc;
use tracing::{info, warn};

use crate::entry::Ticket;
use crate::error::{QueueError, Result};
use crate::processor::{QueueProcessor, QueueSnapshot};

/// Executors the queues run their commands through.
#[derive(Clone)]
pub enum QueueExecutors {
    /// One session for all three queues
    Shared(Arc<dyn CommandExecutor>),
    /// A session per queue
    PerQueue {
        general: Arc<dyn CommandExecutor>,
        images: Arc<dyn CommandExecutor>,
        hasher: Arc<dyn CommandExecutor>,
    },
}

impl QueueExecutors {
    pub fn executor_for(&self, kind: QueueKind) -> Arc<dyn CommandExecutor> {
        match self {
            QueueExecutors::Shared(executor) => Arc::clone(executor),
            QueueExecutors::PerQueue {
                general,
                images,
                hasher,
            } => match kind {
                QueueKind::General => Arc::clone(general),
                QueueKind::Images => Arc::clone(images),
                QueueKind::Hasher => Arc::clone(hasher),
            },
        }
    }

    /// Each executor once.
    fn distinct(&self) -> Vec<Arc<dyn CommandExecutor>> {
        match self {
            QueueExecutors::Shared(executor) => vec![Arc::clone(executor)],
            QueueExecutors::PerQueue {
                general,
                images,
                hasher,
            } => vec![Arc::clone(general), Arc::clone(images), Arc::clone(hasher)],
        }
    }
}

/// Owns the general, images and hasher processors.
///
/// # Example
///
/// ```ignore
/// let supervisor = QueueSupervisor::new(&config, QueueExecutors::Shared(handler), events);
/// supervisor.start()?;
///
/// let ticket = supervisor.enqueue(Command::get_anime_info(1)?, QueueKind::General)?;
/// let completion = ticket.wait().await;
///
/// supervisor.cancel_and_wait_for_all(Duration::from_secs(30)).await?;
/// ```
pub struct QueueSupervisor {
    general: QueueProcessor,
    images: QueueProcessor,
    hasher: QueueProcessor,
    executors: QueueExecutors,
}

impl QueueSupervisor {
    pub fn new(config: &CoreConfig, executors: QueueExecutors, events: EventBus) -> Self {
        Self::with_clock(config, executors, events, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: &CoreConfig,
        executors: QueueExecutors,
        events: EventBus,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let build = |kind: QueueKind| {
            QueueProcessor::with_clock(
                kind,
                config.queues.get(kind),
                executors.executor_for(kind),
                events.clone(),
                Arc::clone(&clock),
            )
        };

        Self {
            general: build(QueueKind::General),
            images: build(QueueKind::Images),
            hasher: build(QueueKind::Hasher),
            executors,
        }
    }

    /// Starts all three workers.
    pub fn start(&self) -> Result<()> {
        for processor in self.processors() {
            processor.start()?;
        }
        info!("Queue workers started");
        Ok(())
    }

    pub fn processor(&self, kind: QueueKind) -> &QueueProcessor {
        match kind {
            QueueKind::General => &self.general,
            QueueKind::Images => &self.images,
            QueueKind::Hasher => &self.hasher,
        }
    }

    pub fn processors(&self) -> [&QueueProcessor; 3] {
        [&self.general, &self.images, &self.hasher]
    }

    pub fn enqueue(&self, command: Command, target: QueueKind) -> Result<Ticket> {
        self.processor(target).enqueue(command)
    }

    pub fn pause_all(&self) {
        for processor in self.processors() {
            processor.pause();
        }
    }

    pub fn resume_all(&self) {
        for processor in self.processors() {
            processor.resume();
        }
    }

    /// Lifts the ban on every executor, then resumes every queue.
    pub async fn clear_bans_and_resume(&self) {
        for executor in self.executors.distinct() {
            executor.clear_ban().await;
        }
        self.resume_all();
    }

    pub fn snapshot(&self) -> Vec<QueueSnapshot> {
        self.processors().iter().map(|p| p.snapshot()).collect()
    }

    /// Requests Draining on all queues and waits until all are Stopped.
    ///
    /// Safe to call with nothing in flight, and more than once.
    ///
    /// # Errors
    ///
    /// [`QueueError::ShutdownTimedOut`] naming the queues still draining
    /// when `limit` elapsed.
    pub async fn cancel_and_wait_for_all(&self, limit: Duration) -> Result<()> {
        for processor in self.processors() {
            processor.shutdown();
        }

        let waits = self.processors().map(|p| p.wait_stopped());
        if timeout(limit, join_all(waits)).await.is_ok() {
            info!("All queues stopped");
            return Ok(());
        }

        let queues: Vec<String> = self
            .processors()
            .iter()
            .filter(|p| !p.state().is_terminal())
            .map(|p| p.kind().to_string())
            .collect();
        warn!(?queues, ?limit, "Queues did not stop in time");
        Err(QueueError::ShutdownTimedOut { queues })
    }
}

impl Drop for QueueSupervisor {
    fn drop(&mut self) {
        for processor in self.processors() {
            processor.shutdown();
        }
    }
}

impl std::fmt::Debug for QueueSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueSupervisor")
            .field("general", &self.general)
            .field("images", &self.images)
            .field("hasher", &self.hasher)
            .finish()
    }
}
