//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided datagram transports into connection
//! handlers, hands those to the queue supervisor and exposes the result as a
//! single [`CoreService`]. Desktop and server hosts enable the
//! `desktop-shims` feature (which depends on `bridge-desktop`) and call
//! [`bootstrap_desktop`]; tests and embedders inject their own transports
//! through [`CoreService::bootstrap`].
//!
//! ```ignore
//! let core = core_service::bootstrap_desktop(config).await?;
//! core.start()?;
//!
//! let ticket = core.enqueue(Command::get_anime_info(1)?, QueueKind::General)?;
//! let completion = ticket.wait().await;
//!
//! core.shutdown().await?;
//! ```

pub mod error;
pub mod naming;
pub mod observer;

pub use error::{CoreError, Result};

use std::sync::Arc;

use bridge_traits::net::DatagramTransport;
use bridge_traits::time::{Clock, SystemClock};
use core_async::sync::CancellationToken;
use core_async::task::JoinHandle;
use core_queue::{QueueExecutors, QueueSnapshot, QueueSupervisor, Ticket};
use core_runtime::config::{CoreConfig, QueueKind, SessionMode};
use core_runtime::events::{EventBus, EventStream};
use provider_anidb::{Command, ConnectionHandler};
use tracing::{info, warn};

/// Datagram transports for the configured [`SessionMode`].
#[derive(Clone)]
pub enum SessionTransports {
    Shared(Arc<dyn DatagramTransport>),
    PerQueue {
        general: Arc<dyn DatagramTransport>,
        images: Arc<dyn DatagramTransport>,
        hasher: Arc<dyn DatagramTransport>,
    },
}

impl SessionTransports {
    fn mode(&self) -> SessionMode {
        match self {
            SessionTransports::Shared(_) => SessionMode::Shared,
            SessionTransports::PerQueue { .. } => SessionMode::PerQueue,
        }
    }
}

/// Aggregated handle to the bridge dependencies the core requires.
pub struct CoreDependencies {
    pub transports: SessionTransports,
    pub clock: Arc<dyn Clock>,
}

impl CoreDependencies {
    /// Construct a dependency bundle running on the system clock.
    pub fn new(transports: SessionTransports) -> Self {
        Self {
            transports,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    config: Arc<CoreConfig>,
    events: EventBus,
    handlers: Arc<Vec<Arc<ConnectionHandler>>>,
    supervisor: Arc<QueueSupervisor>,
    observer_shutdown: CancellationToken,
}

impl CoreService {
    /// Builds handlers and queues over the given transports.
    ///
    /// Nothing is sent and no worker runs until [`CoreService::start`].
    ///
    /// # Errors
    ///
    /// Fails when the configuration is invalid or the transports do not
    /// match `config.session_mode`.
    pub fn bootstrap(config: CoreConfig, deps: CoreDependencies) -> Result<Self> {
        config.validate()?;
        if deps.transports.mode() != config.session_mode {
            return Err(CoreError::InitializationFailed(format!(
                "session mode {:?} does not match the provided transports ({:?})",
                config.session_mode,
                deps.transports.mode()
            )));
        }

        let events = EventBus::new(config.event_buffer_size);
        let handler = |name: &str, transport: Arc<dyn DatagramTransport>| {
            Arc::new(
                ConnectionHandler::new(name, transport, &config, events.clone())
                    .with_clock(Arc::clone(&deps.clock)),
            )
        };

        let (handlers, executors) = match deps.transports {
            SessionTransports::Shared(transport) => {
                let shared = handler("shared", transport);
                (vec![shared.clone()], QueueExecutors::Shared(shared))
            }
            SessionTransports::PerQueue {
                general,
                images,
                hasher,
            } => {
                let general = handler(QueueKind::General.as_str(), general);
                let images = handler(QueueKind::Images.as_str(), images);
                let hasher = handler(QueueKind::Hasher.as_str(), hasher);
                (
                    vec![general.clone(), images.clone(), hasher.clone()],
                    QueueExecutors::PerQueue {
                        general,
                        images,
                        hasher,
                    },
                )
            }
        };

        let supervisor =
            QueueSupervisor::with_clock(&config, executors, events.clone(), Arc::clone(&deps.clock));

        info!(
            mode = ?config.session_mode,
            server = %config.server.host,
            port = config.server.port,
            "Core service bootstrapped"
        );

        Ok(Self {
            config: Arc::new(config),
            events,
            handlers: Arc::new(handlers),
            supervisor: Arc::new(supervisor),
            observer_shutdown: CancellationToken::new(),
        })
    }

    /// Starts the three queue workers.
    pub fn start(&self) -> Result<()> {
        self.supervisor.start()?;
        Ok(())
    }

    /// Logs queue state changes until shutdown.
    pub fn spawn_queue_observer(&self) -> JoinHandle<()> {
        observer::spawn_queue_observer(self.subscribe(), self.observer_shutdown.child_token())
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn supervisor(&self) -> &QueueSupervisor {
        &self.supervisor
    }

    pub fn handlers(&self) -> &[Arc<ConnectionHandler>] {
        &self.handlers
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe(&self) -> EventStream {
        EventStream::new(self.events.subscribe())
    }

    pub fn enqueue(&self, command: Command, target: QueueKind) -> Result<Ticket> {
        Ok(self.supervisor.enqueue(command, target)?)
    }

    pub fn snapshot(&self) -> Vec<QueueSnapshot> {
        self.supervisor.snapshot()
    }

    /// Drains every queue, then closes the sessions.
    ///
    /// When draining exceeds `shutdown_timeout` the error is returned and the
    /// sessions are left open, since a command may still hold one.
    pub async fn shutdown(&self) -> Result<()> {
        let limit = self.config.shutdown_timeout();
        info!(?limit, "Shutting down queues");
        self.supervisor.cancel_and_wait_for_all(limit).await?;

        for handler in self.handlers.iter() {
            if let Err(err) = handler.logout().await {
                warn!(handler = handler.name(), error = %err, "Logout failed");
            }
        }
        self.observer_shutdown.cancel();
        info!("Core service stopped");
        Ok(())
    }
}

/// Binds UDP sockets for the configured session mode and bootstraps the core.
///
/// Per-queue sessions bind `local_port`, `local_port + 1` and
/// `local_port + 2`.
#[cfg(feature = "desktop-shims")]
pub async fn bootstrap_desktop(config: CoreConfig) -> Result<CoreService> {
    use bridge_desktop::UdpSocketTransport;

    config.validate()?;
    let host = config.server.host.clone();
    let port = config.server.port;
    let connect = |kind: QueueKind| {
        let host = host.clone();
        let local_port = config.local_port_for(kind);
        async move {
            let transport = UdpSocketTransport::connect(&host, port, local_port).await?;
            Ok::<Arc<dyn DatagramTransport>, CoreError>(Arc::new(transport))
        }
    };

    let transports = match config.session_mode {
        SessionMode::Shared => SessionTransports::Shared(connect(QueueKind::General).await?),
        SessionMode::PerQueue => SessionTransports::PerQueue {
            general: connect(QueueKind::General).await?,
            images: connect(QueueKind::Images).await?,
            hasher: connect(QueueKind::Hasher).await?,
        },
    };

    CoreService::bootstrap(config, CoreDependencies::new(transports))
}
