//! # Command Queues
//!
//! In-memory work queues that serialize, pace and retry protocol commands.
//!
//! ## Overview
//!
//! - [`QueueProcessor`]: one FIFO with its own worker task, pacing gap and
//!   pause/resume/shutdown controls
//! - [`QueueSupervisor`]: the general, images and hasher processors bound to
//!   one shared executor or one executor each
//! - [`Ticket`]: returned by every enqueue; resolves to the entry's
//!   [`Completion`]
//!
//! Queue state changes and command lifecycle events are published on the
//! [`core_runtime::events::EventBus`].

pub mod entry;
pub mod error;
mod pacing;
pub mod processor;
pub mod supervisor;

pub use entry::{Completion, EnqueueStatus, EntryId, QueueEntry, Ticket};
pub use error::{QueueError, Result};
pub use processor::{QueueProcessor, QueueSnapshot};
pub use supervisor::{QueueExecutors, QueueSupervisor};
