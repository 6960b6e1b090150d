use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    #[error("Bridge error: {0}")]
    Bridge(#[from] bridge_traits::BridgeError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] provider_anidb::ProtocolError),

    #[error("Queue error: {0}")]
    Queue(#[from] core_queue::QueueError),
}

pub type Result<T> = std::result::Result<T, CoreError>;
