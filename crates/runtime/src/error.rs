//! Errors surfaced by the runtime API.
//!
//! Wraps worker coordination failures and engine errors so embedders can
//! bubble them up with consistent context.
use thiserror::Error;
use tokio::sync::oneshot;

use solo_core::{EngineError, ErrorSeverity, SoloError};

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("solo worker command channel closed")]
    CommandChannelClosed,

    #[error("solo worker reply channel closed")]
    ReplyChannelClosed(#[source] oneshot::error::RecvError),

    #[error("solo worker join failed")]
    WorkerJoin(#[source] tokio::task::JoinError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("failed to encode debug dump")]
    Encode(#[source] serde_json::Error),

    #[error(transparent)]
    Config(#[from] anyhow::Error),
}

impl SoloError for RuntimeError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::CommandChannelClosed | Self::ReplyChannelClosed(_) | Self::WorkerJoin(_) => {
                ErrorSeverity::Fatal
            }
            Self::Engine(err) => err.severity(),
            Self::Encode(_) => ErrorSeverity::Internal,
            Self::Config(_) => ErrorSeverity::Validation,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::CommandChannelClosed => "RUNTIME_COMMAND_CHANNEL_CLOSED",
            Self::ReplyChannelClosed(_) => "RUNTIME_REPLY_CHANNEL_CLOSED",
            Self::WorkerJoin(_) => "RUNTIME_WORKER_JOIN",
            Self::Engine(err) => err.error_code(),
            Self::Encode(_) => "RUNTIME_ENCODE",
            Self::Config(_) => "RUNTIME_CONFIG",
        }
    }
}
