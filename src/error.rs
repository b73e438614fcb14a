use crate::status::{RetCode, Status};

/// Errors surfaced to callers of the serving layer.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    /// The engine reported a non-OK status. Code and message are kept as
    /// the engine produced them.
    #[error("iterator error, ret code {code}, message {message}")]
    Engine { code: RetCode, message: String },
    /// The blocking worker panicked or was cancelled before returning.
    #[error("worker failed: {0}")]
    Worker(String),
    /// The request or pool configuration was rejected before reaching the
    /// engine.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl EngineError {
    /// Return code describing the error.
    pub fn code(&self) -> RetCode {
        match self {
            EngineError::Engine { code, .. } => *code,
            EngineError::Worker(_) => RetCode::Internal,
            EngineError::InvalidArgument(_) => RetCode::InvalidArgument,
        }
    }

    /// Message describing the error.
    pub fn message(&self) -> &str {
        match self {
            EngineError::Engine { message, .. } => message,
            EngineError::Worker(message) | EngineError::InvalidArgument(message) => message,
        }
    }
}

impl From<Status> for EngineError {
    fn from(status: Status) -> Self {
        EngineError::Engine {
            code: status.code(),
            message: status.message().to_string(),
        }
    }
}
