use thiserror::Error;

/// Errors surfaced by pipeline execution and session storage.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("Stage not found: {0}")]
    StageNotFound(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// The linear gate is closed: a predecessor stage has not completed.
    #[error("Stage '{stage}' is not ready: '{missing}' has not completed")]
    GateClosed { stage: String, missing: String },

    #[error("Context error: {0}")]
    ContextError(String),

    #[error("Stage execution failed: {0}")]
    StageExecutionFailed(String),

    #[error("Storage error: {0}")]
    StorageError(String),
}

pub type Result<T> = std::result::Result<T, FlowError>;
