//! Core error types and utilities

use std::process::ExitStatus;
use thiserror::Error;

/// Core-specific error types
#[derive(Error, Debug)]
pub enum CoreError {
    /// The executable could not be started
    #[error("worker '{worker}' failed to launch: {source}")]
    Launch {
        worker: String,
        #[source]
        source: std::io::Error,
    },

    /// The process exited on its own with a failure status
    #[error("worker '{worker}' exited with {status}")]
    AbnormalExit { worker: String, status: ExitStatus },

    /// Cancellation was requested and the process ended because of it
    #[error("worker '{worker}' cancelled")]
    Cancelled { worker: String },

    /// A supervised worker stopped while its supervisor was still running
    #[error("worker '{worker}' exited unexpectedly")]
    WorkerExited { worker: String },

    #[error("Process signal error: {0}")]
    ProcessSignal(String),

    #[error("Process wait error: {0}")]
    ProcessWait(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Initialization error: {0}")]
    InitializationError(String),

    #[error("Generic error: {0}")]
    Other(String),
}

impl CoreError {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::ConfigurationError(_) => "CORE001",
            CoreError::ValidationError(_) => "CORE002",
            CoreError::InitializationError(_) => "CORE003",
            CoreError::Launch { .. } => "CORE010",
            CoreError::AbnormalExit { .. } => "CORE011",
            CoreError::Cancelled { .. } => "CORE012",
            CoreError::WorkerExited { .. } => "CORE013",
            CoreError::ProcessSignal(_) => "CORE014",
            CoreError::ProcessWait(_) => "CORE015",
            CoreError::Other(_) => "CORE999",
        }
    }

    /// Whether this error reports honored cancellation rather than a failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CoreError::Cancelled { .. })
    }

    /// Exit code of an abnormal exit, if the process exited with one
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            CoreError::AbnormalExit { status, .. } => status.code(),
            _ => None,
        }
    }
}

/// Core-specific result type
pub type Result<T> = std::result::Result<T, CoreError>;

impl From<&str> for CoreError {
    fn from(s: &str) -> Self {
        CoreError::Other(s.to_string())
    }
}

impl From<String> for CoreError {
    fn from(s: String) -> Self {
        CoreError::Other(s)
    }
}
