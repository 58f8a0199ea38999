//! Error taxonomy for the run-and-attach flow.

use thiserror::Error;

/// Result type alias for container run operations.
pub type Result<T> = std::result::Result<T, RunError>;

/// Errors that can end a `run` invocation.
///
/// None of these are recovered inside the flow. They travel unchanged up to
/// the command layer, which owns formatting and the process exit status.
#[derive(Debug, Error)]
pub enum RunError {
    /// Bad user input: malformed flags, unreadable env file, invalid quantity.
    #[error("invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    /// The backend rejected or failed to create the container.
    #[error("failed to start container: {0}")]
    Submission(String),

    /// Log streaming failed after the container was created.
    #[error("log stream failed: {0}")]
    Stream(String),

    /// The caller interrupted before the container was started, or a log
    /// pump that does not know which container it serves.
    #[error("operation cancelled")]
    Cancelled,

    /// The caller interrupted the log stream of a started container.
    #[error("log stream cancelled, container {id} is still running")]
    Interrupted { id: String },
}

impl RunError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Process exit status for this error kind.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Validation { .. } => 2,
            Self::Submission(_) => 125,
            Self::Stream(_) => 1,
            Self::Cancelled | Self::Interrupted { .. } => 130,
        }
    }
}

impl From<std::io::Error> for RunError {
    fn from(err: std::io::Error) -> Self {
        Self::Stream(err.to_string())
    }
}
