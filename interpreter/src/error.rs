use std::io;

use crate::session::SessionState;

/// Failures signalled by an editor/workspace capability.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CapabilityError {
    #[error("file not found: {0}")]
    NotFound(String),

    #[error("position {line}:{column} is outside {path} ({line_count} lines)")]
    OutOfRange {
        path: String,
        line: usize,
        column: usize,
        line_count: usize,
    },

    #[error("I/O error: {0}")]
    Io(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unsupported operation: {0}")]
    Unsupported(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CapabilityError {
    pub fn from_io(path: &str, error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound => CapabilityError::NotFound(path.to_string()),
            _ => CapabilityError::Io(format!("{}: {}", path, error)),
        }
    }
}

/// Errors that abort a command batch.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExecuteError {
    #[error("@{command}: no active document")]
    NoActiveDocument { command: String },

    #[error("@{command}: {message}")]
    InvalidArguments { command: String, message: String },

    #[error("@{command}: {source}")]
    Capability {
        command: String,
        #[source]
        source: CapabilityError,
    },
}

impl ExecuteError {
    /// Recoverable errors are reported back to the model; anything else is a
    /// programming or environment fault and is re-raised by the driver.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            ExecuteError::Capability {
                source: CapabilityError::Internal(_),
                ..
            }
        )
    }
}

/// A batch that stopped at its first failing command.
#[derive(Debug, thiserror::Error)]
#[error("command {index} failed: {error}")]
pub struct BatchAborted {
    /// Session state after the last command that completed.
    pub state: SessionState,
    /// Index of the failing command within the batch.
    pub index: usize,
    #[source]
    pub error: ExecuteError,
}
