//! Error types for tasksync
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (unknown task, invalid fields, bad config)
//! - 4: Operation failed (I/O, serialization, watcher setup)

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the tasksync CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for tasksync operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Task not found: {0}")]
    NotFound(String),

    #[error("Invalid task: {0}")]
    Validation(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Workspace not initialized: {0}")]
    WorkspaceNotFound(PathBuf),

    // Operation failures (exit code 4)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::NotFound(_)
            | Error::Validation(_)
            | Error::InvalidConfig(_)
            | Error::InvalidArgument(_)
            | Error::WorkspaceNotFound(_) => exit_codes::USER_ERROR,

            Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::Watch(_)
            | Error::OperationFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }
}

/// Result type alias for tasksync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wrapper for displaying errors in JSON format
#[derive(serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub code: i32,
}

impl From<&Error> for JsonError {
    fn from(err: &Error) -> Self {
        JsonError {
            error: err.to_string(),
            code: err.exit_code(),
        }
    }
}
