//! Error types for slate
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad args, invalid title, unknown task or status)
//! - 3: Conflict (slug contention not resolved within the retry budget)
//! - 4: Operation failed (io, serialization, lock timeout)

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the slate CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const CONFLICT: i32 = 3;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for slate operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("No slate ledger in {0}")]
    NotInitialized(PathBuf),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid title: {0}")]
    InvalidTitle(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Unknown status '{0}'")]
    UnknownStatus(String),

    // Conflicts (exit code 3)
    #[error("Slug allocation for '{0}' kept losing to concurrent writers")]
    SlugConflict(String),

    // Operation failures (exit code 4)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            // User errors
            Error::NotInitialized(_)
            | Error::InvalidConfig(_)
            | Error::InvalidArgument(_)
            | Error::InvalidTitle(_)
            | Error::TaskNotFound(_)
            | Error::UnknownStatus(_) => exit_codes::USER_ERROR,

            // Conflicts
            Error::SlugConflict(_) => exit_codes::CONFLICT,

            // Operation failures
            Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::LockFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Structured payload for JSON error envelopes
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::SlugConflict(base) => Some(serde_json::json!({ "base": base })),
            Error::UnknownStatus(status) => {
                Some(serde_json::json!({ "status": status }))
            }
            _ => None,
        }
    }
}

/// Result type alias for slate operations
pub type Result<T> = std::result::Result<T, Error>;
