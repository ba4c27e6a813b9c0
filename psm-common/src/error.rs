//! Common error types for PSM services

use thiserror::Error;

/// Common result type for PSM operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across PSM services
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Operation conflicts with the current state of a record
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True when SQLite reported lock contention (safe to retry)
    pub fn is_database_locked(&self) -> bool {
        match self {
            Error::Database(db_err) => {
                let message = db_err.to_string();
                message.contains("database is locked") || message.contains("database table is locked")
            }
            _ => false,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Internal(format!("JSON column error: {}", err))
    }
}

impl From<uuid::Error> for Error {
    fn from(err: uuid::Error) -> Self {
        Error::Internal(format!("Invalid stored identifier: {}", err))
    }
}
