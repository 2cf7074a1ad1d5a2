//! Common error types for READLAB

use thiserror::Error;

/// Common result type for READLAB operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the study backend
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration or content-catalog error (deployment problem, not a
    /// per-request one)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested session, passage, or vocabulary item not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for the "session not found" condition every
    /// session-addressed operation must surface.
    pub fn session_not_found(session_id: &str) -> Self {
        Error::NotFound(format!("Session not found: {}", session_id))
    }
}
