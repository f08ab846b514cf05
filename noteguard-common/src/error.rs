//! Common error types for NoteGuard

use thiserror::Error;

/// Common result type for NoteGuard operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across NoteGuard crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Timestamp or civil date/time that could not be parsed
    #[error("Time parse error: {0}")]
    TimeParse(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input or record field
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
