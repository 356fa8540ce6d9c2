//! Common error types for evcal

use thiserror::Error;

/// Common result type for evcal operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while loading configuration or opening the database
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed or holds an invalid value
    #[error("Configuration error: {0}")]
    Config(String),
}
