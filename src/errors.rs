//! Unified error types for the telemetry crate.
//!
//! All fallible operations return [`Result`] with this crate's [`Error`].
//! Note that the tracking path itself (`ErrorAggregator::track`) deliberately
//! does not surface these errors to callers; they are logged and swallowed so
//! that observing an error can never become a new source of failure.

use thiserror::Error;

/// Errors produced by configuration loading and storage operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration file could not be read or parsed
    #[error("Configuration error: {message}")]
    Config {
        /// Human-readable description of what went wrong
        message: String,
    },

    /// Underlying database error from `SeaORM`
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// JSON encoding or decoding failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error (configuration file access)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience `Result` type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;
