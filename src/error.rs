//! Custom error types for the application.
//!
//! This module defines the primary error type, `SenseError`, for the entire
//! pipeline. Using the `thiserror` crate, it provides a centralized and
//! consistent way to handle the different kinds of errors that can occur,
//! from configuration and I/O issues to sensor and processing problems.
//!
//! Note that several conditions the pipeline encounters are deliberately NOT
//! errors: a full downstream channel (the publish is dropped), an empty
//! upstream channel (the consumer reuses its last-held value) and a failed
//! report call (logged, never retried) are all expected control flow.

use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, SenseError>;

/// Application-wide error type.
#[derive(Error, Debug)]
pub enum SenseError {
    /// Configuration file or environment parsing failed.
    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),

    /// Configuration parsed but contains semantically invalid values.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// File or network I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A sensor collaborator failed during read or release.
    #[error("Sensor error: {0}")]
    Sensor(String),

    /// A feature-extraction or fusion computation failed.
    #[error("Data processing error: {0}")]
    Processing(String),

    /// A tensor or feature window had an unexpected shape.
    #[error("Shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// Which operation detected the mismatch.
        context: &'static str,
        /// The shape the operation requires.
        expected: String,
        /// The shape it was handed.
        actual: String,
    },

    /// The report endpoint could not be reached or answered malformed data.
    #[error("Report call failed: {0}")]
    Report(#[from] reqwest::Error),

    /// WAV encoding failed in capture mode.
    #[error("WAV write error: {0}")]
    Wav(#[from] hound::Error),
}
