//! Error types for TrainHub

use thiserror::Error;

/// Main error type for TrainHub
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    /// Malformed input, rejected before any dispatch attempt
    #[error("Validation error: {0}")]
    Validation(String),

    /// A referenced template, bundle, discount or user is missing
    #[error("Not found: {0}")]
    NotFound(String),

    /// The record is not in a state that allows the operation
    #[error("State conflict: {0}")]
    StateConflict(String),

    /// Outbound email or campaign-launch failure; retried by the next sweep
    #[error("Transport error: {0}")]
    Transport(String),

    /// Inactive template, no eligible recipients and similar operator-fixable causes
    #[error("Configuration problem: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for TrainHub
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Config(_) => 500,
            Error::Database(_) => 500,
            Error::Validation(_) => 422,
            Error::NotFound(_) => 404,
            Error::StateConflict(_) => 409,
            Error::Transport(_) => 502,
            Error::Configuration(_) => 422,
            Error::Internal(_) => 500,
            Error::Other(_) => 500,
        }
    }

    /// Returns the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config(_) => "CONFIG_ERROR",
            Error::Database(_) => "DATABASE_ERROR",
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::NotFound(_) => "NOT_FOUND",
            Error::StateConflict(_) => "STATE_CONFLICT",
            Error::Transport(_) => "TRANSPORT_ERROR",
            Error::Configuration(_) => "CONFIGURATION_ERROR",
            Error::Internal(_) => "INTERNAL_ERROR",
            Error::Other(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the next sweep may succeed without operator action
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Database(_))
    }
}
