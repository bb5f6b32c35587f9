//! Error types for the WhatsApp webhook receiver
//!
//! This module provides the error hierarchy used across the crate, built with
//! `thiserror`. Failures that belong to the remote caller (handshake mismatch)
//! are not errors here; they are ordinary `403` responses.

use thiserror::Error;

/// The main error type for webhook receiver operations
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration could not be loaded or validated
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O errors (binding the listener, serving)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration errors, raised once at startup
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The verification secret is not set
    #[error("VERIFY_TOKEN environment variable not set")]
    MissingVerifyToken,

    /// The verification secret is set but empty
    #[error("VERIFY_TOKEN cannot be empty")]
    EmptyVerifyToken,

    /// A numeric setting could not be parsed
    #[error("Invalid value for {name}: {reason}")]
    InvalidValue {
        /// Environment variable name
        name: &'static str,
        /// Why the value was rejected
        reason: String,
    },
}

/// Reasons the detached-task mechanism could not accept a task
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// No async runtime is reachable from the calling context
    #[error("no async runtime available to spawn on")]
    NoRuntime,

    /// The spawner is shutting down or otherwise refusing work
    #[error("spawner rejected task: {0}")]
    Rejected(String),
}

/// Result type alias for webhook receiver operations
pub type Result<T> = std::result::Result<T, Error>;
