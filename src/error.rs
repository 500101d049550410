//! Application-level errors for the `serial-flow` binary.

use crate::config::ConfigError;
use crate::port::PortError;
use thiserror::Error;

/// Unified application error type.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Port(#[from] PortError),

    #[error("Failed to initialise logging: {0}")]
    Logging(String),

    #[error("A serialization error occurred: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// A specialized `Result` type for the application layer.
pub type AppResult<T> = Result<T, AppError>;
