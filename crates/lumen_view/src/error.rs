//! Error types for view coordination

use lumen_presenter::{RehydrationError, RendererError};
use std::time::Duration;
use thiserror::Error;

/// Errors returned by the view coordinator and lifecycle bridge
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewError {
    /// The coordinator has no live session for this call yet
    #[error("View not ready")]
    NotReady,

    /// The coordinator was destroyed
    #[error("View already destroyed")]
    AlreadyDestroyed,

    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Context lost: {0}")]
    ContextLost(String),

    #[error("API key rejected: {0}")]
    ValidationRejected(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

impl From<RendererError> for ViewError {
    fn from(e: RendererError) -> Self {
        match e {
            RendererError::DeviceUnavailable(reason) => Self::DeviceUnavailable(reason),
            RendererError::ContextLost(reason) => Self::ContextLost(reason),
        }
    }
}

impl From<ConfigError> for ViewError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}

impl From<RehydrationError> for ViewError {
    fn from(e: RehydrationError) -> Self {
        Self::Config(e.to_string())
    }
}

/// Errors from loading a view configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type for view operations
pub type ViewResult<T> = Result<T, ViewError>;
