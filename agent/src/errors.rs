//! Error types for deployhook

use thiserror::Error;

/// Main error type for deployhook
///
/// Failed deployments are not errors: they are reported through
/// [`crate::deploy::models::FailureReason`] inside an outcome. This enum
/// covers the cases where no outcome can be produced at all.
#[derive(Error, Debug)]
pub enum HookError {
    #[error("Deployment chain not found or empty: {0}")]
    ChainNotFound(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),
}
