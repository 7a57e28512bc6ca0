//! Unified error types for Flux

use thiserror::Error;

use crate::RequestState;

/// Unified error type for all Flux operations
#[derive(Error, Debug)]
pub enum FluxError {
    // Caller input errors
    #[error("Malformed specification: {0}")]
    MalformedSpec(String),

    // Lifecycle errors
    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition {
        from: RequestState,
        to: RequestState,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    // Routing errors
    #[error("Semantic classifier timed out after {0} ms")]
    RouterTimeout(u64),

    #[error("Classifier error: {0}")]
    Classifier(String),

    // Execution errors
    #[error("Specialist '{specialist}' failed: {detail}")]
    Specialist { specialist: String, detail: String },

    // Persistence errors
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(String),
}

impl FluxError {
    /// Build a specialist failure from a specialist name and any error detail
    pub fn specialist(specialist: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Specialist {
            specialist: specialist.into(),
            detail: detail.into(),
        }
    }
}

/// Result type alias using FluxError
pub type Result<T> = std::result::Result<T, FluxError>;
