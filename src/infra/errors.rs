// src/infra/errors.rs — Error types for goalforge

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GoalForgeError {
    // Planning errors (surfaced before any execution)
    #[error("Planning failed: {reason}")]
    Planning { reason: String },

    #[error("Invalid task graph: {0}")]
    InvalidGraph(String),

    // Provider errors (retriable per task)
    #[error("Provider '{provider}' error: {message}")]
    Provider {
        provider: String,
        message: String,
        retriable: bool,
    },

    #[error("Rate limited by '{provider}', retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: u64,
    },

    #[error("Provider '{provider}' timed out after {after_ms}ms")]
    Timeout { provider: String, after_ms: u64 },

    #[error("Provider '{provider}' returned malformed output: {message}")]
    MalformedOutput { provider: String, message: String },

    #[error("Provider '{provider}' is not registered")]
    UnknownProvider { provider: String },

    // Validator call failures (never fatal, degrade to pass-through)
    #[error("Validation error: {0}")]
    Validation(String),

    // Infra
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GoalForgeError {
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            GoalForgeError::Provider {
                retriable: true,
                ..
            } | GoalForgeError::RateLimited { .. }
                | GoalForgeError::Timeout { .. }
        )
    }

    pub fn planning(reason: impl Into<String>) -> Self {
        GoalForgeError::Planning {
            reason: reason.into(),
        }
    }

    /// Provider id the error originated from, if any.
    pub fn provider(&self) -> Option<&str> {
        match self {
            GoalForgeError::Provider { provider, .. }
            | GoalForgeError::RateLimited { provider, .. }
            | GoalForgeError::Timeout { provider, .. }
            | GoalForgeError::MalformedOutput { provider, .. }
            | GoalForgeError::UnknownProvider { provider } => Some(provider),
            _ => None,
        }
    }
}
