//! Error types for the context window engine

use thiserror::Error;

/// Errors surfaced to the calling application
#[derive(Debug, Error)]
pub enum ContextError {
    /// Invalid configuration, rejected before any reduction work is done
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Strategy name that does not match any of the five known strategies
    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),

    /// Collaborator summary store read/write failure; hard error for the turn
    #[error("Summary store unavailable: {0}")]
    Store(String),

    /// Text generation failure where no fallback applies
    #[error("Text generation failed: {0}")]
    Generation(String),
}

pub type Result<T, E = ContextError> = std::result::Result<T, E>;
