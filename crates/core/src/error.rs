//! Error types for toolpass.
//!
//! Only harness-level failures surface as `Err` values. A fault raised by the
//! script itself is part of the pass outcome and travels inside the
//! `RunEnvelope` as a `FaultRecord`, never through this type.

use thiserror::Error;

/// Result type alias using toolpass's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for toolpass.
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Harness Errors (around script execution)
    // =========================================================================
    #[error("Harness error: {0}")]
    Harness(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // =========================================================================
    // Tool Executor Errors (driver side)
    // =========================================================================
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Tool execution failed: {0}")]
    ToolExecution(String),

    // =========================================================================
    // Convergence Errors (driver side)
    // =========================================================================
    #[error("Script did not converge after {passes} passes")]
    NonConvergence { passes: usize },

    // =========================================================================
    // Generic Errors
    // =========================================================================
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Create a harness error.
    pub fn harness(msg: impl Into<String>) -> Self {
        Self::Harness(msg.into())
    }

    /// Create an invalid request error.
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create a tool not found error.
    pub fn tool_not_found(name: impl Into<String>) -> Self {
        Self::ToolNotFound(name.into())
    }

    /// Create a tool execution error.
    pub fn tool_execution(msg: impl Into<String>) -> Self {
        Self::ToolExecution(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
