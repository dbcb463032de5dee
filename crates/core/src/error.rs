//! Error types for the inferlog domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each external collaborator has its own error enum.

use thiserror::Error;

/// The top-level error type for a run.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Completion failed: {0}")]
    Provider(#[from] ProviderError),

    // --- Audit errors ---
    #[error("Audit logging failed: {0}")]
    Audit(#[from] AuditError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Output sink ---
    #[error("Failed to write output: {0}")]
    Output(#[from] std::io::Error),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited or quota exhausted: {message}")]
    RateLimited { message: String },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum AuditError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Audit service rejected the request: {status}: {summary} (status: {status_code})")]
    ApiError {
        status_code: u16,
        status: String,
        summary: String,
    },

    #[error("Invalid audit service response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Failed to serialize audit event: {0}")]
    Serialization(String),
}
