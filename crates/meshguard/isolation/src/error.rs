//! Error types for the isolation engine.
//!
//! Expected conditions (unknown peer, refused release) are plain return
//! values, never errors; this enum covers genuine misuse.

use meshguard_types::IsolationReason;
use thiserror::Error;

/// Errors that can occur while configuring the isolation engine.
#[derive(Debug, Error)]
pub enum IsolationError {
    /// A custom policy failed validation.
    #[error("invalid policy for {reason}: {detail}")]
    InvalidPolicy {
        reason: IsolationReason,
        detail: String,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Result type for isolation operations.
pub type IsolationResult<T> = Result<T, IsolationError>;
