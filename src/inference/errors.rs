//! Inference error types.
//!
//! All errors implement `std::error::Error` via `thiserror`. Structured logging
//! is the caller's responsibility; these types carry the context needed to build
//! meaningful log entries.

use thiserror::Error;

/// Errors that can occur while configuring or talking to a model provider.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// The provider failed to open or continue a response stream.
    #[error("stream error: {reason}")]
    StreamError {
        reason: String,
    },

    /// Configuration loading or validation error.
    #[error("config error: {reason}")]
    ConfigError {
        reason: String,
    },

    /// A provider tag that is not part of the closed provider set.
    #[error("unknown API provider: {name}")]
    UnknownProvider {
        name: String,
    },

    /// A provider that needs a credential was configured without one.
    #[error("missing {field} for provider '{provider}'")]
    MissingCredential {
        provider: String,
        field: String,
    },
}

impl InferenceError {
    /// Whether this error should abort construction (as opposed to a single request).
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            InferenceError::ConfigError { .. }
                | InferenceError::UnknownProvider { .. }
                | InferenceError::MissingCredential { .. }
        )
    }
}
