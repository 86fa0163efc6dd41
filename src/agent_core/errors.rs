//! Agent Core error types.

use thiserror::Error;

use crate::inference::InferenceError;

/// Errors that can occur during agent core operations.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Invalid runner or provider configuration, detected at construction.
    #[error("configuration error: {reason}")]
    ConfigurationError { reason: String },

    /// The model stream failed to open or reported an error.
    #[error("stream error: {reason}")]
    StreamError { reason: String },

    /// A storage backend operation failed.
    #[error("storage error: {reason}")]
    StorageError { reason: String },

    /// Serialization error.
    #[error("serialization error: {reason}")]
    SerializationError { reason: String },

    /// No built-in or custom mode with this slug.
    #[error("mode not found: '{slug}'")]
    ModeNotFound { slug: String },

    /// A custom mode with this slug already exists.
    #[error("custom mode '{slug}' already exists")]
    ModeAlreadyExists { slug: String },

    /// Built-in modes cannot be deleted.
    #[error("cannot delete built-in mode '{slug}'; update it to override instead")]
    BuiltinModeProtected { slug: String },
}

impl From<serde_json::Error> for AgentError {
    fn from(e: serde_json::Error) -> Self {
        AgentError::SerializationError {
            reason: e.to_string(),
        }
    }
}

impl From<InferenceError> for AgentError {
    fn from(e: InferenceError) -> Self {
        match e {
            InferenceError::StreamError { reason } => AgentError::StreamError { reason },
            other => AgentError::ConfigurationError {
                reason: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inference_errors_map_by_kind() {
        let stream: AgentError = InferenceError::StreamError {
            reason: "timeout".into(),
        }
        .into();
        assert!(matches!(stream, AgentError::StreamError { reason } if reason == "timeout"));

        let config: AgentError = InferenceError::UnknownProvider {
            name: "skynet".into(),
        }
        .into();
        assert!(matches!(config, AgentError::ConfigurationError { .. }));
    }

    #[test]
    fn test_builtin_protected_message() {
        let err = AgentError::BuiltinModeProtected {
            slug: "code".into(),
        };
        assert!(err.to_string().contains("built-in mode 'code'"));
    }
}
