//! Shared types for the streaming model interface.
//!
//! Every provider adapter normalizes its wire format into these types, so the
//! agent loop sees one uniform chunk sequence regardless of the backend.

use serde::{Deserialize, Serialize};

// ─── Stream Types ────────────────────────────────────────────────────────────

/// Token counts reported by a provider for one request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_read_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_write_tokens: Option<u64>,
}

impl TokenUsage {
    /// Usage without any prompt-cache accounting.
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            cache_read_tokens: None,
            cache_write_tokens: None,
        }
    }
}

/// A single element of a model's response sequence.
///
/// The sequence is lazy, finite and non-restartable. An `Error` chunk ends the
/// useful part of the stream; the agent loop stops consuming after it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamChunk {
    /// Visible answer text.
    Text { text: String },
    /// Chain-of-thought text; forwarded to observers, never stored in history.
    Reasoning { text: String },
    /// Token accounting for the request.
    Usage(TokenUsage),
    /// Provider or network failure.
    Error { message: String },
}

impl StreamChunk {
    pub fn text(text: impl Into<String>) -> Self {
        StreamChunk::Text { text: text.into() }
    }

    pub fn reasoning(text: impl Into<String>) -> Self {
        StreamChunk::Reasoning { text: text.into() }
    }

    pub fn usage(input_tokens: u64, output_tokens: u64) -> Self {
        StreamChunk::Usage(TokenUsage::new(input_tokens, output_tokens))
    }

    pub fn error(message: impl Into<String>) -> Self {
        StreamChunk::Error {
            message: message.into(),
        }
    }
}

// ─── Model Metadata ──────────────────────────────────────────────────────────

/// Capabilities, limits and per-million-token prices of a model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    /// Tokens reserved for the model's response.
    pub max_tokens: u32,
    /// Total context window size in tokens.
    pub context_window: u32,
    #[serde(default)]
    pub supports_images: bool,
    #[serde(default)]
    pub supports_computer_use: bool,
    #[serde(default)]
    pub supports_prompt_cache: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_writes_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_reads_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub thinking: bool,
}

impl ModelInfo {
    /// A model with the given limits and no pricing information.
    pub fn with_limits(context_window: u32, max_tokens: u32) -> Self {
        Self {
            max_tokens,
            context_window,
            ..Self::default()
        }
    }
}

/// The model a client is bound to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub id: String,
    pub info: ModelInfo,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_chunk_serialization() {
        let json = serde_json::to_string(&StreamChunk::text("hi")).unwrap();
        assert_eq!(json, r#"{"type":"text","text":"hi"}"#);

        let json = serde_json::to_string(&StreamChunk::usage(10, 2)).unwrap();
        assert_eq!(json, r#"{"type":"usage","inputTokens":10,"outputTokens":2}"#);
    }

    #[test]
    fn test_usage_chunk_deserializes_cache_fields() {
        let chunk: StreamChunk = serde_json::from_str(
            r#"{"type":"usage","inputTokens":100,"outputTokens":5,"cacheReadTokens":40}"#,
        )
        .unwrap();
        match chunk {
            StreamChunk::Usage(usage) => {
                assert_eq!(usage.cache_read_tokens, Some(40));
                assert_eq!(usage.cache_write_tokens, None);
            }
            other => panic!("expected usage chunk, got {other:?}"),
        }
    }

    #[test]
    fn test_model_info_defaults_from_json() {
        let info: ModelInfo =
            serde_json::from_str(r#"{"maxTokens":8192,"contextWindow":200000}"#).unwrap();
        assert_eq!(info.context_window, 200_000);
        assert!(info.input_price.is_none());
        assert!(!info.supports_images);
    }
}
