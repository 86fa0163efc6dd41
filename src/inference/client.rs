//! Streaming model interface.
//!
//! A `ModelClient` is bound to one model and turns a system prompt plus the
//! conversation history into a lazy stream of [`StreamChunk`]s. Transport,
//! authentication and wire formats live in the provider adapters that
//! implement this trait; the agent loop only sees the normalized chunks.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};

use super::errors::InferenceError;
use super::types::{ModelSpec, StreamChunk};
use crate::agent_core::types::Message;

/// A finite, non-restartable sequence of response chunks.
pub type ChunkStream = BoxStream<'static, StreamChunk>;

#[async_trait]
pub trait ModelClient: Send + Sync {
    /// The model this client talks to, with its limits and prices.
    fn model(&self) -> ModelSpec;

    /// Open a response stream.
    ///
    /// Failing to open the stream is reported as `Err`; failures after the
    /// stream is open arrive as a [`StreamChunk::Error`].
    async fn create_message(
        &self,
        system_prompt: &str,
        messages: &[Message],
    ) -> Result<ChunkStream, InferenceError>;
}

/// Wrap an already-known chunk sequence as a [`ChunkStream`].
pub fn chunk_stream(chunks: Vec<StreamChunk>) -> ChunkStream {
    stream::iter(chunks).boxed()
}

/// Drain a stream and concatenate its text chunks.
///
/// Reasoning and usage chunks are skipped. The first error chunk aborts with
/// [`InferenceError::StreamError`].
pub async fn collect_text(mut stream: ChunkStream) -> Result<String, InferenceError> {
    let mut text = String::new();
    while let Some(chunk) = stream.next().await {
        match chunk {
            StreamChunk::Text { text: delta } => text.push_str(&delta),
            StreamChunk::Error { message } => {
                return Err(InferenceError::StreamError { reason: message });
            }
            StreamChunk::Reasoning { .. } | StreamChunk::Usage(_) => {}
        }
    }
    Ok(text)
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_collect_text_skips_reasoning_and_usage() {
        let stream = chunk_stream(vec![
            StreamChunk::reasoning("thinking"),
            StreamChunk::text("Hello, "),
            StreamChunk::usage(10, 3),
            StreamChunk::text("world"),
        ]);
        assert_eq!(collect_text(stream).await.unwrap(), "Hello, world");
    }

    #[tokio::test]
    async fn test_collect_text_stops_at_error() {
        let stream = chunk_stream(vec![
            StreamChunk::text("partial"),
            StreamChunk::error("connection reset"),
            StreamChunk::text("never seen"),
        ]);
        match collect_text(stream).await {
            Err(InferenceError::StreamError { reason }) => assert_eq!(reason, "connection reset"),
            other => panic!("expected stream error, got {other:?}"),
        }
    }
}
