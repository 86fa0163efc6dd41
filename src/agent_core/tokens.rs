//! Token estimation for context window management.
//!
//! Uses the ~4 characters per token heuristic. Characters are Unicode scalar
//! values, not bytes, so non-ASCII text is not over-counted. A provider
//! tokenizer can replace this without changing callers.

use super::types::{ContentBlock, Message, MessageContent, ToolResultContent};

// ─── Constants ──────────────────────────────────────────────────────────────

/// Average characters per token.
const CHARS_PER_TOKEN: usize = 4;

/// Per-message overhead (role label, formatting tokens).
const MESSAGE_OVERHEAD_TOKENS: u32 = 4;

/// Flat estimate for one image block.
const IMAGE_TOKENS: u32 = 1000;

// ─── UTF-8 Safe Truncation ──────────────────────────────────────────────────

/// Truncate a string to at most `max_bytes` bytes on a valid UTF-8 char boundary.
///
/// If the byte at `max_bytes` is inside a multi-byte character, the slice is
/// shortened to the preceding character boundary.
pub(crate) fn truncate_utf8(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

// ─── Public API ─────────────────────────────────────────────────────────────

/// `ceil(chars / 4)`.
pub fn estimate_tokens(text: &str) -> u32 {
    text.chars().count().div_ceil(CHARS_PER_TOKEN) as u32
}

/// Estimate the token count for a message, including role overhead.
pub fn estimate_message_tokens(message: &Message) -> u32 {
    let content = match &message.content {
        MessageContent::Text(text) => estimate_tokens(text),
        MessageContent::Blocks(blocks) => blocks.iter().map(estimate_block_tokens).sum(),
    };
    MESSAGE_OVERHEAD_TOKENS + content
}

/// Sum of [`estimate_message_tokens`] over `messages`.
pub fn estimate_history_tokens(messages: &[Message]) -> u32 {
    messages.iter().map(estimate_message_tokens).sum()
}

fn estimate_block_tokens(block: &ContentBlock) -> u32 {
    match block {
        ContentBlock::Text { text } => estimate_tokens(text),
        ContentBlock::Image { .. } => IMAGE_TOKENS,
        ContentBlock::ToolUse { name, input, .. } => {
            estimate_tokens(name) + estimate_tokens(&input.to_string())
        }
        ContentBlock::ToolResult { content, .. } => match content {
            ToolResultContent::Text(text) => estimate_tokens(text),
            ToolResultContent::Blocks(blocks) => {
                estimate_tokens(&serde_json::to_string(blocks).unwrap_or_default())
            }
        },
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
