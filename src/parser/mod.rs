//! Parsers for model output and user input.
//!
//! - `assistant_message`: tool-tag parser and its incremental variant
//! - `mentions`: `@`-mention tokenizer and resolution

pub mod assistant_message;
pub mod mentions;

pub use assistant_message::{
    parse_assistant_message, parse_partial_assistant_message, tool_uses, ParsedBlock,
    StreamingParser, ToolUseBlock, TOOL_NAMES,
};
pub use mentions::{
    parse_mentions, resolve_mentions, strip_mentions, MentionContextBlock, MentionKind,
    MentionResolver, MentionToken,
};
