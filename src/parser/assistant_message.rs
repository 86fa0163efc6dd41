//! Assistant output parsing: splits free-form model text into text and tool blocks.
//!
//! The model invokes tools by writing XML-like tags from a fixed alphabet:
//!
//! ```text
//! I'll read that file.
//! <read_file>
//! <path>src/main.rs</path>
//! </read_file>
//! ```
//!
//! Only tag names in [`TOOL_NAMES`] open a tool block; any other `<tag>` is
//! plain text. There is a single nesting level: inside a tool body every
//! `<key>` opens a parameter, whatever its name.
//!
//! Parsing never fails. A tool tag whose closing tag has not arrived yet is
//! emitted as a `partial` block and ends the parse, which is what makes the
//! same function usable on a response that is still streaming.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ─── Tool Alphabet ───────────────────────────────────────────────────────────

/// Every tag name that opens a tool block.
pub const TOOL_NAMES: &[&str] = &[
    "execute_command",
    "read_file",
    "write_to_file",
    "apply_diff",
    "insert_content",
    "search_and_replace",
    "search_files",
    "list_files",
    "list_code_definition_names",
    "browser_action",
    "use_mcp_tool",
    "access_mcp_resource",
    "ask_followup_question",
    "attempt_completion",
    "switch_mode",
    "new_task",
];

/// Whether `name` is part of the tool alphabet.
pub fn is_tool_name(name: &str) -> bool {
    TOOL_NAMES.contains(&name)
}

// ─── Block Types ─────────────────────────────────────────────────────────────

/// A tool invocation found in assistant text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolUseBlock {
    pub name: String,
    pub params: HashMap<String, String>,
    /// `true` when the closing tag was never seen.
    #[serde(default)]
    pub partial: bool,
}

impl ToolUseBlock {
    /// Look up a parameter value.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

/// One ordered segment of a parsed assistant response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParsedBlock {
    Text { content: String },
    ToolUse(ToolUseBlock),
}

impl ParsedBlock {
    pub fn as_tool_use(&self) -> Option<&ToolUseBlock> {
        match self {
            ParsedBlock::ToolUse(tool) => Some(tool),
            ParsedBlock::Text { .. } => None,
        }
    }

    pub fn is_partial(&self) -> bool {
        matches!(self, ParsedBlock::ToolUse(ToolUseBlock { partial: true, .. }))
    }
}

/// Collect the tool-use blocks of a parse result, in order.
pub fn tool_uses(blocks: &[ParsedBlock]) -> Vec<&ToolUseBlock> {
    blocks.iter().filter_map(ParsedBlock::as_tool_use).collect()
}

// ─── Parsing ─────────────────────────────────────────────────────────────────

/// Parse a complete assistant response into ordered blocks.
pub fn parse_assistant_message(text: &str) -> Vec<ParsedBlock> {
    parse_region(text).0
}

/// Parse a response that may still be streaming.
///
/// Same contract as [`parse_assistant_message`]; the last block may be a
/// partial tool block.
pub fn parse_partial_assistant_message(text: &str) -> Vec<ParsedBlock> {
    parse_assistant_message(text)
}

/// Parse `text` and report how many leading bytes are settled.
///
/// The settled length is the end of the last closed tool tag. Appending more
/// text can never change the blocks produced for that prefix.
fn parse_region(text: &str) -> (Vec<ParsedBlock>, usize) {
    let mut blocks = Vec::new();
    let mut cursor = 0;
    let mut settled = 0;

    while let Some(tag) = find_open_tag(text, cursor, is_tool_name) {
        if tag.start > cursor {
            blocks.push(ParsedBlock::Text {
                content: text[cursor..tag.start].to_string(),
            });
        }

        let closing = format!("</{}>", tag.name);
        match text[tag.content_start..].find(&closing) {
            Some(offset) => {
                let body_end = tag.content_start + offset;
                blocks.push(ParsedBlock::ToolUse(ToolUseBlock {
                    name: tag.name.to_string(),
                    params: parse_tool_params(&text[tag.content_start..body_end]),
                    partial: false,
                }));
                cursor = body_end + closing.len();
                settled = cursor;
            }
            None => {
                blocks.push(ParsedBlock::ToolUse(ToolUseBlock {
                    name: tag.name.to_string(),
                    params: parse_tool_params(&text[tag.content_start..]),
                    partial: true,
                }));
                return (blocks, settled);
            }
        }
    }

    if cursor < text.len() {
        blocks.push(ParsedBlock::Text {
            content: text[cursor..].to_string(),
        });
    }

    (blocks, settled)
}

/// Parse the body of a tool tag into parameters.
///
/// Each `<key>` runs to the first `</key>`, or to the end of the body when it
/// is never closed. Later duplicates overwrite earlier ones.
fn parse_tool_params(body: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    let mut cursor = 0;

    while let Some(tag) = find_open_tag(body, cursor, |_| true) {
        let closing = format!("</{}>", tag.name);
        let (raw, next) = match body[tag.content_start..].find(&closing) {
            Some(offset) => {
                let end = tag.content_start + offset;
                (&body[tag.content_start..end], end + closing.len())
            }
            None => (&body[tag.content_start..], body.len()),
        };

        params.insert(tag.name.to_string(), trim_single_newlines(raw).to_string());
        cursor = next;
    }

    params
}

/// Strip one leading and one trailing `\n`, nothing more.
fn trim_single_newlines(value: &str) -> &str {
    let value = value.strip_prefix('\n').unwrap_or(value);
    value.strip_suffix('\n').unwrap_or(value)
}

struct TagMatch<'a> {
    name: &'a str,
    start: usize,
    content_start: usize,
}

/// Find the first `<name>` at or after `from` with `name` in `[a-z_]+` and
/// accepted by `accept`.
fn find_open_tag<'a>(
    text: &'a str,
    from: usize,
    accept: impl Fn(&str) -> bool,
) -> Option<TagMatch<'a>> {
    let bytes = text.as_bytes();
    let mut search_from = from;

    while let Some(offset) = text[search_from..].find('<') {
        let start = search_from + offset;
        let name_start = start + 1;
        let mut i = name_start;
        while i < bytes.len() && (bytes[i].is_ascii_lowercase() || bytes[i] == b'_') {
            i += 1;
        }

        if i > name_start && i < bytes.len() && bytes[i] == b'>' {
            let name = &text[name_start..i];
            if accept(name) {
                return Some(TagMatch {
                    name,
                    start,
                    content_start: i + 1,
                });
            }
        }

        search_from = name_start;
    }

    None
}

// ─── Incremental Parsing ─────────────────────────────────────────────────────

/// Incremental parser for a response that arrives in chunks.
///
/// Closed tool blocks (and the text before them) are cached once seen; each
/// [`push`](Self::push) re-parses only the open tail. At every point
/// [`blocks`](Self::blocks) equals `parse_assistant_message` of everything
/// pushed so far.
#[derive(Debug, Default)]
pub struct StreamingParser {
    buffer: String,
    settled: Vec<ParsedBlock>,
    settled_len: usize,
    tail: Vec<ParsedBlock>,
}

impl StreamingParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk of model output.
    pub fn push(&mut self, chunk: &str) {
        if chunk.is_empty() {
            return;
        }
        self.buffer.push_str(chunk);

        let (mut blocks, consumed) = parse_region(&self.buffer[self.settled_len..]);
        if consumed > 0 {
            // Everything up to and including the last closed tool block is final.
            let split = blocks
                .iter()
                .rposition(|b| matches!(b, ParsedBlock::ToolUse(t) if !t.partial))
                .map(|i| i + 1)
                .unwrap_or(0);
            let tail = blocks.split_off(split);
            self.settled.extend(blocks);
            self.settled_len += consumed;
            self.tail = tail;
        } else {
            self.tail = blocks;
        }
    }

    /// The blocks parsed from all text pushed so far.
    pub fn blocks(&self) -> Vec<ParsedBlock> {
        self.settled.iter().chain(self.tail.iter()).cloned().collect()
    }

    /// Everything pushed so far.
    pub fn text(&self) -> &str {
        &self.buffer
    }

    /// Consume the parser, returning the accumulated text and its blocks.
    pub fn finish(mut self) -> (String, Vec<ParsedBlock>) {
        self.settled.append(&mut self.tail);
        (self.buffer, self.settled)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
