//! Shared types for the agent core.
//!
//! Conversation messages, agent events, loop states and task results used
//! across the context manager, condenser, history store and runner.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Conversation Messages ──────────────────────────────────────────────────

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Base64 image payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSource {
    #[serde(rename = "type", default = "default_image_source_type")]
    pub source_type: String,
    pub media_type: String,
    pub data: String,
}

fn default_image_source_type() -> String {
    "base64".to_string()
}

/// Content of a tool result: plain text or nested blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolResultContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// One structured piece of message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Image {
        source: ImageSource,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: ToolResultContent,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
}

/// Message body: a plain string or ordered blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl MessageContent {
    /// The text blocks joined by newlines; the whole string for plain content.
    pub fn text(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// A single message in conversation history. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self::text(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::text(Role::Assistant, text)
    }

    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: MessageContent::Text(text.into()),
            timestamp: Utc::now(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// See [`MessageContent::text`].
    pub fn text_content(&self) -> String {
        self.content.text()
    }
}

// ─── Agent Events ───────────────────────────────────────────────────────────

/// Observable progress of a task, in generation order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    TextDelta {
        text: String,
    },
    ReasoningDelta {
        text: String,
    },
    ToolRequest {
        tool: String,
        params: HashMap<String, String>,
    },
    ToolResult {
        tool: String,
        result: String,
        success: bool,
    },
    TaskComplete {
        result: String,
    },
    #[serde(rename_all = "camelCase")]
    CostUpdate {
        total_cost: f64,
        input_tokens: u64,
        output_tokens: u64,
    },
    ModeSwitch {
        from: String,
        to: String,
    },
    Error {
        message: String,
    },
}

// ─── Loop State ─────────────────────────────────────────────────────────────

/// Where the runner is in its request/parse/execute cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    Idle,
    Requesting,
    Streaming,
    Parsing,
    ExecutingTools,
    AwaitingInput,
    Completed,
    Aborted,
    Failed,
}

impl LoopState {
    pub fn is_terminal(self) -> bool {
        matches!(self, LoopState::Completed | LoopState::Aborted | LoopState::Failed)
    }
}

/// How a `run_task` call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskOutcome {
    /// The model invoked `attempt_completion`.
    Completed,
    /// A round produced no tool use; the conversation can be continued.
    AwaitingInput,
    Aborted,
    RequestLimitReached,
    /// The model stream failed.
    Failed,
}

/// Cumulative usage across every round a runner has made.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageTotals {
    pub total_cost: f64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub request_count: u32,
}

/// Summary returned by `AgentRunner::run_task`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub success: bool,
    /// Completion text, or the error message on failure.
    pub result: Option<String>,
    pub outcome: TaskOutcome,
    pub total_cost: f64,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub request_count: u32,
    pub messages: Vec<Message>,
}

// ─── Budget ─────────────────────────────────────────────────────────────────

/// How the context window is split for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBudget {
    pub context_window: u32,
    pub system_prompt_tokens: u32,
    pub history_tokens: u32,
    pub reserved_for_response: u32,
    /// May be negative.
    pub available: i64,
    pub is_over_budget: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_block_tags() {
        let block = ContentBlock::ToolResult {
            tool_use_id: "t1".into(),
            content: ToolResultContent::Text("ok".into()),
            is_error: false,
        };
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["type"], "tool_result");
        assert!(json.get("is_error").is_none());
    }

    #[test]
    fn test_message_content_untagged() {
        let msg: Message = serde_json::from_str(
            r#"{"role":"user","content":[{"type":"text","text":"a"},{"type":"text","text":"b"}],
                "timestamp":"2025-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(msg.text_content(), "a\nb");

        let msg: Message = serde_json::from_str(
            r#"{"role":"assistant","content":"hi","timestamp":"2025-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(msg.content, MessageContent::Text("hi".into()));
    }

    #[test]
    fn test_event_serialization() {
        let event = AgentEvent::CostUpdate {
            total_cost: 0.5,
            input_tokens: 10,
            output_tokens: 2,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "cost_update");
        assert_eq!(json["totalCost"], 0.5);
    }

    #[test]
    fn test_terminal_states() {
        assert!(LoopState::Failed.is_terminal());
        assert!(!LoopState::AwaitingInput.is_terminal());
    }
}
