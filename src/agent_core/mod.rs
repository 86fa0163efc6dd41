//! Agent Core: the orchestration layer.
//!
//! Submodules:
//! - `runner`: The request/parse/execute loop and its event stream
//! - `approval`: Gates deciding whether a tool call may run
//! - `tools`: Built-in tool dispatch over file system and terminal capabilities
//! - `file_rules`: Ignore and write-protection rules for workspace paths
//! - `mcp`: MCP hub capability and the tool info it reports
//! - `prompt`: System prompt assembly and tool definitions
//! - `modes`: Built-in modes plus the stored custom-mode overlay
//! - `tool_groups`: Which tools each group grants
//! - `context`: Token budget and history truncation
//! - `condenser`: Model-written summaries of older conversation
//! - `tokens`: Token estimation for context window budgets
//! - `storage`: Key-value storage capability and the in-memory store
//! - `history`: Per-task message persistence
//! - `types`: Shared types across the agent core
//! - `errors`: Agent-level error types

pub mod approval;
pub mod condenser;
pub mod context;
pub mod errors;
pub mod file_rules;
pub mod history;
pub mod mcp;
pub mod modes;
pub mod prompt;
pub mod runner;
pub mod storage;
pub mod tokens;
pub mod tool_groups;
pub mod tools;
pub mod types;

// Re-exports for convenience
pub use approval::{
    ApprovalGate, ApprovalPolicy, ApprovalRequest, ApprovalResult, AutoApprovalGate,
    ChannelApprovalGate, PendingApproval, PolicyApprovalGate,
};
pub use condenser::{condense_messages, CondenseOptions, CondenseResult};
pub use context::{calculate_budget, truncate_history};
pub use errors::AgentError;
pub use file_rules::{FileRules, IgnoreRules, ProtectRules};
pub use history::MessageHistory;
pub use mcp::{McpHub, McpToolInfo};
pub use modes::{ModeConfig, ModePatch, ModeRegistry, ToolGroupEntry};
pub use prompt::{DefaultPromptBuilder, PromptContext, SystemPromptBuilder};
pub use runner::{AbortHandle, AgentRunner, RunnerDeps};
pub use storage::{get_typed, set_typed, InMemoryStorage, Storage};
pub use tool_groups::ToolGroup;
pub use tools::{
    CommandOutput, FileSystem, LocalFileSystem, ShellTerminal, Terminal, ToolError, ToolExecutor,
    WorkspaceToolExecutor,
};
pub use types::{
    AgentEvent, LoopState, Message, Role, TaskOutcome, TaskResult, TokenBudget, UsageTotals,
};
