//! The agent loop.
//!
//! One [`AgentRunner`] drives one task:
//!
//! ```text
//! user message → system prompt → model stream → parse → tools → fold results
//!       ↑                                                            │
//!       └──────────────────────── next round ───────────────────────┘
//! ```
//!
//! A round ends the task when the model calls `attempt_completion`, when the
//! response holds no tool use, when the stream fails, when the request limit
//! is reached, or when an abort was requested before the round started.
//! Everything observable is published as [`AgentEvent`]s in the order it
//! happens.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::inference::client::ModelClient;
use crate::inference::config::RunnerConfig;
use crate::inference::pricing::{Pricing, StandardPricing};
use crate::inference::types::{ModelInfo, StreamChunk};
use crate::parser::{ParsedBlock, StreamingParser, ToolUseBlock};

use super::approval::{ApprovalGate, ApprovalRequest, ApprovalResult, AutoApprovalGate};
use super::condenser::{condense_messages, CondenseOptions, CondenseResult};
use super::context::truncate_history;
use super::errors::AgentError;
use super::history::MessageHistory;
use super::mcp::McpHub;
use super::modes::{ModeConfig, ModeRegistry, DEFAULT_MODE_SLUG};
use super::prompt::{DefaultPromptBuilder, PromptContext, SystemPromptBuilder};
use super::storage::Storage;
use super::tokens::truncate_utf8;
use super::tool_groups::tools_for_groups;
use super::tools::{ToolError, ToolExecutor};
use super::types::{AgentEvent, LoopState, Message, TaskOutcome, TaskResult, UsageTotals};

// ─── Dependencies ───────────────────────────────────────────────────────────

/// The capabilities a runner is built from.
#[derive(Clone)]
pub struct RunnerDeps {
    pub model: Arc<dyn ModelClient>,
    pub approval: Arc<dyn ApprovalGate>,
    pub executor: Arc<dyn ToolExecutor>,
    /// Backs the mode registry.
    pub storage: Arc<dyn Storage>,
    pub pricing: Arc<dyn Pricing>,
    pub prompt_builder: Arc<dyn SystemPromptBuilder>,
    /// Source of the MCP tool list shown in the prompt. Calls themselves go
    /// through the executor.
    pub mcp_hub: Option<Arc<dyn McpHub>>,
}

impl RunnerDeps {
    /// Auto-approval, standard pricing and the default prompt.
    pub fn new(
        model: Arc<dyn ModelClient>,
        executor: Arc<dyn ToolExecutor>,
        storage: Arc<dyn Storage>,
    ) -> Self {
        Self {
            model,
            approval: Arc::new(AutoApprovalGate),
            executor,
            storage,
            pricing: Arc::new(StandardPricing),
            prompt_builder: Arc::new(DefaultPromptBuilder),
            mcp_hub: None,
        }
    }

    pub fn with_approval(mut self, approval: Arc<dyn ApprovalGate>) -> Self {
        self.approval = approval;
        self
    }

    pub fn with_pricing(mut self, pricing: Arc<dyn Pricing>) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn with_prompt_builder(mut self, prompt_builder: Arc<dyn SystemPromptBuilder>) -> Self {
        self.prompt_builder = prompt_builder;
        self
    }

    pub fn with_mcp_hub(mut self, hub: Arc<dyn McpHub>) -> Self {
        self.mcp_hub = Some(hub);
        self
    }
}

// ─── AbortHandle ────────────────────────────────────────────────────────────

/// Requests that a running task stop before its next round.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

// ─── AgentRunner ────────────────────────────────────────────────────────────

pub struct AgentRunner {
    task_id: String,
    deps: RunnerDeps,
    config: RunnerConfig,
    modes: ModeRegistry,
    mode: ModeConfig,
    messages: Vec<Message>,
    totals: UsageTotals,
    state: LoopState,
    abort: AbortHandle,
    subscribers: Vec<mpsc::UnboundedSender<AgentEvent>>,
}

/// Tool output logged at debug level is cut to this many bytes.
const LOG_PREVIEW_BYTES: usize = 200;

/// How a model response stream ended.
enum StreamOutcome {
    Finished { text: String, blocks: Vec<ParsedBlock> },
    Failed(String),
}

impl AgentRunner {
    /// Fails with `ConfigurationError` when `max_requests` is zero or the
    /// initial mode does not exist.
    pub async fn new(deps: RunnerDeps, config: RunnerConfig) -> Result<Self, AgentError> {
        if config.max_requests == 0 {
            return Err(AgentError::ConfigurationError {
                reason: "max_requests must be greater than zero".to_string(),
            });
        }
        let modes = ModeRegistry::new(deps.storage.clone());
        let mode = modes
            .get_mode(&config.mode)
            .await?
            .ok_or_else(|| AgentError::ConfigurationError {
                reason: format!("unknown mode '{}'", config.mode),
            })?;

        let task_id = Uuid::new_v4().to_string();
        tracing::info!(
            task_id = %task_id,
            mode = %mode.slug,
            model = %deps.model.model().id,
            max_requests = config.max_requests,
            "agent runner created"
        );
        Ok(Self {
            task_id,
            deps,
            config,
            modes,
            mode,
            messages: Vec::new(),
            totals: UsageTotals::default(),
            state: LoopState::Idle,
            abort: AbortHandle::default(),
            subscribers: Vec::new(),
        })
    }

    /// A runner continuing the conversation saved under `task_id`.
    pub async fn restore(
        deps: RunnerDeps,
        config: RunnerConfig,
        history: &MessageHistory,
        task_id: &str,
    ) -> Result<Self, AgentError> {
        let messages = history.load(task_id).await?;
        let mut runner = Self::new(deps, config).await?;
        tracing::info!(task_id, count = messages.len(), "conversation restored");
        runner.task_id = task_id.to_string();
        runner.messages = messages;
        Ok(runner)
    }

    /// Persist the conversation under this runner's task id.
    pub async fn save_history(&self, history: &MessageHistory) -> Result<(), AgentError> {
        history.save(&self.task_id, &self.messages).await
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Receive every event emitted from now on.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<AgentEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn current_mode(&self) -> &ModeConfig {
        &self.mode
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn totals(&self) -> UsageTotals {
        self.totals
    }

    pub fn mode_registry(&self) -> &ModeRegistry {
        &self.modes
    }

    /// Run `user_text` to completion, failure, abort or the request limit.
    ///
    /// Calling again after an `AwaitingInput` outcome continues the same
    /// conversation. A pending abort is cleared when the call starts.
    pub async fn run_task(&mut self, user_text: impl Into<String>) -> TaskResult {
        self.abort.reset();
        self.messages.push(Message::user(user_text));

        let mut round: u32 = 0;
        loop {
            if self.abort.is_aborted() {
                tracing::info!(round, "task aborted");
                self.set_state(LoopState::Aborted);
                return self.task_result(TaskOutcome::Aborted, None);
            }
            if self.totals.request_count >= self.config.max_requests {
                tracing::warn!(
                    request_count = self.totals.request_count,
                    max_requests = self.config.max_requests,
                    "request limit reached, ending agent loop"
                );
                self.set_state(LoopState::Aborted);
                return self.task_result(TaskOutcome::RequestLimitReached, None);
            }
            self.totals.request_count += 1;
            round += 1;

            self.set_state(LoopState::Requesting);
            let system_prompt = self.build_system_prompt();
            let info = self.deps.model.model().info;
            self.messages = truncate_history(&self.messages, &info, &system_prompt);

            tracing::info!(
                round,
                request_count = self.totals.request_count,
                mode = %self.mode.slug,
                message_count = self.messages.len(),
                "=== AGENT LOOP ROUND START ==="
            );

            let (text, blocks) = match self.stream_response(&system_prompt, &info).await {
                StreamOutcome::Finished { text, blocks } => (text, blocks),
                StreamOutcome::Failed(message) => return self.fail(message),
            };
            self.messages.push(Message::assistant(text.as_str()));

            self.set_state(LoopState::Parsing);
            let tool_blocks: Vec<ToolUseBlock> = blocks
                .into_iter()
                .filter_map(|b| match b {
                    ParsedBlock::ToolUse(tool) => Some(tool),
                    ParsedBlock::Text { .. } => None,
                })
                .collect();

            tracing::info!(
                round,
                response_len = text.len(),
                tool_calls_count = tool_blocks.len(),
                tool_names = ?tool_blocks.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
                "=== MODEL RESPONSE ==="
            );

            if tool_blocks.is_empty() {
                self.set_state(LoopState::AwaitingInput);
                return self.task_result(TaskOutcome::AwaitingInput, None);
            }

            self.set_state(LoopState::ExecutingTools);
            let mut results: Vec<String> = Vec::with_capacity(tool_blocks.len());
            let mut completion: Option<String> = None;

            for block in &tool_blocks {
                self.emit(AgentEvent::ToolRequest {
                    tool: block.name.clone(),
                    params: block.params.clone(),
                });
                match block.name.as_str() {
                    "attempt_completion" => {
                        let result = block.param("result").unwrap_or_default().to_string();
                        self.emit(AgentEvent::TaskComplete {
                            result: result.clone(),
                        });
                        completion = Some(result);
                        break;
                    }
                    "switch_mode" => {
                        let slug = block.param("mode_slug").unwrap_or(DEFAULT_MODE_SLUG);
                        results.push(self.switch_mode(slug).await);
                    }
                    _ => results.push(self.run_tool(block).await),
                }
            }

            if let Some(result) = completion {
                tracing::info!(
                    round,
                    request_count = self.totals.request_count,
                    total_cost = self.totals.total_cost,
                    "task completed"
                );
                self.set_state(LoopState::Completed);
                return self.task_result(TaskOutcome::Completed, Some(result));
            }

            self.messages.push(Message::user(results.join("\n\n")));
        }
    }

    /// Summarize all but the last `keep_recent_count` messages of the
    /// conversation. On failure the history is left as it was.
    pub async fn condense(&mut self, keep_recent_count: usize) -> Result<CondenseResult, AgentError> {
        let options = CondenseOptions {
            keep_recent_count,
            ..CondenseOptions::default()
        };
        let result = condense_messages(&self.messages, self.deps.model.as_ref(), &options).await?;
        self.messages = result.messages.clone();
        Ok(result)
    }

    // ─── Round Steps ────────────────────────────────────────────────────────

    fn build_system_prompt(&self) -> String {
        let allowed_tools = tools_for_groups(&self.mode.tool_groups());
        let mcp_tools = self
            .deps
            .mcp_hub
            .as_ref()
            .map(|hub| hub.available_tools())
            .unwrap_or_default();
        self.deps.prompt_builder.build(&PromptContext {
            mode: &self.mode,
            allowed_tools: &allowed_tools,
            cwd: &self.config.cwd,
            custom_instructions: self.config.custom_instructions.as_deref(),
            project_rules: &self.config.project_rules,
            mcp_tools: &mcp_tools,
        })
    }

    async fn stream_response(&mut self, system_prompt: &str, info: &ModelInfo) -> StreamOutcome {
        let opened = self
            .deps
            .model
            .create_message(system_prompt, &self.messages)
            .await;
        let mut stream = match opened {
            Ok(stream) => stream,
            Err(e) => return StreamOutcome::Failed(e.to_string()),
        };

        self.set_state(LoopState::Streaming);
        let mut parser = StreamingParser::new();
        while let Some(chunk) = stream.next().await {
            match chunk {
                StreamChunk::Text { text } => {
                    parser.push(&text);
                    self.emit(AgentEvent::TextDelta { text });
                }
                StreamChunk::Reasoning { text } => {
                    self.emit(AgentEvent::ReasoningDelta { text });
                }
                StreamChunk::Usage(usage) => {
                    let cost = self.deps.pricing.cost(&usage, info);
                    self.totals.input_tokens += usage.input_tokens;
                    self.totals.output_tokens += usage.output_tokens;
                    self.totals.total_cost += cost;
                    tracing::debug!(
                        input_tokens = usage.input_tokens,
                        output_tokens = usage.output_tokens,
                        cost,
                        "usage reported"
                    );
                    self.emit(AgentEvent::CostUpdate {
                        total_cost: self.totals.total_cost,
                        input_tokens: self.totals.input_tokens,
                        output_tokens: self.totals.output_tokens,
                    });
                }
                StreamChunk::Error { message } => return StreamOutcome::Failed(message),
            }
        }

        let (text, blocks) = parser.finish();
        StreamOutcome::Finished { text, blocks }
    }

    async fn switch_mode(&mut self, slug: &str) -> String {
        let failed = || format!("[Mode switch failed: unknown mode '{slug}']");
        let found = self.modes.get_mode(slug).await;
        match found {
            Ok(Some(mode)) => {
                let from = std::mem::replace(&mut self.mode, mode);
                tracing::info!(from = %from.slug, to = slug, "mode switched");
                self.emit(AgentEvent::ModeSwitch {
                    from: from.slug,
                    to: slug.to_string(),
                });
                format!("Switched to {slug} mode.")
            }
            Ok(None) => {
                tracing::warn!(slug, "switch to unknown mode");
                failed()
            }
            Err(e) => {
                tracing::warn!(slug, error = %e, "mode lookup failed");
                failed()
            }
        }
    }

    /// Approve and execute one tool; the returned text is folded into the
    /// next user message.
    async fn run_tool(&mut self, block: &ToolUseBlock) -> String {
        let name = block.name.as_str();
        let request = ApprovalRequest::new(name, block.params.clone());

        let decision = self.deps.approval.request_approval(&request).await;
        if let ApprovalResult::Denied { reason } = decision {
            tracing::warn!(tool = name, reason = %reason, "tool call denied");
            let text = format!("[Tool {name} denied: {reason}]");
            self.emit_tool_result(name, reason, false);
            return text;
        }

        let outcome = self.deps.executor.execute(name, &block.params).await;
        match outcome {
            Ok(output) => {
                tracing::debug!(
                    tool = name,
                    output_len = output.len(),
                    preview = truncate_utf8(&output, LOG_PREVIEW_BYTES),
                    "tool executed"
                );
                self.emit_tool_result(name, output.clone(), true);
                output
            }
            Err(ToolError::UnknownTool { .. }) => {
                tracing::warn!(tool = name, "unknown tool");
                let text = format!("Unknown tool: {name}");
                self.emit_tool_result(name, text.clone(), false);
                text
            }
            Err(e) => {
                tracing::warn!(tool = name, error = %e, "tool execution failed");
                let text = format!("Error executing {name}: {e}");
                self.emit_tool_result(name, text.clone(), false);
                text
            }
        }
    }

    // ─── Bookkeeping ────────────────────────────────────────────────────────

    fn fail(&mut self, message: String) -> TaskResult {
        tracing::error!(error = %message, "model stream failed");
        self.emit(AgentEvent::Error {
            message: message.clone(),
        });
        self.set_state(LoopState::Failed);
        self.task_result(TaskOutcome::Failed, Some(message))
    }

    fn task_result(&self, outcome: TaskOutcome, result: Option<String>) -> TaskResult {
        TaskResult {
            success: outcome == TaskOutcome::Completed,
            result,
            outcome,
            total_cost: self.totals.total_cost,
            total_input_tokens: self.totals.input_tokens,
            total_output_tokens: self.totals.output_tokens,
            request_count: self.totals.request_count,
            messages: self.messages.clone(),
        }
    }

    fn set_state(&mut self, state: LoopState) {
        if self.state != state {
            tracing::debug!(from = ?self.state, to = ?state, "loop state");
            self.state = state;
        }
    }

    fn emit_tool_result(&mut self, tool: &str, result: String, success: bool) {
        self.emit(AgentEvent::ToolResult {
            tool: tool.to_string(),
            result,
            success,
        });
    }

    /// Deliver to every live subscriber, dropping the ones that hung up.
    fn emit(&mut self, event: AgentEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
