//! Scripted collaborators for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::agent_core::approval::{ApprovalGate, ApprovalRequest, ApprovalResult};
use crate::agent_core::mcp::{McpHub, McpToolInfo};
use crate::agent_core::prompt::{PromptContext, SystemPromptBuilder};
use crate::agent_core::tools::{ToolError, ToolExecutor};
use crate::agent_core::types::Message;
use crate::inference::client::{chunk_stream, ChunkStream, ModelClient};
use crate::inference::errors::InferenceError;
use crate::inference::types::{ModelInfo, ModelSpec, StreamChunk};

// ─── ScriptedModel ──────────────────────────────────────────────────────────

/// What a [`ScriptedModel`] was asked.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub system_prompt: String,
    pub messages: Vec<Message>,
}

/// Replays one chunk script per request. Once the scripts run out,
/// opening a stream fails.
pub struct ScriptedModel {
    info: ModelInfo,
    scripts: Mutex<VecDeque<Vec<StreamChunk>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedModel {
    pub fn new(scripts: Vec<Vec<StreamChunk>>) -> Self {
        Self {
            info: ModelInfo::with_limits(200_000, 8_192),
            scripts: Mutex::new(scripts.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_info(mut self, info: ModelInfo) -> Self {
        self.info = info;
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    fn model(&self) -> ModelSpec {
        ModelSpec {
            id: "scripted".to_string(),
            info: self.info.clone(),
        }
    }

    async fn create_message(
        &self,
        system_prompt: &str,
        messages: &[Message],
    ) -> Result<ChunkStream, InferenceError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            system_prompt: system_prompt.to_string(),
            messages: messages.to_vec(),
        });
        let script = self.scripts.lock().unwrap().pop_front();
        match script {
            Some(chunks) => Ok(chunk_stream(chunks)),
            None => Err(InferenceError::StreamError {
                reason: "script exhausted".to_string(),
            }),
        }
    }
}

// ─── RecordingExecutor ──────────────────────────────────────────────────────

/// Records every call and answers `<name> done`. Tools listed as unknown
/// fail with [`ToolError::UnknownTool`]; tools listed as failing fail with
/// [`ToolError::Failed`].
#[derive(Default)]
pub struct RecordingExecutor {
    unknown: Vec<String>,
    failing: Vec<String>,
    calls: Mutex<Vec<(String, HashMap<String, String>)>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_unknown(mut self, tool: &str) -> Self {
        self.unknown.push(tool.to_string());
        self
    }

    pub fn with_failing(mut self, tool: &str) -> Self {
        self.failing.push(tool.to_string());
        self
    }

    pub fn calls(&self) -> Vec<(String, HashMap<String, String>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn called_tools(&self) -> Vec<String> {
        self.calls().into_iter().map(|(name, _)| name).collect()
    }
}

#[async_trait]
impl ToolExecutor for RecordingExecutor {
    async fn execute(
        &self,
        name: &str,
        params: &HashMap<String, String>,
    ) -> Result<String, ToolError> {
        self.calls
            .lock()
            .unwrap()
            .push((name.to_string(), params.clone()));
        if self.unknown.iter().any(|t| t == name) {
            return Err(ToolError::UnknownTool {
                name: name.to_string(),
            });
        }
        if self.failing.iter().any(|t| t == name) {
            return Err(anyhow::anyhow!("disk full").into());
        }
        Ok(format!("{name} done"))
    }
}

// ─── DenyingGate ────────────────────────────────────────────────────────────

/// Denies the listed tools with a fixed reason, approves everything else.
pub struct DenyingGate {
    denied: Vec<String>,
    reason: String,
}

impl DenyingGate {
    pub fn new(denied: &[&str], reason: &str) -> Self {
        Self {
            denied: denied.iter().map(|t| t.to_string()).collect(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl ApprovalGate for DenyingGate {
    async fn request_approval(&self, request: &ApprovalRequest) -> ApprovalResult {
        if self.denied.contains(&request.tool) {
            ApprovalResult::denied(self.reason.clone())
        } else {
            ApprovalResult::Approved
        }
    }
}

// ─── StaticPromptBuilder ────────────────────────────────────────────────────

/// Returns `prompt for <mode>` and remembers the mode of every build.
#[derive(Default)]
pub struct StaticPromptBuilder {
    modes: Mutex<Vec<String>>,
}

impl StaticPromptBuilder {
    pub fn modes(&self) -> Vec<String> {
        self.modes.lock().unwrap().clone()
    }
}

impl SystemPromptBuilder for StaticPromptBuilder {
    fn build(&self, ctx: &PromptContext<'_>) -> String {
        self.modes.lock().unwrap().push(ctx.mode.slug.clone());
        format!("prompt for {}", ctx.mode.slug)
    }
}

// ─── StaticMcpHub ───────────────────────────────────────────────────────────

/// Offers a fixed tool list and echoes every call back as JSON. The server
/// named `offline` fails.
pub struct StaticMcpHub {
    tools: Vec<McpToolInfo>,
    calls: Mutex<Vec<(String, String, serde_json::Value)>>,
}

impl StaticMcpHub {
    pub fn new(tools: Vec<McpToolInfo>) -> Self {
        Self {
            tools,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(String, String, serde_json::Value)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl McpHub for StaticMcpHub {
    fn available_tools(&self) -> Vec<McpToolInfo> {
        self.tools.clone()
    }

    async fn invoke_tool(
        &self,
        server: &str,
        tool: &str,
        arguments: serde_json::Value,
    ) -> anyhow::Result<serde_json::Value> {
        self.calls
            .lock()
            .unwrap()
            .push((server.to_string(), tool.to_string(), arguments.clone()));
        if server == "offline" {
            anyhow::bail!("MCP server \"{server}\" is not connected");
        }
        Ok(serde_json::json!({ "tool": tool, "echo": arguments }))
    }

    async fn access_resource(&self, server: &str, uri: &str) -> anyhow::Result<serde_json::Value> {
        Ok(serde_json::json!({ "server": server, "uri": uri, "text": "resource body" }))
    }
}
